// Start/stop/reload behaviour of the scheduler.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{executor, fixture, stores, wait_first_execution, FlakyStore, ManualTimer};
use cronlet_scheduler::{
    CronTimerEngine, ExecutionRecorder, NewTask, Scheduler, SchedulerError, TaskStatus, TaskStore,
};

#[tokio::test]
async fn load_registers_only_tasks_that_started() {
    let fx = fixture();
    let good = fx.task("good", "*/5 * * * *", "true");

    // the store validates cron on create, so corrupt it afterwards
    let mut bad = fx.task("bad", "* * * * *", "true");
    bad.cron_expr = "not-a-cron".into();
    fx.tasks.update(&bad).unwrap();

    let off = fx
        .tasks
        .create(&NewTask::new("off", "* * * * *", "true").disabled())
        .unwrap();

    let report = fx.scheduler.load_and_start_tasks().unwrap();
    assert_eq!(report.started, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(fx.scheduler.registry().task_ids(), vec![good.id]);
    assert_eq!(fx.tasks.get_by_id(good.id).unwrap().status, TaskStatus::Running);
    assert_eq!(fx.tasks.get_by_id(bad.id).unwrap().status, TaskStatus::Stopped);
    assert!(!fx.scheduler.is_scheduled(off.id));
    assert_eq!(fx.timer.live_count(), 1);
}

#[tokio::test]
async fn start_twice_keeps_a_single_trigger() {
    let fx = fixture();
    let mut task = fx.task("twice", "* * * * *", "true");

    fx.scheduler.start_task(&mut task).unwrap();
    let first = fx.scheduler.registry().lookup(task.id).unwrap();
    fx.scheduler.start_task(&mut task).unwrap();
    let second = fx.scheduler.registry().lookup(task.id).unwrap();

    assert_ne!(first, second);
    assert_eq!(fx.scheduler.registry().len(), 1);
    assert_eq!(fx.timer.live_count(), 1);
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(fx.tasks.get_by_id(task.id).unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn stop_without_trigger_still_marks_stopped() {
    let fx = fixture();
    let mut task = fx.task("idle", "* * * * *", "true");
    task.status = TaskStatus::Running;
    fx.tasks.update(&task).unwrap();

    fx.scheduler.stop_task_by_id(task.id).unwrap();
    fx.scheduler.stop_task_by_id(task.id).unwrap();
    assert_eq!(fx.tasks.get_by_id(task.id).unwrap().status, TaskStatus::Stopped);
}

#[tokio::test]
async fn stop_removes_trigger() {
    let fx = fixture();
    let mut task = fx.task("stoppable", "* * * * *", "true");
    fx.scheduler.start_task(&mut task).unwrap();

    fx.scheduler.stop_task_by_id(task.id).unwrap();
    assert!(!fx.scheduler.is_scheduled(task.id));
    assert_eq!(fx.timer.live_count(), 0);
    assert_eq!(fx.tasks.get_by_id(task.id).unwrap().status, TaskStatus::Stopped);
}

#[tokio::test]
async fn stop_unknown_task_is_not_found() {
    let fx = fixture();
    let err = fx.scheduler.stop_task_by_id(404).unwrap_err();
    assert!(matches!(err, SchedulerError::TaskNotFound { id: 404 }));
}

#[tokio::test]
async fn refused_cancel_leaves_registry_untouched() {
    let fx = fixture();
    let mut task = fx.task("sticky", "* * * * *", "true");
    fx.scheduler.start_task(&mut task).unwrap();
    let handle = fx.scheduler.registry().lookup(task.id);

    fx.timer.refuse_cancel.store(true, Ordering::SeqCst);
    assert!(fx.scheduler.stop_task_by_id(task.id).is_err());
    assert_eq!(fx.scheduler.registry().lookup(task.id), handle);
    assert_eq!(fx.tasks.get_by_id(task.id).unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn invalid_schedule_does_not_mark_running() {
    let fx = fixture();
    let mut task = fx.task("broken", "* * * * *", "true");
    task.cron_expr = "99 * * * *".into();

    let err = fx.scheduler.start_task(&mut task).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
    assert_eq!(task.status, TaskStatus::Stopped);
    assert!(fx.scheduler.registry().is_empty());
}

#[tokio::test]
async fn failed_status_write_rolls_back_trigger() {
    let (tasks, executions) = stores();
    let flaky = Arc::new(FlakyStore {
        inner: tasks.clone(),
        fail_updates: AtomicBool::new(false),
    });
    let timer = Arc::new(ManualTimer::default());
    let scheduler = Scheduler::new(flaky.clone(), executions, executor(), timer.clone()).unwrap();

    let mut task = tasks.create(&NewTask::new("flaky", "* * * * *", "true")).unwrap();
    flaky.fail_updates.store(true, Ordering::SeqCst);

    let err = scheduler.start_task(&mut task).unwrap_err();
    assert!(matches!(err, SchedulerError::Persistence(_)));
    assert!(!scheduler.is_scheduled(task.id));
    assert_eq!(timer.live_count(), 0);
    assert_eq!(task.status, TaskStatus::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_start_stop_never_leaves_two_triggers() {
    let (tasks, executions) = stores();
    let timer = Arc::new(ManualTimer::default());
    let scheduler = Arc::new(
        Scheduler::new(tasks.clone(), executions, executor(), timer.clone()).unwrap(),
    );
    let task = tasks.create(&NewTask::new("racy", "* * * * *", "true")).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let mut task = task.clone();
            tokio::task::spawn_blocking(move || {
                for j in 0..50 {
                    // errors from losing a race are expected; the invariant is what matters
                    if (i + j) % 3 == 0 {
                        let _ = scheduler.stop_task_by_id(task.id);
                    } else {
                        let _ = scheduler.start_task(&mut task);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.await.unwrap();
    }

    assert!(timer.live_count() <= 1);
    assert_eq!(timer.live_count(), scheduler.registry().len());
}

#[tokio::test]
async fn scheduler_stop_cancels_triggers_but_keeps_status() {
    let fx = fixture();
    let mut a = fx.task("a", "* * * * *", "true");
    let mut b = fx.task("b", "* * * * *", "true");
    fx.scheduler.start_task(&mut a).unwrap();
    fx.scheduler.start_task(&mut b).unwrap();

    fx.scheduler.stop();

    assert_eq!(fx.timer.live_count(), 0);
    assert!(fx.scheduler.registry().is_empty());
    assert_eq!(fx.tasks.get_by_id(a.id).unwrap().status, TaskStatus::Running);
    assert_eq!(fx.tasks.get_by_id(b.id).unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn past_schedule_never_starts() {
    let fx = fixture();
    let mut task = fx.task("past", "* * * * *", "true");
    task.cron_expr = "0 0 0 1 1 * 2020".into();
    fx.tasks.update(&task).unwrap();

    let err = fx.scheduler.start_task(&mut task).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
    assert!(fx.scheduler.registry().is_empty());

    fx.scheduler.stop_task_by_id(task.id).unwrap();
    fx.tasks.soft_delete(task.id).unwrap();
}

#[tokio::test]
async fn exhausted_trigger_can_still_be_stopped_and_deleted() {
    let fx = fixture();
    let mut task = fx.task("finite", "* * * * *", "true");
    fx.scheduler.start_task(&mut task).unwrap();

    fx.timer.exhaust_all();
    fx.scheduler.stop_task_by_id(task.id).unwrap();

    assert!(!fx.scheduler.is_scheduled(task.id));
    assert_eq!(fx.tasks.get_by_id(task.id).unwrap().status, TaskStatus::Stopped);
    fx.tasks.soft_delete(task.id).unwrap();
    assert!(matches!(
        fx.tasks.get_by_id(task.id),
        Err(SchedulerError::TaskNotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_by_id_on_real_timer_ends_executions() {
    let (tasks, executions) = stores();
    let timer = Arc::new(CronTimerEngine::new().unwrap());
    let scheduler =
        Scheduler::new(tasks.clone(), executions.clone(), executor(), timer.clone()).unwrap();

    let mut task = tasks
        .create(&NewTask::new("every-second", "* * * * * *", "echo tick"))
        .unwrap();
    scheduler.start_task(&mut task).unwrap();
    wait_first_execution(executions.as_ref(), task.id).await;

    scheduler.stop_task_by_id(task.id).unwrap();
    assert_eq!(timer.active_count(), 0);
    // cancel waits for an in-flight tick, so this count is final
    let at_stop = executions.list_for_task(task.id, 100).unwrap().len();

    tokio::time::sleep(Duration::from_millis(2_200)).await;
    assert_eq!(executions.list_for_task(task.id, 100).unwrap().len(), at_stop);
    assert_eq!(tasks.get_by_id(task.id).unwrap().status, TaskStatus::Stopped);
}
