//! Timer engine: fires a callback on every tick of a cron schedule.
//!
//! The scheduler only talks to the [`TimerEngine`] trait. [`CronTimerEngine`]
//! is the production implementation: one Tokio task per trigger, each sleeping
//! until the schedule's next instant and cancelled through a
//! `CancellationToken` that is a child of the engine's root token.
//!
//! A tick runs its callback while holding the trigger's firing lock, and
//! `cancel` takes that lock after cancelling the token. Once `cancel` returns
//! no callback for that trigger is running and none will start.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::schedule::{next_fire_after, parse_cron};

/// Opaque token identifying one scheduled, cancellable trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerHandle(u64);

impl TriggerHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger-{}", self.0)
    }
}

/// Invoked on every tick. Must return quickly; long work belongs in a
/// spawned task.
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Periodic trigger capability consumed by the scheduler.
pub trait TimerEngine: Send + Sync {
    /// Start firing `callback` on every instant matched by `cron_expr`.
    ///
    /// Fails with `InvalidSchedule` when the expression does not parse.
    fn schedule(&self, cron_expr: &str, callback: TickCallback) -> Result<TriggerHandle>;

    /// Stop a trigger. Fails with `TriggerNotFound` if the handle is unknown
    /// (never issued, already cancelled, or its schedule ran out).
    ///
    /// After `Ok(())` the callback is not running and will not run again.
    fn cancel(&self, handle: TriggerHandle) -> Result<()>;

    /// Cancel every trigger; pending ticks never fire.
    fn shutdown_all(&self);
}

struct Trigger {
    token: CancellationToken,
    /// Held for the duration of each callback.
    firing: Mutex<()>,
}

impl Trigger {
    /// Block until an in-flight callback (if any) has returned.
    fn wait_idle(&self) {
        drop(self.firing.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// [`TimerEngine`] driven by the `cron` crate and Tokio timers.
///
/// Callbacks must not cancel their own trigger.
pub struct CronTimerEngine {
    runtime: Handle,
    root: CancellationToken,
    next_id: AtomicU64,
    triggers: Arc<Mutex<HashMap<TriggerHandle, Arc<Trigger>>>>,
}

impl CronTimerEngine {
    /// Bind to the current Tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(runtime))
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime,
            root: CancellationToken::new(),
            next_id: AtomicU64::new(1),
            triggers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of triggers that have not been cancelled or exhausted.
    pub fn active_count(&self) -> usize {
        self.triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TimerEngine for CronTimerEngine {
    fn schedule(&self, cron_expr: &str, callback: TickCallback) -> Result<TriggerHandle> {
        if self.root.is_cancelled() {
            return Err(SchedulerError::Runtime("timer engine is shut down".into()));
        }
        let schedule = parse_cron(cron_expr)?;

        let handle = TriggerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let trigger = Arc::new(Trigger {
            token: self.root.child_token(),
            firing: Mutex::new(()),
        });
        self.triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, Arc::clone(&trigger));

        let triggers = Arc::clone(&self.triggers);
        let expr = cron_expr.to_string();
        self.runtime.spawn(async move {
            let mut last = Utc::now();
            loop {
                // never fire twice for one instant, never replay missed ones
                let from = std::cmp::max(last, Utc::now());
                let Some(next) = next_fire_after(&schedule, from) else {
                    debug!(%handle, expr = %expr, "schedule exhausted");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();

                tokio::select! {
                    _ = trigger.token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                let fired = {
                    let _firing = trigger.firing.lock().unwrap_or_else(PoisonError::into_inner);
                    // checked under the lock so a returned cancel is final
                    if trigger.token.is_cancelled() {
                        false
                    } else {
                        debug!(%handle, at = %next, "trigger fired");
                        callback();
                        true
                    }
                };
                if !fired {
                    break;
                }
                last = next;
            }
            triggers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&handle);
        });

        debug!(%handle, expr = %cron_expr, "trigger scheduled");
        Ok(handle)
    }

    fn cancel(&self, handle: TriggerHandle) -> Result<()> {
        let trigger = self
            .triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
            .ok_or(SchedulerError::TriggerNotFound { handle })?;
        trigger.token.cancel();
        trigger.wait_idle();
        debug!(%handle, "trigger cancelled");
        Ok(())
    }

    fn shutdown_all(&self) {
        self.root.cancel();
        let drained: Vec<_> = self
            .triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, trigger)| trigger)
            .collect();
        for trigger in &drained {
            trigger.wait_idle();
        }
        info!(cancelled = drained.len(), "timer engine shut down");
    }
}
