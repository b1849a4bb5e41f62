use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Parse a task's cron expression.
///
/// Accepts the classic 5-field form (`min hour dom month dow`) by pinning the
/// seconds field to `0`, the 6/7-field form with a leading seconds field, and
/// `@`-shorthands such as `@hourly`. An expression that can never fire again
/// (a 7-field form whose years are all past) is rejected.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    let normalized = match trimmed.split_whitespace().count() {
        _ if trimmed.starts_with('@') => trimmed.to_string(),
        5 => format!("0 {trimmed}"),
        6 | 7 => trimmed.to_string(),
        n => {
            return Err(SchedulerError::InvalidSchedule(format!(
                "{expr:?}: expected 5, 6 or 7 fields, got {n}"
            )))
        }
    };

    let schedule = Schedule::from_str(&normalized)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{expr:?}: {e}")))?;
    if schedule.upcoming(Utc).next().is_none() {
        return Err(SchedulerError::InvalidSchedule(format!(
            "{expr:?}: no upcoming fire time"
        )));
    }
    Ok(schedule)
}

/// First fire time strictly after `from`, or `None` if the schedule is exhausted.
pub fn next_fire_after(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&from).next()
}

/// Next fire time for `expr` from now, reported by the task API.
pub fn next_fire(expr: &str) -> Result<Option<DateTime<Utc>>> {
    let schedule = parse_cron(expr)?;
    Ok(next_fire_after(&schedule, Utc::now()))
}
