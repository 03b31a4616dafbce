//! Pure schedule-kind math (SPEC_FULL §4.4 "Schedule semantics").

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use mozi_core::Schedule;

use crate::error::{ReminderError, ReminderResult};

/// The next instant this schedule fires strictly after `after`, or `None`
/// if the schedule has no more firings (an `at` reminder whose moment has
/// already passed).
///
/// # Errors
///
/// Returns [`ReminderError::InvalidCron`] or [`ReminderError::InvalidTimeZone`]
/// if a `cron` schedule's expression or time zone doesn't parse.
pub fn compute_next_run(schedule: &Schedule, after: DateTime<Utc>) -> ReminderResult<Option<DateTime<Utc>>> {
    match schedule {
        Schedule::At { at } => Ok((*at > after).then_some(*at)),
        Schedule::Every { every_ms, anchor } => Ok(Some(next_every(*every_ms, anchor.unwrap_or(after), after))),
        Schedule::Cron { expr, tz } => next_cron(expr, tz.as_deref(), after).map(Some),
    }
}

/// `anchor + ceil((after - anchor) / every) * every`, clamped to at least
/// one step and strictly after `after`.
fn next_every(every_ms: i64, anchor: DateTime<Utc>, after: DateTime<Utc>) -> DateTime<Utc> {
    let every_ms = every_ms.max(1);
    let elapsed_ms = (after - anchor).num_milliseconds();
    let steps = if elapsed_ms <= 0 {
        1
    } else {
        // ceil(elapsed / every), then bumped below if it lands exactly on `after`.
        #[allow(clippy::arithmetic_side_effects)]
        let steps = (elapsed_ms + every_ms - 1) / every_ms;
        steps.max(1)
    };
    // steps is bounded above by elapsed_ms/every_ms + 1, never overflow-prone in practice.
    #[allow(clippy::arithmetic_side_effects)]
    let mut next = anchor + chrono::Duration::milliseconds(steps * every_ms);
    while next <= after {
        // one additional step forward; every_ms is caller-controlled and small.
        #[allow(clippy::arithmetic_side_effects)]
        {
            next += chrono::Duration::milliseconds(every_ms);
        }
    }
    next
}

fn next_cron(expr: &str, tz: Option<&str>, after: DateTime<Utc>) -> ReminderResult<DateTime<Utc>> {
    let schedule = CronSchedule::from_str(expr)
        .map_err(|source| ReminderError::InvalidCron { expr: expr.to_owned(), message: source.to_string() })?;
    let tz: Tz = match tz {
        Some(name) => name.parse().map_err(|_| ReminderError::InvalidTimeZone { tz: name.to_owned() })?,
        None => chrono_tz::UTC,
    };
    let after_in_tz = after.with_timezone(&tz);
    schedule
        .after(&after_in_tz)
        .next()
        .map(|next| next.with_timezone(&Utc))
        .ok_or_else(|| ReminderError::InvalidCron { expr: expr.to_owned(), message: "schedule has no future firings".to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn at_returns_the_moment_when_still_future() {
        let now = Utc::now();
        let at = now + chrono::Duration::minutes(5);
        assert_eq!(compute_next_run(&Schedule::At { at }, now).unwrap(), Some(at));
    }

    #[test]
    fn at_returns_none_once_the_moment_has_passed() {
        let now = Utc::now();
        let at = now - chrono::Duration::minutes(5);
        assert_eq!(compute_next_run(&Schedule::At { at }, now).unwrap(), None);
    }

    #[test]
    fn every_advances_by_whole_steps_from_the_anchor() {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let after = anchor + chrono::Duration::seconds(90);
        let next = compute_next_run(&Schedule::Every { every_ms: 60_000, anchor: Some(anchor) }, after).unwrap().unwrap();
        assert_eq!(next, anchor + chrono::Duration::seconds(120));
    }

    #[test]
    fn every_never_returns_a_moment_at_or_before_after() {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let after = anchor + chrono::Duration::seconds(60);
        let next = compute_next_run(&Schedule::Every { every_ms: 60_000, anchor: Some(anchor) }, after).unwrap().unwrap();
        assert!(next > after);
    }

    #[test]
    fn every_takes_at_least_one_step_when_after_precedes_the_anchor() {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let after = anchor - chrono::Duration::minutes(10);
        let next = compute_next_run(&Schedule::Every { every_ms: 60_000, anchor: Some(anchor) }, after).unwrap().unwrap();
        assert_eq!(next, anchor + chrono::Duration::seconds(60));
    }

    #[test]
    fn cron_rejects_an_invalid_expression() {
        let err = compute_next_run(&Schedule::Cron { expr: "not a cron expr".to_owned(), tz: None }, Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn cron_computes_the_next_firing_in_utc_when_no_tz_given() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        // Every minute at second 0.
        let next = compute_next_run(&Schedule::Cron { expr: "0 * * * * *".to_owned(), tz: None }, now).unwrap().unwrap();
        assert_eq!(next, now + chrono::Duration::minutes(1));
    }
}
