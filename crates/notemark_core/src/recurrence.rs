//! Recurrence rule evaluation.
//!
//! # Responsibility
//! - Compute the next occurrence of a reminder from its repeat rule.
//! - Resolve a past recurring date to its first future occurrence.
//!
//! # Invariants
//! - `next_occurrence` is pure and deterministic for a fixed input pair.
//! - Every recurring kind moves strictly forward in time.
//! - `Weekdays` never lands on Saturday or Sunday.
//! - `Weekends` always lands on a Saturday.
//!
//! Weekday numbering follows chrono's `num_days_from_monday`
//! convention: Monday = 0 .. Sunday = 6, Saturday = 5.

use crate::model::reminder::RepeatKind;
use chrono::{DateTime, Datelike, Days, Months, Utc, Weekday};

const SATURDAY_FROM_MONDAY: u64 = 5;

/// Computes the next occurrence after `after` for the given rule.
///
/// Returns `None` for `RepeatKind::None` (recurrence terminates) and
/// for dates outside chrono's representable range.
///
/// Month and year steps clamp to the last valid day of the target
/// month when the source day-of-month does not exist there
/// (Jan 31 + 1 month = Feb 29 in a leap year, Feb 28 otherwise).
pub fn next_occurrence(after: DateTime<Utc>, kind: RepeatKind) -> Option<DateTime<Utc>> {
    match kind {
        RepeatKind::None => None,
        RepeatKind::Daily => after.checked_add_days(Days::new(1)),
        RepeatKind::Weekly => after.checked_add_days(Days::new(7)),
        RepeatKind::Monthly => after.checked_add_months(Months::new(1)),
        RepeatKind::Yearly => after.checked_add_months(Months::new(12)),
        RepeatKind::Weekdays => {
            let next = after.checked_add_days(Days::new(1))?;
            let skip = match next.weekday() {
                Weekday::Sat => 2,
                Weekday::Sun => 1,
                _ => 0,
            };
            next.checked_add_days(Days::new(skip))
        }
        RepeatKind::Weekends => {
            let next = after.checked_add_days(Days::new(1))?;
            // Offset to the coming Saturday; zero when already there.
            // From Sunday this is 6 days, giving the full Sat -> Sat week.
            let from_monday = u64::from(next.weekday().num_days_from_monday());
            let to_saturday = (SATURDAY_FROM_MONDAY + 7 - from_monday) % 7;
            next.checked_add_days(Days::new(to_saturday))
        }
    }
}

/// Advances `from` until the first occurrence strictly after `now`.
///
/// Used when arming a reminder whose stored date is already in the
/// past: the arming date skips forward, the stored date does not.
/// Returns `None` for non-recurring rules.
pub fn first_future_occurrence(
    from: DateTime<Utc>,
    kind: RepeatKind,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut cursor = from;
    loop {
        cursor = next_occurrence(cursor, kind)?;
        if cursor > now {
            return Some(cursor);
        }
    }
}
