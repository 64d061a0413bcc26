//! Reminder domain model.
//!
//! # Responsibility
//! - Define the canonical reminder record attached to a note.
//! - Provide derived status (overdue flag, time-remaining bucket).
//! - Provide note-level aggregates over a reminder list.
//!
//! # Invariants
//! - `id` is stable and never reused for another reminder.
//! - `remind_at` is always set; callers that have no date use
//!   `Reminder::new` which requires one (the scheduler fills in its
//!   default before construction).
//! - `is_active == false` means the reminder is inert and must have no
//!   outstanding dispatcher request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a reminder.
pub type ReminderId = Uuid;

/// Stable identifier for the note that owns a reminder.
pub type NoteId = Uuid;

/// Recurrence rule attached to a reminder.
///
/// Storage-side parsing is lenient: unknown text falls back to `None`
/// instead of failing the read (see `repo::reminder_store`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatKind {
    /// One-shot reminder, no recurrence.
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Monday through Friday only.
    Weekdays,
    /// Saturdays only.
    Weekends,
}

impl RepeatKind {
    /// Returns whether this rule produces further occurrences.
    pub fn is_recurring(self) -> bool {
        self != Self::None
    }
}

/// Coarse time-remaining bucket for UI display.
///
/// Evaluated in priority order: overdue wins over everything, then the
/// largest non-zero unit, then "due now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Overdue,
    DueNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
}

impl Display for TimeRemaining {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overdue => write!(f, "overdue"),
            Self::DueNow => write!(f, "due now"),
            Self::Minutes(n) => write!(f, "{n} minute{}", plural(*n)),
            Self::Hours(n) => write!(f, "{n} hour{}", plural(*n)),
            Self::Days(n) => write!(f, "{n} day{}", plural(*n)),
        }
    }
}

fn plural(count: i64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Canonical reminder record.
///
/// The reminder lifetime is bounded by its owning note: deleting the
/// note cascades to its reminders at the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Stable global ID used for dispatcher-request derivation.
    pub id: ReminderId,
    /// Owning note. Many reminders may reference one note.
    pub note_id: NoteId,
    pub title: String,
    /// Next instant this reminder is due. Advanced by the fire handler
    /// when the reminder recurs.
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Inactive reminders are inert: persisted but never armed.
    pub is_active: bool,
    pub repeat: RepeatKind,
}

impl Reminder {
    /// Creates a new active reminder with a generated stable ID.
    pub fn new(
        note_id: NoteId,
        title: impl Into<String>,
        remind_at: DateTime<Utc>,
        repeat: RepeatKind,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), note_id, title, remind_at, repeat)
    }

    /// Creates a reminder with a caller-provided stable ID.
    ///
    /// Used by tests and import paths where identity already exists.
    pub fn with_id(
        id: ReminderId,
        note_id: NoteId,
        title: impl Into<String>,
        remind_at: DateTime<Utc>,
        repeat: RepeatKind,
    ) -> Self {
        Self {
            id,
            note_id,
            title: title.into(),
            remind_at,
            created_at: Utc::now(),
            is_active: true,
            repeat,
        }
    }

    /// Active and past due at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.remind_at < now
    }

    /// Time-remaining bucket at `now`.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> TimeRemaining {
        if self.remind_at < now {
            return TimeRemaining::Overdue;
        }

        let left = self.remind_at - now;
        if left.num_days() > 0 {
            TimeRemaining::Days(left.num_days())
        } else if left.num_hours() > 0 {
            TimeRemaining::Hours(left.num_hours())
        } else if left.num_minutes() > 0 {
            TimeRemaining::Minutes(left.num_minutes())
        } else {
            TimeRemaining::DueNow
        }
    }
}

/// Earliest active reminder that is still upcoming at `now`.
///
/// Ties on `remind_at` resolve to the earliest element in `reminders`,
/// so passing a list in insertion order keeps the documented stable
/// tie-break.
pub fn next_reminder(reminders: &[Reminder], now: DateTime<Utc>) -> Option<&Reminder> {
    reminders
        .iter()
        .filter(|reminder| reminder.is_active && reminder.remind_at >= now)
        .min_by_key(|reminder| reminder.remind_at)
}

/// Whether any reminder in the list is active.
pub fn has_active_reminders(reminders: &[Reminder]) -> bool {
    reminders.iter().any(|reminder| reminder.is_active)
}
