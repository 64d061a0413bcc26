//! Core domain logic for NoteMark reminders.
//! This crate is the single source of truth for scheduling invariants.

pub mod db;
pub mod dispatch;
pub mod logging;
pub mod model;
pub mod recurrence;
pub mod repo;
pub mod service;

pub use dispatch::{AlertRequest, DispatchError, NotificationDispatcher, RequestId};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::reminder::{
    has_active_reminders, next_reminder, NoteId, Reminder, ReminderId, RepeatKind, TimeRemaining,
};
pub use repo::reminder_store::{
    ReminderStore, ReminderUpdate, SqliteReminderStore, StoreError, StoreResult,
};
pub use service::reminder_scheduler::{
    NewReminder, ReminderScheduler, SchedulerError, SchedulerEvent,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
