//! Domain model for note reminders.
//!
//! # Responsibility
//! - Define the canonical reminder record and its repeat rule.
//! - Provide derived status helpers (overdue, time-remaining bucket).
//!
//! # Invariants
//! - Every reminder is identified by a stable `ReminderId`.
//! - A reminder always carries a concrete `remind_at` instant.

pub mod reminder;
