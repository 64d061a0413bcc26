//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the reminder store contract the scheduler orchestrates.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Multi-field reminder updates commit atomically or not at all.
//! - Store APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod reminder_store;
