//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and dispatcher calls into use-case level APIs.
//! - Keep UI layers decoupled from storage and platform details.

pub mod reminder_scheduler;
