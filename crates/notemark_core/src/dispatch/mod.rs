//! Notification dispatcher contract.
//!
//! # Responsibility
//! - Define the async seam to the platform alerting primitive.
//! - Derive dispatcher request identities from reminder identities.
//!
//! # Invariants
//! - `RequestId` is deterministic and 1:1 with the reminder id, so a
//!   cancel can be attempted even after the in-memory map is lost.
//! - Cancelling an unknown request id is a success no-op.
//! - Schedule/cancel rejections are soft errors for callers: the
//!   reminder record stays persisted and simply remains unscheduled.

use crate::model::reminder::{NoteId, ReminderId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deterministic dispatcher-request identity for one reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    /// Derives the request id for a reminder. Stable across restarts.
    pub fn for_reminder(reminder_id: ReminderId) -> Self {
        Self(format!("reminder-{reminder_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One alert to be fired at a future instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub request_id: RequestId,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    /// Routing metadata carried back with the fired event.
    pub note_id: NoteId,
    pub reminder_id: ReminderId,
}

/// Dispatcher rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Alerting permission revoked; every call fails until restored.
    /// `resync_all` after restoration is the recovery path.
    PermissionDenied,
    /// Any other platform rejection (quota, transient failure).
    Rejected(String),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "alerting permission denied"),
            Self::Rejected(reason) => write!(f, "dispatch rejected: {reason}"),
        }
    }
}

impl Error for DispatchError {}

/// Async seam to the OS/platform alerting primitive.
///
/// Fired alerts come back to the application as an async event carrying
/// the reminder id; the app routes that event to
/// `ReminderScheduler::on_fired`. Delivery may be late, missing, or
/// duplicated; the scheduler tolerates all three.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Schedules one alert for a future instant.
    async fn schedule(&self, request: AlertRequest) -> Result<(), DispatchError>;
    /// Cancels one scheduled alert. Unknown ids succeed silently.
    async fn cancel(&self, request_id: &RequestId) -> Result<(), DispatchError>;
    /// Cancels every alert this process has scheduled.
    async fn cancel_all(&self) -> Result<(), DispatchError>;
}
