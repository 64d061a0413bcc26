//! Reminder scheduling orchestration.
//!
//! # Responsibility
//! - Keep each persisted reminder's outstanding alert in sync with the
//!   dispatcher across create, edit, delete, fire, and resync.
//! - Own the reminder-id -> request-id map under single-writer
//!   discipline.
//!
//! # Invariants
//! - At most one outstanding dispatcher request exists per reminder id.
//! - An inactive reminder has zero outstanding requests.
//! - Store failures abort an operation before any dispatcher call;
//!   dispatcher failures never fail the persistence step.
//! - The map is ephemeral: `resync_all` rebuilds it from scratch and is
//!   idempotent.

use crate::dispatch::{AlertRequest, NotificationDispatcher, RequestId};
use crate::model::reminder::{self, NoteId, Reminder, ReminderId, RepeatKind};
use crate::recurrence;
use crate::repo::reminder_store::{ReminderStore, ReminderUpdate, StoreError};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Applied when a creation request carries no date.
fn default_lead() -> Duration {
    Duration::hours(1)
}

/// Errors from scheduler operations.
///
/// Dispatcher rejections are deliberately absent: they degrade to a
/// persisted-but-unscheduled reminder and a `warn` log line.
#[derive(Debug)]
pub enum SchedulerError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Store read/write failed; the operation was aborted.
    Store(StoreError),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "reminder title must not be blank"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidTitle => None,
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Input for `ReminderScheduler::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub note_id: NoteId,
    pub title: String,
    /// Defaults to now + 1 hour when absent.
    pub remind_at: Option<DateTime<Utc>>,
    pub repeat: RepeatKind,
    pub is_active: bool,
}

/// Notifications published by the scheduler.
///
/// Consumers subscribe for refresh triggers instead of the scheduler
/// holding a back-pointer into UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Created { reminder_id: ReminderId },
    Updated { reminder_id: ReminderId },
    Deleted { reminder_id: ReminderId },
    Fired { reminder_id: ReminderId, rearmed: bool },
    Resynced { armed: usize },
}

struct Inner<S> {
    store: S,
    /// reminder id -> outstanding dispatcher request. Authoritative for
    /// "is this reminder currently armed"; rebuilt by `resync_all`.
    armed: HashMap<ReminderId, RequestId>,
}

/// Orchestrates the reminder store and the notification dispatcher.
///
/// All mutations of the armed map and of persisted reminder state run
/// under one `tokio::sync::Mutex`, held across dispatcher awaits. That
/// coarse critical section is intentional: two operations targeting the
/// same reminder id must never interleave their read-modify-write, and
/// `resync_all` must not race per-reminder mutations.
pub struct ReminderScheduler<S, D> {
    inner: Mutex<Inner<S>>,
    dispatcher: Arc<D>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl<S, D> ReminderScheduler<S, D>
where
    S: ReminderStore,
    D: NotificationDispatcher,
{
    pub fn new(store: S, dispatcher: Arc<D>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                store,
                armed: HashMap::new(),
            }),
            dispatcher,
            events,
        }
    }

    /// Subscribes to scheduler notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Persists a new reminder and arms it when possible.
    ///
    /// # Contract
    /// - Missing date defaults to now + 1 hour.
    /// - Store failure aborts before any dispatcher call.
    /// - A past date with no recurrence persists unarmed (a one-shot
    ///   alert that can never fire is a deliberate no-op, not an error).
    /// - A past date with recurrence arms at the first future occurrence
    ///   without touching the stored date.
    /// - Dispatcher rejection leaves the reminder persisted and
    ///   unscheduled.
    pub async fn create(&self, new: NewReminder) -> Result<Reminder, SchedulerError> {
        let title = normalize_title(&new.title)?;
        let now = Utc::now();
        let remind_at = new.remind_at.unwrap_or(now + default_lead());

        let mut reminder = Reminder::new(new.note_id, title, remind_at, new.repeat);
        reminder.is_active = new.is_active;

        let mut inner = self.inner.lock().await;
        inner.store.insert(&reminder)?;

        let mut armed = false;
        if reminder.is_active {
            if let Some(fire_at) = resolve_fire_time(&reminder, now) {
                armed = self.arm(&mut inner, &reminder, fire_at).await;
            }
        }
        drop(inner);

        info!(
            "event=reminder_create module=scheduler status=ok reminder_id={} note_id={} repeat={:?} armed={armed}",
            reminder.id, reminder.note_id, reminder.repeat
        );
        let _ = self.events.send(SchedulerEvent::Created {
            reminder_id: reminder.id,
        });
        Ok(reminder)
    }

    /// Persists an atomic field update, then re-resolves the alert.
    ///
    /// Any outstanding request is cancelled first; the reminder is
    /// re-armed only when the new state is active.
    pub async fn update(
        &self,
        id: ReminderId,
        mut update: ReminderUpdate,
    ) -> Result<Reminder, SchedulerError> {
        update.title = normalize_title(&update.title)?;

        let mut inner = self.inner.lock().await;
        let updated = inner.store.update_fields(id, &update)?;

        self.disarm(&mut inner, id).await;

        let mut armed = false;
        if updated.is_active {
            let now = Utc::now();
            if let Some(fire_at) = resolve_fire_time(&updated, now) {
                armed = self.arm(&mut inner, &updated, fire_at).await;
            }
        }
        drop(inner);

        info!(
            "event=reminder_update module=scheduler status=ok reminder_id={id} active={} armed={armed}",
            updated.is_active
        );
        let _ = self.events.send(SchedulerEvent::Updated { reminder_id: id });
        Ok(updated)
    }

    /// Cancels any outstanding request, then deletes the record.
    ///
    /// Cancellation runs first so the dispatcher holds nothing for this
    /// reminder even when the store delete races a concurrent removal.
    pub async fn delete(&self, id: ReminderId) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        self.disarm(&mut inner, id).await;
        inner.store.delete(id)?;
        drop(inner);

        info!("event=reminder_delete module=scheduler status=ok reminder_id={id}");
        let _ = self.events.send(SchedulerEvent::Deleted { reminder_id: id });
        Ok(())
    }

    /// Cascade hook for note deletion: cancels every affected reminder's
    /// request, then deletes the note (reminders cascade in the store).
    pub async fn delete_for_note(&self, note_id: NoteId) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        let affected = inner.store.list_for_note(note_id)?;
        for reminder in &affected {
            self.disarm(&mut inner, reminder.id).await;
        }
        inner.store.delete_note(note_id)?;
        drop(inner);

        info!(
            "event=note_cascade_delete module=scheduler status=ok note_id={note_id} reminders={}",
            affected.len()
        );
        for reminder in &affected {
            let _ = self.events.send(SchedulerEvent::Deleted {
                reminder_id: reminder.id,
            });
        }
        Ok(())
    }

    /// Handles a fired alert reported by the dispatcher.
    ///
    /// Re-fetches current persisted state, so late or duplicate
    /// deliveries are harmless: a missing reminder is a no-op, and
    /// recomputing the next date from an already-advanced one only
    /// reschedules redundantly.
    ///
    /// An active recurring reminder advances its stored date by exactly
    /// one cycle and re-arms. A one-shot is left untouched: still
    /// active, permanently unscheduled, dismissed by the user.
    pub async fn on_fired(&self, id: ReminderId) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        inner.armed.remove(&id);

        let Some(current) = inner.store.get(id)? else {
            drop(inner);
            info!(
                "event=reminder_fired module=scheduler status=noop reminder_id={id} reason=not_found"
            );
            return Ok(());
        };

        let mut rearmed = false;
        // A late delivery after a deactivating edit leaves the row
        // untouched: inactive reminders carry zero outstanding requests
        // and their stored date belongs to the user.
        if current.is_active {
            if let Some(next_at) = recurrence::next_occurrence(current.remind_at, current.repeat) {
                let advanced = inner.store.update_fields(
                    id,
                    &ReminderUpdate {
                        title: current.title.clone(),
                        remind_at: next_at,
                        is_active: true,
                        repeat: current.repeat,
                    },
                )?;
                rearmed = self.arm(&mut inner, &advanced, next_at).await;
            }
        }
        drop(inner);

        info!(
            "event=reminder_fired module=scheduler status=ok reminder_id={id} rearmed={rearmed}"
        );
        let _ = self.events.send(SchedulerEvent::Fired {
            reminder_id: id,
            rearmed,
        });
        Ok(())
    }

    /// Cancels everything the dispatcher holds and rebuilds the armed
    /// set from persisted active reminders.
    ///
    /// Safe to call at any time (process start, periodic refresh,
    /// manual repair). Idempotent: two consecutive calls with no
    /// intervening mutation produce the same armed set, because arming
    /// dates are derived and never written back.
    pub async fn resync_all(&self) -> Result<usize, SchedulerError> {
        let started_at = Instant::now();
        let mut inner = self.inner.lock().await;

        if let Err(err) = self.dispatcher.cancel_all().await {
            warn!("event=resync module=scheduler status=warn step=cancel_all error={err}");
        }
        inner.armed.clear();

        let active = inner.store.list_active_ordered()?;
        let now = Utc::now();
        let mut armed = 0;
        for current in &active {
            if let Some(fire_at) = resolve_fire_time(current, now) {
                if self.arm(&mut inner, current, fire_at).await {
                    armed += 1;
                }
            }
        }
        drop(inner);

        info!(
            "event=resync module=scheduler status=ok active={} armed={armed} duration_ms={}",
            active.len(),
            started_at.elapsed().as_millis()
        );
        let _ = self.events.send(SchedulerEvent::Resynced { armed });
        Ok(armed)
    }

    /// Fetches one reminder through the scheduler lock.
    pub async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, SchedulerError> {
        let inner = self.inner.lock().await;
        Ok(inner.store.get(id)?)
    }

    /// All reminders of one note, insertion order.
    pub async fn reminders_for_note(
        &self,
        note_id: NoteId,
    ) -> Result<Vec<Reminder>, SchedulerError> {
        let inner = self.inner.lock().await;
        Ok(inner.store.list_for_note(note_id)?)
    }

    /// The note's earliest upcoming active reminder.
    pub async fn next_reminder_for_note(
        &self,
        note_id: NoteId,
    ) -> Result<Option<Reminder>, SchedulerError> {
        let inner = self.inner.lock().await;
        let reminders = inner.store.list_for_note(note_id)?;
        Ok(reminder::next_reminder(&reminders, Utc::now()).cloned())
    }

    /// Whether the note has any active reminder.
    pub async fn note_has_active_reminders(
        &self,
        note_id: NoteId,
    ) -> Result<bool, SchedulerError> {
        let inner = self.inner.lock().await;
        let reminders = inner.store.list_for_note(note_id)?;
        Ok(reminder::has_active_reminders(&reminders))
    }

    /// Active reminders due within the next 24 hours.
    pub async fn due_within_day(&self) -> Result<Vec<Reminder>, SchedulerError> {
        let inner = self.inner.lock().await;
        Ok(inner.store.list_due_within(Utc::now(), Duration::hours(24))?)
    }

    /// Active reminders whose date has passed.
    pub async fn overdue(&self) -> Result<Vec<Reminder>, SchedulerError> {
        let inner = self.inner.lock().await;
        Ok(inner.store.list_overdue(Utc::now())?)
    }

    /// Whether a dispatcher request is currently outstanding for `id`.
    pub async fn is_armed(&self, id: ReminderId) -> bool {
        self.inner.lock().await.armed.contains_key(&id)
    }

    /// Number of currently outstanding dispatcher requests.
    pub async fn armed_count(&self) -> usize {
        self.inner.lock().await.armed.len()
    }

    /// Issues one schedule call and records the mapping on success.
    ///
    /// Rejections are soft: logged at `warn`, reminder left unscheduled
    /// until the next successful resync or update.
    async fn arm(&self, inner: &mut Inner<S>, current: &Reminder, fire_at: DateTime<Utc>) -> bool {
        let request_id = RequestId::for_reminder(current.id);
        let request = AlertRequest {
            request_id: request_id.clone(),
            fire_at,
            title: current.title.clone(),
            body: format!("Due {}", fire_at.format("%Y-%m-%d %H:%M")),
            note_id: current.note_id,
            reminder_id: current.id,
        };

        match self.dispatcher.schedule(request).await {
            Ok(()) => {
                inner.armed.insert(current.id, request_id);
                true
            }
            Err(err) => {
                warn!(
                    "event=dispatch_schedule module=scheduler status=error reminder_id={} error={err}",
                    current.id
                );
                false
            }
        }
    }

    /// Drops the map entry and cancels against the derived request id.
    ///
    /// The derived id is cancelled even without a map entry, so a map
    /// lost to a restart cannot leave a stale alert behind.
    async fn disarm(&self, inner: &mut Inner<S>, id: ReminderId) {
        inner.armed.remove(&id);
        let request_id = RequestId::for_reminder(id);
        if let Err(err) = self.dispatcher.cancel(&request_id).await {
            warn!(
                "event=dispatch_cancel module=scheduler status=error reminder_id={id} error={err}"
            );
        }
    }
}

/// Resolves the instant to arm, or `None` when nothing should fire.
///
/// Future dates arm as-is; past recurring dates skip to the first
/// future occurrence (derived only, never persisted); past one-shots
/// resolve to nothing.
fn resolve_fire_time(current: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if current.remind_at > now {
        return Some(current.remind_at);
    }
    recurrence::first_future_occurrence(current.remind_at, current.repeat, now)
}

fn normalize_title(value: &str) -> Result<String, SchedulerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SchedulerError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
