//! Reminder store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD plus the filtered queries the scheduler relies on.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `update_fields` writes title/date/active/repeat in one statement,
//!   so a multi-field edit commits together or not at all.
//! - Read paths reject malformed persisted state (`InvalidData`) except
//!   for unknown repeat text, which falls back to `none` by contract.
//! - Deleting a note cascades to its reminders (FK `ON DELETE CASCADE`).

use crate::db::{migrations::latest_version, DbError};
use crate::model::reminder::{NoteId, Reminder, ReminderId, RepeatKind};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REMINDER_SELECT_SQL: &str = "SELECT
    uuid,
    note_uuid,
    title,
    remind_at,
    created_at,
    is_active,
    repeat_kind
FROM reminders";

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence error for reminder store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound(ReminderId),
    NoteNotFound(NoteId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "reminder not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted reminder data: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; run migrations first"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table is missing: {table}")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column is missing: {table}.{column}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Atomic field set for a reminder edit.
///
/// All four fields persist together; partial edits copy the current
/// values into the untouched slots before calling the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderUpdate {
    pub title: String,
    pub remind_at: DateTime<Utc>,
    pub is_active: bool,
    pub repeat: RepeatKind,
}

/// Store interface the scheduler orchestrates.
///
/// `Send` bound: the scheduler moves the store behind its own
/// single-writer mutex and may be driven from multiple tasks.
pub trait ReminderStore: Send {
    /// Creates a minimal note owner record and returns its id.
    fn create_note(&self, title: &str) -> StoreResult<NoteId>;
    /// Deletes a note; its reminders cascade away with it.
    fn delete_note(&self, note_id: NoteId) -> StoreResult<()>;
    /// Persists one new reminder.
    fn insert(&self, reminder: &Reminder) -> StoreResult<()>;
    /// Applies one atomic multi-field update and returns the new row.
    fn update_fields(&self, id: ReminderId, update: &ReminderUpdate) -> StoreResult<Reminder>;
    /// Fetches one reminder by id.
    fn get(&self, id: ReminderId) -> StoreResult<Option<Reminder>>;
    /// Deletes one reminder by id.
    fn delete(&self, id: ReminderId) -> StoreResult<()>;
    /// All active reminders, ascending by date; equal dates keep
    /// insertion order.
    fn list_active_ordered(&self) -> StoreResult<Vec<Reminder>>;
    /// All reminders of one note, in insertion order.
    fn list_for_note(&self, note_id: NoteId) -> StoreResult<Vec<Reminder>>;
    /// Active reminders due in `[now, now + window]`, ascending by date.
    fn list_due_within(&self, now: DateTime<Utc>, window: Duration) -> StoreResult<Vec<Reminder>>;
    /// Active reminders whose date has already passed.
    fn list_overdue(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reminder>>;
}

/// SQLite-backed reminder store.
///
/// Owns its connection so the scheduler can take the whole store behind
/// its mutex.
pub struct SqliteReminderStore {
    conn: Connection,
}

impl SqliteReminderStore {
    /// Wraps a migrated, ready connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not carry what this store reads and writes.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }
}

impl ReminderStore for SqliteReminderStore {
    fn create_note(&self, title: &str) -> StoreResult<NoteId> {
        let note_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO notes (uuid, title) VALUES (?1, ?2);",
            params![note_id.to_string(), title],
        )?;
        Ok(note_id)
    }

    fn delete_note(&self, note_id: NoteId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notes WHERE uuid = ?1;",
            [note_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NoteNotFound(note_id));
        }
        Ok(())
    }

    fn insert(&self, reminder: &Reminder) -> StoreResult<()> {
        if !note_exists(&self.conn, reminder.note_id)? {
            return Err(StoreError::NoteNotFound(reminder.note_id));
        }

        self.conn.execute(
            "INSERT INTO reminders (
                uuid,
                note_uuid,
                title,
                remind_at,
                created_at,
                is_active,
                repeat_kind
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                reminder.id.to_string(),
                reminder.note_id.to_string(),
                reminder.title.as_str(),
                reminder.remind_at.timestamp_millis(),
                reminder.created_at.timestamp_millis(),
                bool_to_int(reminder.is_active),
                repeat_kind_to_db(reminder.repeat),
            ],
        )?;
        Ok(())
    }

    fn update_fields(&self, id: ReminderId, update: &ReminderUpdate) -> StoreResult<Reminder> {
        let changed = self.conn.execute(
            "UPDATE reminders
             SET
                title = ?1,
                remind_at = ?2,
                is_active = ?3,
                repeat_kind = ?4
             WHERE uuid = ?5;",
            params![
                update.title.as_str(),
                update.remind_at.timestamp_millis(),
                bool_to_int(update.is_active),
                repeat_kind_to_db(update.repeat),
                id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    fn get(&self, id: ReminderId) -> StoreResult<Option<Reminder>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REMINDER_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reminder_row(row)?));
        }
        Ok(None)
    }

    fn delete(&self, id: ReminderId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM reminders WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn list_active_ordered(&self) -> StoreResult<Vec<Reminder>> {
        self.query_reminders(
            &format!(
                "{REMINDER_SELECT_SQL}
                 WHERE is_active = 1
                 ORDER BY remind_at ASC, rowid ASC;"
            ),
            params![],
        )
    }

    fn list_for_note(&self, note_id: NoteId) -> StoreResult<Vec<Reminder>> {
        self.query_reminders(
            &format!(
                "{REMINDER_SELECT_SQL}
                 WHERE note_uuid = ?1
                 ORDER BY rowid ASC;"
            ),
            params![note_id.to_string()],
        )
    }

    fn list_due_within(&self, now: DateTime<Utc>, window: Duration) -> StoreResult<Vec<Reminder>> {
        let from_ms = now.timestamp_millis();
        let to_ms = (now + window).timestamp_millis();
        self.query_reminders(
            &format!(
                "{REMINDER_SELECT_SQL}
                 WHERE is_active = 1
                   AND remind_at >= ?1
                   AND remind_at <= ?2
                 ORDER BY remind_at ASC, rowid ASC;"
            ),
            params![from_ms, to_ms],
        )
    }

    fn list_overdue(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reminder>> {
        self.query_reminders(
            &format!(
                "{REMINDER_SELECT_SQL}
                 WHERE is_active = 1
                   AND remind_at < ?1
                 ORDER BY remind_at ASC, rowid ASC;"
            ),
            params![now.timestamp_millis()],
        )
    }
}

impl SqliteReminderStore {
    fn query_reminders(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> StoreResult<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut reminders = Vec::new();
        while let Some(row) = rows.next()? {
            reminders.push(parse_reminder_row(row)?);
        }
        Ok(reminders)
    }
}

fn parse_reminder_row(row: &Row<'_>) -> StoreResult<Reminder> {
    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_active value `{other}` in reminders.is_active"
            )));
        }
    };

    let repeat_text: String = row.get("repeat_kind")?;

    Ok(Reminder {
        id: parse_uuid(&row.get::<_, String>("uuid")?, "reminders.uuid")?,
        note_id: parse_uuid(&row.get::<_, String>("note_uuid")?, "reminders.note_uuid")?,
        title: row.get("title")?,
        remind_at: parse_epoch_ms(row.get("remind_at")?, "reminders.remind_at")?,
        created_at: parse_epoch_ms(row.get("created_at")?, "reminders.created_at")?,
        is_active,
        repeat: parse_repeat_kind(&repeat_text),
    })
}

fn repeat_kind_to_db(kind: RepeatKind) -> &'static str {
    match kind {
        RepeatKind::None => "none",
        RepeatKind::Daily => "daily",
        RepeatKind::Weekly => "weekly",
        RepeatKind::Monthly => "monthly",
        RepeatKind::Yearly => "yearly",
        RepeatKind::Weekdays => "weekdays",
        RepeatKind::Weekends => "weekends",
    }
}

/// Lenient by contract: unknown repeat text becomes `none` so an old
/// binary reading a newer row degrades to a one-shot instead of failing.
fn parse_repeat_kind(value: &str) -> RepeatKind {
    match value {
        "daily" => RepeatKind::Daily,
        "weekly" => RepeatKind::Weekly,
        "monthly" => RepeatKind::Monthly,
        "yearly" => RepeatKind::Yearly,
        "weekdays" => RepeatKind::Weekdays,
        "weekends" => RepeatKind::Weekends,
        _ => RepeatKind::None,
    }
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_epoch_ms(value: i64, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid timestamp `{value}` in {column}"))
    })
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn note_exists(conn: &Connection, note_id: NoteId) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE uuid = ?1);",
        [note_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["notes", "reminders"] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }

    for column in [
        "uuid",
        "note_uuid",
        "title",
        "remind_at",
        "created_at",
        "is_active",
        "repeat_kind",
    ] {
        if !table_has_column(conn, "reminders", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "reminders",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &'static str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
