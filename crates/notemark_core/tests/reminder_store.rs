use chrono::{DateTime, Duration, TimeZone, Utc};
use notemark_core::db::migrations::latest_version;
use notemark_core::db::open_db_in_memory;
use notemark_core::{
    NoteId, Reminder, ReminderStore, ReminderUpdate, RepeatKind, SqliteReminderStore, StoreError,
};
use rusqlite::Connection;
use uuid::Uuid;

fn store_with_note() -> (SqliteReminderStore, NoteId) {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteReminderStore::try_new(conn).unwrap();
    let note_id = store.create_note("Groceries").unwrap();
    (store, note_id)
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

#[test]
fn insert_and_get_roundtrip() {
    let (store, note_id) = store_with_note();

    let reminder = Reminder::new(note_id, "buy milk", at(2024, 6, 1, 9), RepeatKind::Weekly);
    store.insert(&reminder).unwrap();

    let loaded = store.get(reminder.id).unwrap().unwrap();
    assert_eq!(loaded.id, reminder.id);
    assert_eq!(loaded.note_id, note_id);
    assert_eq!(loaded.title, "buy milk");
    assert_eq!(loaded.remind_at, at(2024, 6, 1, 9));
    assert_eq!(loaded.repeat, RepeatKind::Weekly);
    assert!(loaded.is_active);
}

#[test]
fn insert_rejects_unknown_note() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteReminderStore::try_new(conn).unwrap();

    let orphan = Reminder::new(Uuid::new_v4(), "orphan", at(2024, 6, 1, 9), RepeatKind::None);
    let err = store.insert(&orphan).unwrap_err();
    assert!(matches!(err, StoreError::NoteNotFound(id) if id == orphan.note_id));
}

#[test]
fn update_fields_commits_all_fields_together() {
    let (store, note_id) = store_with_note();
    let reminder = Reminder::new(note_id, "draft", at(2024, 6, 1, 9), RepeatKind::None);
    store.insert(&reminder).unwrap();

    let updated = store
        .update_fields(
            reminder.id,
            &ReminderUpdate {
                title: "final".to_string(),
                remind_at: at(2024, 7, 1, 10),
                is_active: false,
                repeat: RepeatKind::Monthly,
            },
        )
        .unwrap();

    assert_eq!(updated.title, "final");
    assert_eq!(updated.remind_at, at(2024, 7, 1, 10));
    assert!(!updated.is_active);
    assert_eq!(updated.repeat, RepeatKind::Monthly);

    let reloaded = store.get(reminder.id).unwrap().unwrap();
    assert_eq!(reloaded, updated);
}

#[test]
fn update_fields_not_found() {
    let (store, _) = store_with_note();
    let missing = Uuid::new_v4();

    let err = store
        .update_fields(
            missing,
            &ReminderUpdate {
                title: "ghost".to_string(),
                remind_at: at(2024, 6, 1, 9),
                is_active: true,
                repeat: RepeatKind::None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == missing));
}

#[test]
fn delete_removes_row_and_reports_missing() {
    let (store, note_id) = store_with_note();
    let reminder = Reminder::new(note_id, "once", at(2024, 6, 1, 9), RepeatKind::None);
    store.insert(&reminder).unwrap();

    store.delete(reminder.id).unwrap();
    assert!(store.get(reminder.id).unwrap().is_none());

    let err = store.delete(reminder.id).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == reminder.id));
}

#[test]
fn deleting_note_cascades_to_reminders() {
    let (store, note_id) = store_with_note();
    let keep_note = store.create_note("Keep").unwrap();

    let doomed_a = Reminder::new(note_id, "a", at(2024, 6, 1, 9), RepeatKind::None);
    let doomed_b = Reminder::new(note_id, "b", at(2024, 6, 2, 9), RepeatKind::Daily);
    let kept = Reminder::new(keep_note, "c", at(2024, 6, 3, 9), RepeatKind::None);
    store.insert(&doomed_a).unwrap();
    store.insert(&doomed_b).unwrap();
    store.insert(&kept).unwrap();

    store.delete_note(note_id).unwrap();

    assert!(store.get(doomed_a.id).unwrap().is_none());
    assert!(store.get(doomed_b.id).unwrap().is_none());
    assert!(store.get(kept.id).unwrap().is_some());
}

#[test]
fn list_active_ordered_sorts_by_date_with_stable_ties() {
    let (store, note_id) = store_with_note();

    let later = Reminder::new(note_id, "later", at(2024, 6, 3, 9), RepeatKind::None);
    let tie_first = Reminder::new(note_id, "tie first", at(2024, 6, 1, 9), RepeatKind::None);
    let tie_second = Reminder::new(note_id, "tie second", at(2024, 6, 1, 9), RepeatKind::None);
    let mut inactive = Reminder::new(note_id, "inactive", at(2024, 6, 2, 9), RepeatKind::None);
    inactive.is_active = false;

    store.insert(&later).unwrap();
    store.insert(&tie_first).unwrap();
    store.insert(&tie_second).unwrap();
    store.insert(&inactive).unwrap();

    let active = store.list_active_ordered().unwrap();
    let ids: Vec<_> = active.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![tie_first.id, tie_second.id, later.id]);
}

#[test]
fn list_for_note_keeps_insertion_order() {
    let (store, note_id) = store_with_note();
    let other_note = store.create_note("Other").unwrap();

    let first = Reminder::new(note_id, "first", at(2024, 6, 9, 9), RepeatKind::None);
    let second = Reminder::new(note_id, "second", at(2024, 6, 1, 9), RepeatKind::None);
    let elsewhere = Reminder::new(other_note, "elsewhere", at(2024, 6, 1, 9), RepeatKind::None);
    store.insert(&first).unwrap();
    store.insert(&second).unwrap();
    store.insert(&elsewhere).unwrap();

    let listed = store.list_for_note(note_id).unwrap();
    let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[test]
fn list_due_within_bounds_the_window() {
    let (store, note_id) = store_with_note();
    let now = at(2024, 6, 1, 12);

    let overdue = Reminder::new(note_id, "overdue", now - Duration::hours(1), RepeatKind::None);
    let in_window = Reminder::new(note_id, "soon", now + Duration::hours(6), RepeatKind::None);
    let beyond = Reminder::new(note_id, "beyond", now + Duration::hours(30), RepeatKind::None);
    store.insert(&overdue).unwrap();
    store.insert(&in_window).unwrap();
    store.insert(&beyond).unwrap();

    let due = store.list_due_within(now, Duration::hours(24)).unwrap();
    let ids: Vec<_> = due.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![in_window.id]);
}

#[test]
fn list_overdue_returns_only_active_past_reminders() {
    let (store, note_id) = store_with_note();
    let now = at(2024, 6, 1, 12);

    let overdue = Reminder::new(note_id, "overdue", now - Duration::hours(1), RepeatKind::None);
    let mut inactive_past =
        Reminder::new(note_id, "inactive", now - Duration::hours(2), RepeatKind::None);
    inactive_past.is_active = false;
    let upcoming = Reminder::new(note_id, "upcoming", now + Duration::hours(1), RepeatKind::None);
    store.insert(&overdue).unwrap();
    store.insert(&inactive_past).unwrap();
    store.insert(&upcoming).unwrap();

    let listed = store.list_overdue(now).unwrap();
    let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![overdue.id]);
}

#[test]
fn unknown_repeat_text_falls_back_to_none() {
    // Write a row with repeat text from a newer schema revision before
    // handing the connection to the store; the read must degrade to
    // `none` instead of failing.
    let conn = open_db_in_memory().unwrap();
    let note_id = Uuid::new_v4();
    let reminder_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO notes (uuid, title) VALUES (?1, 'Groceries');",
        [note_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO reminders (uuid, note_uuid, title, remind_at, created_at, is_active, repeat_kind)
         VALUES (?1, ?2, 'odd rule', 1717232400000, 1717232400000, 1, 'fortnightly');",
        [reminder_id.to_string(), note_id.to_string()],
    )
    .unwrap();

    let store = SqliteReminderStore::try_new(conn).unwrap();
    let loaded = store.get(reminder_id).unwrap().unwrap();
    assert_eq!(loaded.repeat, RepeatKind::None);
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteReminderStore::try_new(conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn try_new_rejects_missing_reminders_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteReminderStore::try_new(conn);
    assert!(matches!(result, Err(StoreError::MissingRequiredTable("notes"))));
}

#[test]
fn try_new_rejects_missing_reminder_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE notes (
            uuid TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE reminders (
            uuid TEXT PRIMARY KEY NOT NULL,
            note_uuid TEXT NOT NULL,
            title TEXT NOT NULL,
            remind_at INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteReminderStore::try_new(conn);
    assert!(matches!(
        result,
        Err(StoreError::MissingRequiredColumn {
            table: "reminders",
            column: "created_at"
        })
    ));
}
