use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::types::{Reminder, ReminderKind};

const REMINDER_COLUMNS: &str = "id, user_id, message, remind_at, is_done, kind, created_at";

/// SQLite-backed reminder store.
///
/// Delivery marks a row done only after a successful send, so a failed send
/// leaves the row due and the next tick retries it. Cancellation marks done
/// rather than deleting; snooze reschedules and resets `is_done`, which lets
/// an already-fired reminder fire again at the new time.
#[derive(Clone)]
pub struct ReminderStore {
    conn: Arc<Mutex<Connection>>,
}

impl ReminderStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn create(
        &self,
        user_id: &str,
        message: &str,
        remind_at: DateTime<Utc>,
        kind: ReminderKind,
    ) -> Result<Reminder> {
        let now = Utc::now().to_rfc3339();
        let remind_at = remind_at.to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO reminders (user_id, message, remind_at, is_done, kind, created_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            rusqlite::params![user_id, message, remind_at, kind.as_str(), now],
        )?;
        let id = conn.last_insert_rowid();
        info!(reminder_id = id, user_id = %user_id, remind_at = %remind_at, "reminder created");

        Ok(Reminder {
            id,
            user_id: user_id.to_string(),
            message: message.to_string(),
            remind_at,
            is_done: false,
            kind,
            created_at: now,
        })
    }

    /// All undone reminders whose time has arrived, oldest first.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let now_str = now.to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE is_done = 0 AND remind_at <= ?1
             ORDER BY remind_at"
        ))?;
        let reminders = stmt
            .query_map([&now_str], row_to_reminder)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(reminders)
    }

    /// Reschedule `minutes` from now and reset `is_done`.
    pub fn snooze(&self, user_id: &str, id: i64, minutes: i64) -> Result<Reminder> {
        let new_at = (Utc::now() + Duration::minutes(minutes)).to_rfc3339();
        {
            let conn = self.conn.lock().unwrap();
            let n = conn.execute(
                "UPDATE reminders SET remind_at = ?3, is_done = 0
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, new_at],
            )?;
            if n == 0 {
                return Err(SchedulerError::ReminderNotFound { id });
            }
        }
        info!(reminder_id = id, user_id = %user_id, minutes, "reminder snoozed");
        self.get(user_id, id)
    }

    pub fn mark_done(&self, user_id: &str, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE reminders SET is_done = 1 WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )?;
        if n == 0 {
            return Err(SchedulerError::ReminderNotFound { id });
        }
        Ok(())
    }

    fn get(&self, user_id: &str, id: i64) -> Result<Reminder> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1 AND user_id = ?2"),
            rusqlite::params![id, user_id],
            row_to_reminder,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => SchedulerError::ReminderNotFound { id },
            other => other.into(),
        })
    }
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let kind_str: String = row.get(5)?;
    Ok(Reminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message: row.get(2)?,
        remind_at: row.get(3)?,
        is_done: row.get::<_, i64>(4)? != 0,
        kind: kind_str.parse().unwrap_or(ReminderKind::Plain),
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReminderStore {
        ReminderStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn due_returns_only_arrived_undone_rows() {
        let store = store();
        let now = Utc::now();
        let past = store
            .create("u1", "stretch", now - Duration::minutes(1), ReminderKind::Plain)
            .unwrap();
        store
            .create("u1", "later", now + Duration::hours(1), ReminderKind::Plain)
            .unwrap();
        let done = store
            .create("u1", "old", now - Duration::hours(1), ReminderKind::Plain)
            .unwrap();
        store.mark_done("u1", done.id).unwrap();

        let due = store.due(now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);
    }

    #[test]
    fn mark_done_removes_from_due() {
        let store = store();
        let now = Utc::now();
        let r = store
            .create("u1", "water plants", now, ReminderKind::Plain)
            .unwrap();
        store.mark_done("u1", r.id).unwrap();
        assert!(store.due(now).unwrap().is_empty());
    }

    #[test]
    fn snooze_resets_done_and_reschedules() {
        let store = store();
        let now = Utc::now();
        let r = store
            .create("u1", "call mum", now - Duration::minutes(5), ReminderKind::Plain)
            .unwrap();
        store.mark_done("u1", r.id).unwrap();

        let snoozed = store.snooze("u1", r.id, 10).unwrap();
        assert!(!snoozed.is_done);
        // Not due now, but due once the snooze window passes.
        assert!(store.due(now).unwrap().is_empty());
        assert_eq!(store.due(now + Duration::minutes(11)).unwrap().len(), 1);
    }

    #[test]
    fn ownership_is_checked_on_mutation() {
        let store = store();
        let r = store
            .create("u1", "secret", Utc::now(), ReminderKind::Plain)
            .unwrap();
        assert!(matches!(
            store.mark_done("u2", r.id),
            Err(SchedulerError::ReminderNotFound { .. })
        ));
        assert!(matches!(
            store.snooze("u2", r.id, 10),
            Err(SchedulerError::ReminderNotFound { .. })
        ));
    }

    #[test]
    fn kind_roundtrips() {
        let store = store();
        let now = Utc::now();
        store
            .create("u1", "deep work", now - Duration::minutes(1), ReminderKind::Focus)
            .unwrap();
        let due = store.due(now).unwrap();
        assert_eq!(due[0].kind, ReminderKind::Focus);
    }
}
