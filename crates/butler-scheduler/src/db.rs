use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduling schema.
///
/// Safe to call on every startup. The `remind_at` index keeps the due query
/// cheap; `user_automations` carries the one-row-per-(user, kind) uniqueness
/// that the read-modify-write config service relies on.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reminders (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL,
            message     TEXT NOT NULL,
            remind_at   TEXT NOT NULL,      -- RFC3339, UTC
            is_done     INTEGER NOT NULL DEFAULT 0,
            kind        TEXT NOT NULL DEFAULT 'plain',  -- 'plain' | 'focus'
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reminders_due
            ON reminders (is_done, remind_at);

        CREATE TABLE IF NOT EXISTS user_automations (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT NOT NULL,
            kind          TEXT NOT NULL,    -- 'daily_digest'
            enabled       INTEGER NOT NULL DEFAULT 0,
            config        TEXT NOT NULL,    -- JSON: {\"time\":\"HH:MM\",\"items\":[...]}
            last_sent_at  TEXT,             -- RFC3339 or NULL
            UNIQUE (user_id, kind)
        );",
    )?;
    Ok(())
}
