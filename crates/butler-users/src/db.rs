use rusqlite::Connection;

use crate::error::Result;
use crate::types::User;

/// Map a SELECT row (column order from USER_COLUMNS) to a User.
/// Centralised here so every query in this crate stays consistent.
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        timezone: row.get(2)?,
        default_repo: row.get(3)?,
        github_connected: row.get::<_, Option<Vec<u8>>>(4)?.is_some(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) const USER_COLUMNS: &str =
    "user_id, display_name, timezone, default_repo, github_token, created_at, updated_at";

/// Initialise the users table. Safe to call on every startup — CREATE IF
/// NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id       TEXT PRIMARY KEY NOT NULL,
            display_name  TEXT NOT NULL DEFAULT '',
            timezone      TEXT NOT NULL DEFAULT 'UTC',
            default_repo  TEXT,
            github_token  BLOB,    -- AES-256-GCM sealed, nonce-prefixed
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );",
    )?;
    Ok(())
}
