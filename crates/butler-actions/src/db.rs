use rusqlite::Connection;

use crate::error::Result;

/// Initialise the pending-actions schema.
///
/// Safe to call on every startup. The expiry index keeps the sweep cheap;
/// the payload lookup for the OAuth flow goes through `json_extract`, which
/// SQLite serves from the JSON1 extension bundled with rusqlite.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pending_actions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL,
            kind        TEXT NOT NULL,      -- 'github' | 'github_oauth'
            payload     TEXT NOT NULL,      -- JSON-encoded ActionPayload
            expires_at  TEXT,               -- RFC3339 or NULL
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pending_expiry
            ON pending_actions (expires_at);",
    )?;
    Ok(())
}
