use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::db::init_db;
use crate::error::Result;
use crate::types::{ActionPayload, PendingAction};

/// Durable, expiring, user-scoped storage of proposed actions.
///
/// Ownership is enforced by callers (compare `user_id` on the returned
/// row); the store's job is identity assignment, expiry bookkeeping, and
/// the atomic claim.
#[derive(Clone)]
pub struct PendingActionStore {
    conn: Arc<Mutex<Connection>>,
}

impl PendingActionStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a proposal and return it with its fresh id.
    pub fn create(
        &self,
        user_id: &str,
        payload: &ActionPayload,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PendingAction> {
        let now = Utc::now().to_rfc3339();
        let expires = expires_at.map(|dt| dt.to_rfc3339());
        let payload_json = serde_json::to_string(payload)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO pending_actions (user_id, kind, payload, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![user_id, payload.kind(), payload_json, expires, now],
        )?;
        let id = conn.last_insert_rowid();
        info!(pending_id = id, user_id = %user_id, kind = payload.kind(), "pending action created");

        Ok(PendingAction {
            id,
            user_id: user_id.to_string(),
            payload: payload.clone(),
            expires_at: expires,
            created_at: now,
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<PendingAction>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, user_id, payload, expires_at, created_at
                 FROM pending_actions WHERE id = ?1",
                [id],
                row_to_pending,
            )
            .optional()?;
        match row {
            Some((id, user_id, payload_json, expires_at, created_at)) => {
                let payload: ActionPayload = serde_json::from_str(&payload_json)?;
                Ok(Some(PendingAction {
                    id,
                    user_id,
                    payload,
                    expires_at,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Secondary lookup for the OAuth flow: the `state` value lives inside
    /// the payload document, not in a typed column.
    pub fn find_oauth_state(&self, state: &str) -> Result<Option<PendingAction>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, user_id, payload, expires_at, created_at
                 FROM pending_actions
                 WHERE kind = 'github_oauth'
                   AND json_extract(payload, '$.state') = ?1",
                [state],
                row_to_pending,
            )
            .optional()?;
        match row {
            Some((id, user_id, payload_json, expires_at, created_at)) => {
                let payload: ActionPayload = serde_json::from_str(&payload_json)?;
                Ok(Some(PendingAction {
                    id,
                    user_id,
                    payload,
                    expires_at,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Atomically remove the row; true iff this caller removed it.
    ///
    /// This is the single-winner primitive: of any number of concurrent
    /// confirms, exactly one sees `true` and goes on to execute.
    pub fn claim(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM pending_actions WHERE id = ?1", [id])?;
        Ok(n == 1)
    }

    /// Idempotent delete; no error when the row is already gone.
    pub fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM pending_actions WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Delete every row whose expiry is strictly before `now`.
    ///
    /// Runs as a single statement, so it needs no prior read and is safe
    /// concurrent with create/claim traffic.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let now_str = now.to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "DELETE FROM pending_actions
             WHERE expires_at IS NOT NULL AND expires_at < ?1",
            [now_str],
        )?;
        if n > 0 {
            debug!(count = n, "expired pending actions swept");
        }
        Ok(n)
    }
}

type PendingRow = (i64, String, String, Option<String>, String);

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}
