use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::db::{init_db, row_to_user, USER_COLUMNS};
use crate::error::{Result, UserError};
use crate::seal::TokenSeal;
use crate::types::User;

/// SQLite-backed user store.
///
/// Uses its own `Connection` behind a mutex so request handlers and the
/// scheduler can share one handle without conflicting.
#[derive(Clone)]
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
    default_timezone: String,
}

impl UserStore {
    pub fn new(conn: Connection, default_timezone: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            default_timezone: default_timezone.into(),
        })
    }

    pub fn get(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                [user_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Fetch the user, creating a fresh row with defaults on first contact.
    pub fn ensure(&self, user_id: &str, display_name: &str) -> Result<User> {
        if let Some(user) = self.get(user_id)? {
            return Ok(user);
        }
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO users (user_id, display_name, timezone, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id) DO NOTHING",
                rusqlite::params![user_id, display_name, self.default_timezone, now],
            )?;
        }
        info!(user_id = %user_id, "user created");
        self.get(user_id)?.ok_or_else(|| UserError::NotFound {
            id: user_id.to_string(),
        })
    }

    pub fn set_timezone(&self, user_id: &str, timezone: &str) -> Result<()> {
        self.update_field(user_id, "timezone", Some(timezone))
    }

    /// Record the last-used repository slug as the new default.
    pub fn set_default_repo(&self, user_id: &str, slug: &str) -> Result<()> {
        self.update_field(user_id, "default_repo", Some(slug))
    }

    /// Seal and store the GitHub access token.
    pub fn store_github_token(&self, user_id: &str, token: &str, seal: &TokenSeal) -> Result<()> {
        let blob = seal.seal(token)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE users SET github_token = ?2, updated_at = ?3 WHERE user_id = ?1",
            rusqlite::params![user_id, blob, now],
        )?;
        if n == 0 {
            return Err(UserError::NotFound {
                id: user_id.to_string(),
            });
        }
        info!(user_id = %user_id, "github token stored");
        Ok(())
    }

    /// Unseal the stored token on demand. `Ok(None)` means not connected.
    pub fn github_token(&self, user_id: &str, seal: &TokenSeal) -> Result<Option<String>> {
        let blob: Option<Vec<u8>> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT github_token FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten()
        };
        match blob {
            Some(blob) => Ok(Some(seal.open(&blob)?)),
            None => Ok(None),
        }
    }

    fn update_field(&self, user_id: &str, column: &str, value: Option<&str>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            &format!("UPDATE users SET {column} = ?2, updated_at = ?3 WHERE user_id = ?1"),
            rusqlite::params![user_id, value, now],
        )?;
        if n == 0 {
            return Err(UserError::NotFound {
                id: user_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        UserStore::new(Connection::open_in_memory().unwrap(), "UTC").unwrap()
    }

    #[test]
    fn ensure_creates_with_default_timezone() {
        let store = store();
        let user = store.ensure("42", "Alice").unwrap();
        assert_eq!(user.user_id, "42");
        assert_eq!(user.timezone, "UTC");
        assert!(!user.github_connected);
        assert!(user.default_repo.is_none());
    }

    #[test]
    fn ensure_is_idempotent() {
        let store = store();
        store.ensure("42", "Alice").unwrap();
        store.set_timezone("42", "Europe/Berlin").unwrap();
        let again = store.ensure("42", "Alice").unwrap();
        assert_eq!(again.timezone, "Europe/Berlin");
    }

    #[test]
    fn default_repo_roundtrip() {
        let store = store();
        store.ensure("42", "Alice").unwrap();
        store.set_default_repo("42", "acme/widgets").unwrap();
        let user = store.get("42").unwrap().unwrap();
        assert_eq!(user.default_repo.as_deref(), Some("acme/widgets"));
    }

    #[test]
    fn token_roundtrip_and_connected_flag() {
        let store = store();
        let seal = TokenSeal::from_hex_key(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        )
        .unwrap();
        store.ensure("42", "Alice").unwrap();
        assert_eq!(store.github_token("42", &seal).unwrap(), None);

        store.store_github_token("42", "gho_abc", &seal).unwrap();
        assert!(store.get("42").unwrap().unwrap().github_connected);
        assert_eq!(
            store.github_token("42", &seal).unwrap().as_deref(),
            Some("gho_abc")
        );
    }

    #[test]
    fn updates_on_missing_user_report_not_found() {
        let store = store();
        assert!(matches!(
            store.set_timezone("nope", "UTC"),
            Err(UserError::NotFound { .. })
        ));
    }
}
