//! Daily-digest automation: the row store and the config service.
//!
//! Every mutation is a read-modify-write against the unique (user, kind)
//! row, creating it with defaults on first touch. Last write wins; the
//! access pattern is one owning user at low frequency, so no optimistic
//! concurrency is needed.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::types::{Automation, DigestConfig, DAILY_DIGEST};

const AUTOMATION_COLUMNS: &str = "id, user_id, kind, enabled, config, last_sent_at";

#[derive(Clone)]
pub struct AutomationStore {
    conn: Arc<Mutex<Connection>>,
}

impl AutomationStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn get(&self, user_id: &str, kind: &str) -> Result<Option<Automation>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {AUTOMATION_COLUMNS} FROM user_automations
                     WHERE user_id = ?1 AND kind = ?2"
                ),
                rusqlite::params![user_id, kind],
                row_to_automation,
            )
            .optional()?;
        Ok(row)
    }

    /// Every enabled automation of `kind`, across all users.
    pub fn list_enabled(&self, kind: &str) -> Result<Vec<Automation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {AUTOMATION_COLUMNS} FROM user_automations
             WHERE kind = ?1 AND enabled = 1"
        ))?;
        let rows = stmt
            .query_map([kind], row_to_automation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Write the full row state, inserting on first touch.
    pub fn upsert(
        &self,
        user_id: &str,
        kind: &str,
        enabled: bool,
        config: &DigestConfig,
    ) -> Result<Automation> {
        let config_json = serde_json::to_string(config)?;
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO user_automations (user_id, kind, enabled, config)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, kind) DO UPDATE SET enabled = ?3, config = ?4",
                rusqlite::params![user_id, kind, enabled, config_json],
            )?;
        }
        self.get(user_id, kind)?.ok_or_else(|| {
            SchedulerError::Database(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Stamp a successful delivery; gates the once-per-local-day dedup.
    pub fn set_last_sent(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user_automations SET last_sent_at = ?2 WHERE id = ?1",
            rusqlite::params![id, now.to_rfc3339()],
        )?;
        Ok(())
    }
}

fn row_to_automation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Automation> {
    let config_json: String = row.get(4)?;
    let config: DigestConfig = serde_json::from_str(&config_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Automation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        config,
        last_sent_at: row.get(5)?,
    })
}

/// Natural-language-sized mutations of a user's digest configuration.
///
/// Each operation returns the string shown back in chat.
#[derive(Clone)]
pub struct DigestService {
    automations: AutomationStore,
}

impl DigestService {
    pub fn new(automations: AutomationStore) -> Self {
        Self { automations }
    }

    pub fn overview(&self, user_id: &str) -> Result<String> {
        let (enabled, config) = self.load(user_id)?;
        let state = if enabled { "on" } else { "off" };
        if config.items.is_empty() {
            return Ok(format!(
                "Your daily digest is {state}, set for {} — no items yet. Add some!",
                config.time
            ));
        }
        Ok(format!(
            "Your daily digest is {state}, set for {}:\n{}",
            config.time,
            config
                .items
                .iter()
                .map(|i| format!("• {i}"))
                .collect::<Vec<_>>()
                .join("\n")
        ))
    }

    pub fn add_item(&self, user_id: &str, item: &str) -> Result<String> {
        let item = normalize_item(item);
        if item.is_empty() {
            return Err(SchedulerError::InvalidInput(
                "What should I add to the digest?".to_string(),
            ));
        }
        let (enabled, mut config) = self.load(user_id)?;
        if config.items.contains(&item) {
            return Ok(format!("\"{item}\" is already in your digest."));
        }
        config.items.push(item.clone());
        self.automations
            .upsert(user_id, DAILY_DIGEST, enabled, &config)?;
        info!(user_id = %user_id, item = %item, "digest item added");
        Ok(format!("Added \"{item}\" to your daily digest."))
    }

    pub fn remove_item(&self, user_id: &str, item: &str) -> Result<String> {
        let item = normalize_item(item);
        let (enabled, mut config) = self.load(user_id)?;
        let before = config.items.len();
        config.items.retain(|i| *i != item);
        if config.items.len() == before {
            return Ok(format!("\"{item}\" isn't in your digest."));
        }
        self.automations
            .upsert(user_id, DAILY_DIGEST, enabled, &config)?;
        Ok(format!("Removed \"{item}\" from your daily digest."))
    }

    /// Set the delivery time. Setting a time implicitly enables the digest.
    pub fn set_time(&self, user_id: &str, spec: &str) -> Result<String> {
        let time = parse_time_spec(spec)?;
        let (_, mut config) = self.load(user_id)?;
        config.time = time.clone();
        self.automations
            .upsert(user_id, DAILY_DIGEST, true, &config)?;
        info!(user_id = %user_id, time = %time, "digest time set");
        Ok(format!("Daily digest set for {time}."))
    }

    pub fn set_enabled(&self, user_id: &str, enabled: bool) -> Result<String> {
        let (_, config) = self.load(user_id)?;
        self.automations
            .upsert(user_id, DAILY_DIGEST, enabled, &config)?;
        Ok(if enabled {
            format!("Daily digest on — next delivery at {}.", config.time)
        } else {
            "Daily digest off.".to_string()
        })
    }

    fn load(&self, user_id: &str) -> Result<(bool, DigestConfig)> {
        Ok(match self.automations.get(user_id, DAILY_DIGEST)? {
            Some(row) => (row.enabled, row.config),
            None => (false, DigestConfig::default()),
        })
    }
}

/// Lowercase, trim, and strip a leading "my " so "My Calendar" and
/// "calendar" collapse to one item.
fn normalize_item(raw: &str) -> String {
    let item = raw.trim().to_lowercase();
    item.strip_prefix("my ").unwrap_or(&item).to_string()
}

/// Parse a user-typed time spec into 24 h "HH:MM".
///
/// Accepts "9", "9am", "9:30pm", "09:00", "21:15". Without an am/pm suffix
/// the hour is read as 24 h.
pub fn parse_time_spec(spec: &str) -> Result<String> {
    let raw = spec.trim().to_lowercase();
    let bad = || {
        SchedulerError::InvalidInput(format!(
            "I didn't understand \"{spec}\" as a time — try e.g. \"9am\" or \"21:30\"."
        ))
    };

    let (body, meridiem) = if let Some(rest) = raw.strip_suffix("am") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = raw.strip_suffix("pm") {
        (rest.trim(), Some(true))
    } else {
        (raw.as_str(), None)
    };

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hour: u32 = hour_str.parse().map_err(|_| bad())?;
    let minute: u32 = minute_str.parse().map_err(|_| bad())?;
    if minute > 59 {
        return Err(bad());
    }

    let hour = match meridiem {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return Err(bad());
            }
            match (pm, hour) {
                (false, 12) => 0,
                (false, h) => h,
                (true, 12) => 12,
                (true, h) => h + 12,
            }
        }
        None => {
            if hour > 23 {
                return Err(bad());
            }
            hour
        }
    };

    Ok(format!("{hour:02}:{minute:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DigestService {
        DigestService::new(AutomationStore::new(Connection::open_in_memory().unwrap()).unwrap())
    }

    #[test]
    fn time_specs_normalise_to_24h() {
        assert_eq!(parse_time_spec("9").unwrap(), "09:00");
        assert_eq!(parse_time_spec("9am").unwrap(), "09:00");
        assert_eq!(parse_time_spec("9:30pm").unwrap(), "21:30");
        assert_eq!(parse_time_spec("09:00").unwrap(), "09:00");
        assert_eq!(parse_time_spec("21:15").unwrap(), "21:15");
        assert_eq!(parse_time_spec("12am").unwrap(), "00:00");
        assert_eq!(parse_time_spec("12pm").unwrap(), "12:00");
        assert_eq!(parse_time_spec(" 7 PM ").unwrap(), "19:00");
    }

    #[test]
    fn bad_time_specs_are_rejected() {
        for spec in ["24:00", "13pm", "0am", "9:75", "noonish", ""] {
            assert!(
                matches!(parse_time_spec(spec), Err(SchedulerError::InvalidInput(_))),
                "expected {spec:?} to be rejected"
            );
        }
    }

    #[test]
    fn set_time_implicitly_enables() {
        let svc = service();
        svc.set_time("u1", "9am").unwrap();
        let row = svc
            .automations
            .get("u1", DAILY_DIGEST)
            .unwrap()
            .unwrap();
        assert!(row.enabled);
        assert_eq!(row.config.time, "09:00");
    }

    #[test]
    fn items_are_normalised_and_deduplicated() {
        let svc = service();
        svc.add_item("u1", "My Calendar").unwrap();
        let msg = svc.add_item("u1", "  calendar ").unwrap();
        assert!(msg.contains("already"));

        let row = svc
            .automations
            .get("u1", DAILY_DIGEST)
            .unwrap()
            .unwrap();
        assert_eq!(row.config.items, vec!["calendar"]);
    }

    #[test]
    fn remove_item_reports_absence() {
        let svc = service();
        svc.add_item("u1", "weather").unwrap();
        assert!(svc.remove_item("u1", "weather").unwrap().contains("Removed"));
        assert!(svc.remove_item("u1", "weather").unwrap().contains("isn't"));
    }

    #[test]
    fn toggling_preserves_items_and_time() {
        let svc = service();
        svc.set_time("u1", "8:30").unwrap();
        svc.add_item("u1", "tasks").unwrap();
        svc.set_enabled("u1", false).unwrap();
        svc.set_enabled("u1", true).unwrap();

        let row = svc
            .automations
            .get("u1", DAILY_DIGEST)
            .unwrap()
            .unwrap();
        assert!(row.enabled);
        assert_eq!(row.config.time, "08:30");
        assert_eq!(row.config.items, vec!["tasks"]);
    }

    #[test]
    fn overview_distinguishes_empty_config() {
        let svc = service();
        assert!(svc.overview("u1").unwrap().contains("no items yet"));
        svc.add_item("u1", "news").unwrap();
        assert!(svc.overview("u1").unwrap().contains("• news"));
    }
}
