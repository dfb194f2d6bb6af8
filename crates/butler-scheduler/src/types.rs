use serde::{Deserialize, Serialize};

/// Reminder flavour; only affects delivery wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Plain,
    Focus,
}

impl ReminderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderKind::Plain => "plain",
            ReminderKind::Focus => "focus",
        }
    }
}

impl std::str::FromStr for ReminderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "plain" => Ok(ReminderKind::Plain),
            "focus" => Ok(ReminderKind::Focus),
            other => Err(format!("unknown reminder kind '{other}'")),
        }
    }
}

/// A one-off scheduled delivery. `remind_at` is a UTC instant; a reminder is
/// due when it has arrived and `is_done` is still false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: String,
    pub message: String,
    pub remind_at: String,
    pub is_done: bool,
    pub kind: ReminderKind,
    pub created_at: String,
}

/// The JSON document stored in `user_automations.config` for a daily digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Local delivery time, 24 h "HH:MM" in the user's timezone.
    pub time: String,
    /// User-curated content items, normalised and deduplicated.
    #[serde(default)]
    pub items: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            time: "09:00".to_string(),
            items: Vec::new(),
        }
    }
}

/// One recurring automation row; at most one per (user, kind).
#[derive(Debug, Clone)]
pub struct Automation {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub enabled: bool,
    pub config: DigestConfig,
    pub last_sent_at: Option<String>,
}

/// The single automation kind currently supported.
pub const DAILY_DIGEST: &str = "daily_digest";
