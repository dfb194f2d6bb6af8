use serde::{Deserialize, Serialize};

/// A user profile row. The sealed token blob is deliberately not part of
/// this struct; it is fetched (and unsealed) only at the call site that
/// needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Chat-channel user id (e.g. the Telegram numeric id as a string).
    pub user_id: String,
    pub display_name: String,
    /// IANA zone string, e.g. "Europe/Berlin". Defaults to the configured
    /// fallback zone when the user never set one.
    pub timezone: String,
    /// Saved default repository as an `owner/name` slug, if any.
    pub default_repo: Option<String>,
    /// True when a GitHub token is stored for this user.
    pub github_connected: bool,
    pub created_at: String,
    pub updated_at: String,
}
