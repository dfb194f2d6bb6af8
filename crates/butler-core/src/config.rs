use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Scheduler tick cadence. The digest gate is an exact HH:MM match, so the
/// tick must be finer than one minute for every target minute to be observed.
pub const TICK_INTERVAL_SECS: u64 = 30;
/// How long a proposed action stays confirmable.
pub const PENDING_ACTION_TTL_MINS: i64 = 15;
/// How long an OAuth connect flow stays completable.
pub const OAUTH_STATE_TTL_MINS: i64 = 10;
/// Hard cap on files per edit-code proposal.
pub const EDIT_CODE_MAX_FILES: usize = 4;
/// Wall-clock budget for a single external HTTP call.
pub const EXTERNAL_CALL_TIMEOUT_SECS: u64 = 30;

/// Top-level config (butler.toml + BUTLER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButlerConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub github: GithubConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// GitHub OAuth app plus API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    /// 32-byte hex key used to seal access tokens at rest.
    pub token_seal_key: String,
}

/// Code-editing collaborator — an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EditorConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_editor_base_url")]
    pub base_url: String,
    #[serde(default = "default_editor_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Fallback IANA zone for users who never set one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            default_timezone: default_timezone(),
        }
    }
}

fn default_port() -> u16 {
    8787
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.butler/butler.db", home)
}
fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_editor_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_editor_model() -> String {
    "gpt-4.1".to_string()
}
fn default_tick_secs() -> u64 {
    TICK_INTERVAL_SECS
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl ButlerConfig {
    /// Load config from a TOML file with BUTLER_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ButlerConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BUTLER_").split("_"))
            .extract()
            .map_err(|e| crate::error::ButlerError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.butler/butler.toml", home)
}
