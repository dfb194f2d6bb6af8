use std::net::SocketAddr;
use std::sync::Arc;

use butler_actions::{ActionError, ActionWorkflow, CodeEditor, FileEdit, PendingActionStore};
use butler_channels::{ChannelError, Controls, Messenger, TelegramMessenger};
use butler_core::config::ButlerConfig;
use butler_github::{GithubClient, GithubOauth};
use butler_scheduler::{AutomationStore, DigestService, ReminderStore, SchedulerEngine};
use butler_users::{TokenSeal, UserStore};
use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "butler_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path via BUTLER_CONFIG > ~/.butler/butler.toml
    let config_path = std::env::var("BUTLER_CONFIG").ok();
    let config = ButlerConfig::load(config_path.as_deref())?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // single SQLite file for all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // run all schema migrations (idempotent)
    butler_users::db::init_db(&db)?;
    butler_actions::db::init_db(&db)?;
    butler_scheduler::db::init_db(&db)?;
    info!("database migrations complete");

    // build subsystems — each gets its own connection for thread safety
    let users = UserStore::new(
        rusqlite::Connection::open(&db_path)?,
        config.scheduler.default_timezone.clone(),
    )?;
    let pending = PendingActionStore::new(rusqlite::Connection::open(&db_path)?)?;
    let reminders = ReminderStore::new(rusqlite::Connection::open(&db_path)?)?;
    let automations = AutomationStore::new(rusqlite::Connection::open(&db_path)?)?;

    let seal = Arc::new(TokenSeal::from_hex_key(&config.github.token_seal_key)?);
    let host = Arc::new(GithubClient::new(config.github.api_base.clone()));
    let oauth = Arc::new(GithubOauth::new(
        config.github.client_id.clone(),
        config.github.client_secret.clone(),
    ));
    let editor: Arc<dyn CodeEditor> = if config.editor.api_key.is_some() {
        Arc::new(butler_actions::editor::LlmCodeEditor::new(&config.editor)?)
    } else {
        warn!("no editor API key configured — edit-code requests will be refused");
        Arc::new(NullEditor)
    };
    let messenger: Arc<dyn Messenger> = match config.channels.telegram {
        Some(ref telegram) => Arc::new(TelegramMessenger::new(&telegram.bot_token)),
        None => {
            warn!("no chat channel configured — scheduled deliveries cannot be sent");
            Arc::new(NullMessenger)
        }
    };

    let workflow = ActionWorkflow::new(
        pending.clone(),
        users.clone(),
        seal,
        host,
        Arc::clone(&editor),
        oauth,
    );
    let engine = SchedulerEngine::new(
        reminders.clone(),
        automations.clone(),
        users,
        pending,
        messenger,
        config.scheduler.tick_secs,
    );

    // spawn the delivery loop in the background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move { engine.run(shutdown_rx).await });

    let state = Arc::new(app::AppState::new(
        config,
        workflow,
        DigestService::new(automations),
        reminders,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("Butler gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal the scheduler to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Placeholder editor when no API key is configured.
struct NullEditor;

#[async_trait::async_trait]
impl CodeEditor for NullEditor {
    async fn edit(
        &self,
        _files: &[(String, String)],
        _instructions: &str,
    ) -> Result<Vec<FileEdit>, ActionError> {
        Err(ActionError::InvalidInput(
            "Code editing isn't set up on this server.".to_string(),
        ))
    }
}

/// Placeholder messenger when no chat channel is configured.
struct NullMessenger;

#[async_trait::async_trait]
impl Messenger for NullMessenger {
    async fn send(
        &self,
        _user_id: &str,
        _text: &str,
        _controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::ConfigError(
            "no chat channel configured".to_string(),
        ))
    }
}
