//! Helpdesk Server
//!
//! Runs the notification dispatcher, the Telegram bot poller and storage
//! housekeeping over a shared `SQLite` database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use helpdesk_core::config::{self, DEV_JWT_SECRET};
use helpdesk_core::db::{PoolOptions, unix_timestamp};
use helpdesk_core::tracing_init;
use helpdesk_server::auth::SessionManager;
use helpdesk_server::bot::TelegramBot;
use helpdesk_server::notifications::{LogSender, MessageSender, NotificationRelay, TelegramClient};
use helpdesk_server::service::Helpdesk;
use helpdesk_server::storage::HelpdeskDatabase;

/// How often expired link tokens are deleted.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Grace period for background tasks after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "helpdesk-server")]
#[command(
    version,
    about = "Helpdesk server - ticket lifecycle, chat linking and notifications"
)]
struct Args {
    /// Path to a TOML config file (defaults to the global config if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Session signing secret.
    #[arg(long, env = "HELPDESK_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Telegram bot token. Enables chat delivery and the bot poller.
    #[arg(long, env = "HELPDESK_TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_bot_token: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    if let Some(token) = args.telegram_bot_token.filter(|t| !t.is_empty()) {
        config.notifications.telegram_bot_token = Some(token);
    }
    config.validate()?;

    let filter = tracing_init::default_filter(
        &["helpdesk_server", "helpdesk_core"],
        &config.server.log_level,
    );
    tracing_init::init_tracing(&filter, args.log_json)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting helpdesk-server");

    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("Using the built-in development JWT secret; set HELPDESK_JWT_SECRET in production");
    }

    let db_path = config
        .server
        .database_path
        .clone()
        .or_else(config::default_database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening helpdesk database");
    let db = HelpdeskDatabase::open(
        &db_path,
        PoolOptions {
            max_connections: config.server.max_connections,
            ..PoolOptions::default()
        },
    )
    .await?;
    info!(users = db.count_users().await?, "Helpdesk database ready");

    let cancel = CancellationToken::new();

    let telegram = match config.notifications.telegram_bot_token.as_deref() {
        Some(token) => Some(TelegramClient::new(
            &config.notifications.telegram_api_url,
            token,
        )?),
        None => {
            warn!("No Telegram bot token configured; notifications are only logged");
            None
        }
    };
    let sender: Arc<dyn MessageSender> = match &telegram {
        Some(client) => Arc::new(client.clone()),
        None => Arc::new(LogSender),
    };

    let (relay, dispatcher) = NotificationRelay::spawn(
        db.clone(),
        sender,
        config.notifications.queue_capacity,
        cancel.clone(),
    );

    let sessions = Arc::new(SessionManager::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.session_ttl_secs,
    ));
    let helpdesk = Helpdesk::new(
        db.clone(),
        relay,
        sessions,
        config.linking.token_ttl_secs,
    );

    let bot = telegram.map(|client| {
        let bot = TelegramBot::new(
            client,
            helpdesk.clone(),
            config.notifications.poll_timeout_secs,
        );
        tokio::spawn(bot.run(cancel.clone()))
    });

    // Spawn background task to purge expired link tokens (hourly)
    let purge_db = db.clone();
    let purge_cancel = cancel.clone();
    let purge = tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = purge_cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match purge_db.purge_expired_link_tokens(unix_timestamp()).await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "Expired link tokens purged");
                }
                Err(e) => {
                    warn!(error = %e, "Link token purge failed");
                }
                _ => {}
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    cancel.cancel();

    let mut tasks = vec![dispatcher, purge];
    tasks.extend(bot);
    for task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("Background task did not stop in time");
        }
    }

    info!("Helpdesk server stopped");
    Ok(())
}
