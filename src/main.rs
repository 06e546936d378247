use std::sync::Arc;

use pfc_assist::bot::Bot;
use pfc_assist::channels::{ChannelManager, CliChannel, TelegramChannel};
use pfc_assist::config::BotConfig;
use pfc_assist::dispatcher::Dispatcher;
use pfc_assist::lookup::{DisabledLookup, NutrientLookup, UsdaClient};
use pfc_assist::nutrition::{Clock, LocalClock};
use pfc_assist::routes::status_routes;
use pfc_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🥗 PFC Assist v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await.map_err(
        |e| anyhow::anyhow!("Failed to open database at {}: {e}", config.db_path.display()),
    )?);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Nutrient lookup ──────────────────────────────────────────────────
    let lookup: Arc<dyn NutrientLookup> = match config.usda {
        Some(usda) => {
            eprintln!("   Lookup: USDA ({})", usda.base_url);
            Arc::new(UsdaClient::new(usda)?)
        }
        None => {
            eprintln!("   Lookup: disabled (set USDA_API_KEY to enable)");
            Arc::new(DisabledLookup)
        }
    };

    let clock: Arc<dyn Clock> = match config.utc_offset {
        Some(offset) => {
            eprintln!("   Day boundary: UTC{offset}");
            Arc::new(LocalClock::with_offset(offset))
        }
        None => Arc::new(LocalClock::new()),
    };

    let dispatcher = Arc::new(Dispatcher::new(db, lookup, clock));

    // ── Status server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    let app = status_routes(Arc::clone(&dispatcher));
    let port = config.http_port;
    tokio::spawn(async move {
        tracing::info!(port, "Status server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Status server stopped: {e}");
        }
    });
    eprintln!("   Status: http://0.0.0.0:{port}/");

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(CliChannel::new()));

    if let Some(telegram) = config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    }

    for (name, health) in channels.health_check_all().await {
        if let Err(e) = health {
            tracing::warn!(channel = %name, "Health check failed: {e}");
        }
    }

    eprintln!("   Channels: {}", channels.names().join(", "));
    eprintln!("   Type a message and press Enter. Ctrl+C to exit.\n");

    Bot::new(dispatcher, channels).run().await?;

    Ok(())
}
