use std::sync::Arc;

use anyhow::Context;

use takedown_bot::channels::TelegramChannel;
use takedown_bot::config::{BotConfig, RunMode};
use takedown_bot::dispatch::SmtpRelay;
use takedown_bot::llm::create_provider;
use takedown_bot::store::LibSqlBackend;
use takedown_bot::webhook;
use takedown_bot::wizard::{Collaborators, Engine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    eprintln!("🤖 Takedown bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Relay: {}:{}", config.relay.host, config.relay.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&config.db_path))
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path))?,
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Collaborators ────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(config.telegram_token.clone()));
    if let Err(e) = telegram.health_check().await {
        tracing::warn!(error = %e, "Telegram health check failed");
    }
    let model = create_provider(config.gemini_api_key.clone(), &config.model)?;
    let relay = Arc::new(SmtpRelay::new(config.relay.clone()));

    let engine = Arc::new(Engine::new(
        Collaborators {
            sessions: store.clone(),
            identities: store,
            transport: telegram.clone(),
            model,
            relay,
        },
        config.admin_id.clone(),
        config.progress_every,
    ));

    match config.mode {
        RunMode::Webhook => {
            eprintln!("   Webhook: http://0.0.0.0:{}/\n", config.port);
            webhook::serve(engine, config.port).await?;
        }
        RunMode::Polling => {
            eprintln!("   Polling: getUpdates\n");
            webhook::run_polling(&telegram, engine).await?;
        }
    }

    Ok(())
}
