//! Inbound surface: the webhook router and the long-poll loop.
//!
//! Both feed each update, one at a time, to the same stateless handler. The
//! webhook always answers 200 so Telegram never redelivers an update the bot
//! already replied to.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::channels::{TelegramChannel, Update, classify, parse_update};
use crate::error::ChannelError;
use crate::wizard::Engine;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub const HEALTH_TEXT: &str = "Bot is Running";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Build the webhook router.
pub fn routes(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(health).post(receive))
        .route("/webhook", post(receive))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(AppState { engine })
}

async fn health() -> &'static str {
    HEALTH_TEXT
}

async fn receive(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match parse_update(&body) {
        Ok(update) => process_update(&state.engine, &update).await,
        Err(e) => warn!(error = %e, "Dropping undecodable update"),
    }
    StatusCode::OK
}

/// Classify and handle one update inside its own span.
pub async fn process_update(engine: &Engine, update: &Update) {
    let span = info_span!(
        "update",
        update_id = update.update_id,
        invocation = %Uuid::new_v4()
    );

    async {
        match classify(update) {
            Ok(event) => engine.handle(&event).await,
            Err(e) => warn!(error = %e, "Dropping unidentifiable update"),
        }
    }
    .instrument(span)
    .await
}

/// Serve the webhook until the process stops.
pub async fn serve(engine: Arc<Engine>, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Webhook server started");
    axum::serve(listener, routes(engine)).await
}

/// Long-poll `getUpdates` and handle updates in order.
pub async fn run_polling(channel: &TelegramChannel, engine: Arc<Engine>) -> Result<(), ChannelError> {
    channel.delete_webhook().await?;
    info!("Polling for updates");

    let mut offset = 0;
    loop {
        match channel.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    process_update(&engine, &update).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
