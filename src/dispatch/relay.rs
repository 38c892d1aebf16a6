//! Relay — one authenticated SMTP submission per identity.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::llm::Artifact;
use crate::store::Identity;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one message as one identity.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Connect, authenticate as `identity`, send `artifact` from its address,
    /// and close. Nothing is reused between calls.
    async fn send(&self, identity: &Identity, artifact: &Artifact) -> Result<(), RelayError>;
}

/// SMTP submission relay (STARTTLS on the submission port).
pub struct SmtpRelay {
    config: RelayConfig,
}

impl SmtpRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Relay for SmtpRelay {
    async fn send(&self, identity: &Identity, artifact: &Artifact) -> Result<(), RelayError> {
        let email = build_message(&identity.address, artifact)?;
        let creds = Credentials::new(
            identity.address.clone(),
            identity.secret.expose_secret().to_string(),
        );
        let host = self.config.host.clone();
        let port = self.config.port;

        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::starttls_relay(&host)
                .map_err(|e| RelayError::Connect {
                    host: host.clone(),
                    port,
                    reason: e.to_string(),
                })?
                .port(port)
                .credentials(creds)
                .timeout(Some(SMTP_TIMEOUT))
                .build();

            transport
                .send(&email)
                .map(|_| ())
                .map_err(|e| classify_smtp_error(&host, port, &e))
        })
        .await
        .map_err(|e| RelayError::Connect {
            host: self.config.host.clone(),
            port,
            reason: format!("relay task failed: {e}"),
        })?
    }
}

fn build_message(from: &str, artifact: &Artifact) -> Result<Message, RelayError> {
    let address_error = |address: &str, reason: String| RelayError::Address {
        address: address.to_string(),
        reason,
    };

    let from_box: Mailbox = from
        .parse()
        .map_err(|e: lettre::address::AddressError| address_error(from, e.to_string()))?;
    let to_box: Mailbox = artifact
        .target
        .parse()
        .map_err(|e: lettre::address::AddressError| address_error(&artifact.target, e.to_string()))?;

    Message::builder()
        .from(from_box)
        .to(to_box)
        .subject(artifact.subject.as_str())
        .body(artifact.body.clone())
        .map_err(|e| RelayError::Rejected(format!("Failed to build email: {e}")))
}

/// Sort an SMTP failure into connect / auth / rejection.
fn classify_smtp_error(host: &str, port: u16, e: &lettre::transport::smtp::Error) -> RelayError {
    let reason = e.to_string();
    if e.is_permanent() || e.is_transient() {
        let lower = reason.to_ascii_lowercase();
        if lower.contains("535") || lower.contains("534") || lower.contains("authentication") {
            RelayError::Auth(reason)
        } else {
            RelayError::Rejected(reason)
        }
    } else {
        RelayError::Connect {
            host: host.to_string(),
            port,
            reason,
        }
    }
}
