//! Dispatch Coordinator — sequential fan-out over every configured identity.

use std::sync::Arc;

use tracing::{info, warn};

use crate::channels::MessageRef;
use crate::error::ChannelError;
use crate::llm::Artifact;
use crate::presentation::Presenter;
use crate::store::Identity;

use super::mask::mask;
use super::relay::Relay;

pub const NO_IDENTITIES: &str = "⚠️ No identities configured. Ask the admin to add some first.";

/// Result of sending through one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Failed(String),
}

/// One line of the status log. `identity` is already masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub identity: String,
    pub outcome: Outcome,
}

impl StatusEntry {
    fn render(&self) -> String {
        match &self.outcome {
            Outcome::Sent => format!("✅ {}", self.identity),
            Outcome::Failed(reason) => format!("❌ {}: {reason}", self.identity),
        }
    }
}

/// Everything a dispatch pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub entries: Vec<StatusEntry>,
    pub sent: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    fn log(&self) -> String {
        self.entries
            .iter()
            .map(StatusEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn progress_text(&self, of: usize) -> String {
        format!("🚀 Sending… {}/{of}\n\n{}", self.total(), self.log())
    }

    /// Final report: full log plus a trailing success count.
    pub fn summary(&self) -> String {
        format!(
            "📬 Dispatch finished\n\n{}\n\nSent: {}/{}",
            self.log(),
            self.sent,
            self.total()
        )
    }
}

/// Runs dispatch passes.
pub struct Dispatcher {
    relay: Arc<dyn Relay>,
    presenter: Presenter,
    progress_every: usize,
}

impl Dispatcher {
    pub fn new(relay: Arc<dyn Relay>, presenter: Presenter, progress_every: usize) -> Self {
        Self {
            relay,
            presenter,
            progress_every: progress_every.max(1),
        }
    }

    /// Send `artifact` once through every identity, in order.
    ///
    /// A failing identity is recorded and skipped; the pass never stops early.
    /// Progress replaces `status` every `progress_every` identities and the
    /// summary replaces it at the end. An empty list opens no connections.
    pub async fn run(
        &self,
        artifact: &Artifact,
        identities: &[Identity],
        status: MessageRef,
    ) -> Result<DispatchReport, ChannelError> {
        let mut report = DispatchReport::default();

        if identities.is_empty() {
            info!("Dispatch requested with no identities");
            self.presenter.replace(status, NO_IDENTITIES, None).await?;
            return Ok(report);
        }

        let total = identities.len();
        let mut status = status;
        info!(total, target = %artifact.target, "Dispatch started");

        for (index, identity) in identities.iter().enumerate() {
            let masked = mask(&identity.address);
            let outcome = match self.relay.send(identity, artifact).await {
                Ok(()) => {
                    report.sent += 1;
                    info!(identity = %masked, "Dispatch sent");
                    Outcome::Sent
                }
                Err(e) => {
                    warn!(identity = %masked, error = %e, "Dispatch failed for identity");
                    Outcome::Failed(e.to_string())
                }
            };
            report.entries.push(StatusEntry {
                identity: masked,
                outcome,
            });

            let done = index + 1;
            if done % self.progress_every == 0 && done < total {
                match self
                    .presenter
                    .replace(status, &report.progress_text(total), None)
                    .await
                {
                    Ok(shown) => status = shown,
                    Err(e) => warn!(error = %e, "Progress update failed"),
                }
            }
        }

        info!(sent = report.sent, total, "Dispatch finished");
        self.presenter.replace(status, &report.summary(), None).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::channels::{ChatTransport, Keyboard};
    use crate::error::RelayError;

    /// Relay that fails for addresses in `failing`.
    struct ScriptedRelay {
        failing: Vec<String>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Relay for ScriptedRelay {
        async fn send(&self, identity: &Identity, _artifact: &Artifact) -> Result<(), RelayError> {
            self.attempts.lock().unwrap().push(identity.address.clone());
            if self.failing.contains(&identity.address) {
                Err(RelayError::Auth("535 bad credentials".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        edits: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_message(
            &self,
            chat_id: i64,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<MessageRef, ChannelError> {
            Ok(MessageRef::new(chat_id, 999))
        }

        async fn edit_message(
            &self,
            _message: MessageRef,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ChannelError> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn delete_message(&self, _message: MessageRef) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>, ChannelError> {
            Ok(Vec::new())
        }
    }

    fn artifact() -> Artifact {
        Artifact {
            target: "abuse@telegram.org".into(),
            subject: "Urgent Takedown Request: t.me/group".into(),
            body: "Body".into(),
        }
    }

    fn identities(n: usize) -> Vec<Identity> {
        (0..n)
            .map(|i| Identity::new(format!("sender{i}@example.com"), "secret"))
            .collect()
    }

    fn setup(failing: &[&str]) -> (Dispatcher, Arc<ScriptedRelay>, Arc<RecordingTransport>) {
        let relay = Arc::new(ScriptedRelay {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        });
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(relay.clone(), Presenter::new(transport.clone()), 2);
        (dispatcher, relay, transport)
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let (dispatcher, relay, _) = setup(&["sender1@example.com", "sender3@example.com"]);
        let report = dispatcher
            .run(&artifact(), &identities(5), MessageRef::new(1, 50))
            .await
            .unwrap();

        assert_eq!(report.total(), 5);
        assert_eq!(report.sent, 3);
        assert_eq!(relay.attempts.lock().unwrap().len(), 5);
        assert!(matches!(report.entries[1].outcome, Outcome::Failed(_)));
        assert_eq!(report.entries[1].identity, "sen***@example.com");
        assert!(report.summary().ends_with("Sent: 3/5"));
    }

    #[tokio::test]
    async fn progress_every_second_identity_then_summary() {
        let (dispatcher, _, transport) = setup(&[]);
        dispatcher
            .run(&artifact(), &identities(5), MessageRef::new(1, 50))
            .await
            .unwrap();

        let edits = transport.edits.lock().unwrap();
        // After identities 2 and 4, then the final summary.
        assert_eq!(edits.len(), 3);
        assert!(edits[0].starts_with("🚀 Sending… 2/5"));
        assert!(edits[1].starts_with("🚀 Sending… 4/5"));
        assert!(edits[2].contains("Sent: 5/5"));
    }

    #[tokio::test]
    async fn empty_list_opens_no_connections() {
        let (dispatcher, relay, transport) = setup(&[]);
        let report = dispatcher
            .run(&artifact(), &[], MessageRef::new(1, 50))
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
        assert!(relay.attempts.lock().unwrap().is_empty());
        assert_eq!(*transport.edits.lock().unwrap(), vec![NO_IDENTITIES.to_string()]);
    }

    #[tokio::test]
    async fn secrets_never_rendered() {
        let (dispatcher, _, transport) = setup(&["sender0@example.com"]);
        dispatcher
            .run(&artifact(), &identities(1), MessageRef::new(1, 50))
            .await
            .unwrap();
        let edits = transport.edits.lock().unwrap();
        assert!(!edits.iter().any(|e| e.contains("secret")));
        assert!(!edits.iter().any(|e| e.contains("sender0@")));
    }
}
