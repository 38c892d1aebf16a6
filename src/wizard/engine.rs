//! Wizard engine — one stateless pass per inbound event.
//!
//! Every call rebuilds context from the session store, routes the event to a
//! stage handler, and writes the resulting session patch back. The engine
//! owns no per-actor state between calls.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::channels::{ChatTransport, EventKind, InboundEvent, MessageRef};
use crate::dispatch::{Dispatcher, Relay};
use crate::error::WizardError;
use crate::llm::{ContentAnalyzer, GenerativeModel, ReportDepth};
use crate::presentation::Presenter;
use crate::store::{IdentityStore, Session, SessionPatch, SessionStore, keys};

use super::prompts::{self, SIGNERS, tags};
use super::state::Stage;

/// Commands only the privileged actor may run.
const PRIVILEGED_COMMANDS: &[&str] = &["admin", "identities", "remove"];

/// External capabilities the engine is built from.
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub transport: Arc<dyn ChatTransport>,
    pub model: Arc<dyn GenerativeModel>,
    pub relay: Arc<dyn Relay>,
}

/// Routes inbound events through the report and provisioning wizards.
pub struct Engine {
    pub(super) sessions: Arc<dyn SessionStore>,
    pub(super) identities: Arc<dyn IdentityStore>,
    pub(super) presenter: Presenter,
    pub(super) analyzer: ContentAnalyzer,
    pub(super) dispatcher: Dispatcher,
    admin_id: String,
    rng: Mutex<StdRng>,
}

impl Engine {
    pub fn new(collaborators: Collaborators, admin_id: impl Into<String>, progress_every: usize) -> Self {
        let presenter = Presenter::new(collaborators.transport);
        Self {
            sessions: collaborators.sessions,
            identities: collaborators.identities,
            analyzer: ContentAnalyzer::new(collaborators.model),
            dispatcher: Dispatcher::new(collaborators.relay, presenter.clone(), progress_every),
            presenter,
            admin_id: admin_id.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the signer-name randomness (seeded in tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn is_admin(&self, actor: &str) -> bool {
        actor == self.admin_id
    }

    /// Handle one event. Every failure ends in a reply to the actor except
    /// denied privileged entry points, which are silent.
    pub async fn handle(&self, event: &InboundEvent) {
        info!(actor = %event.actor, kind = kind_label(&event.kind), "Handling event");

        let result = match &event.kind {
            EventKind::Attachment { file_id } => self.on_attachment(event, file_id).await,
            EventKind::Text(text) => self.on_text(event, text).await,
            EventKind::Button { tag, callback_id } => self.on_button(event, tag, callback_id).await,
            EventKind::Command { name, args } => self.on_command(event, name, args).await,
        };

        if let Err(e) = result {
            self.recover(event, None, e).await;
        }
    }

    async fn on_text(&self, event: &InboundEvent, text: &str) -> Result<(), WizardError> {
        let session = self.sessions.get_session(&event.actor).await?;
        let stage = session.stage();

        match stage {
            Stage::Report(step) if stage.expects_text() => {
                self.report_text(event, &session, step, text).await
            }
            Stage::Provisioning(step) => {
                if !self.is_admin(&event.actor) {
                    debug!(actor = %event.actor, "Provisioning input from unprivileged actor ignored");
                    return Ok(());
                }
                self.provisioning_text(event, &session, step, text).await
            }
            _ => Err(WizardError::OutOfSequence {
                stage: stage.to_string(),
            }),
        }
    }

    async fn on_button(
        &self,
        event: &InboundEvent,
        tag: &str,
        callback_id: &str,
    ) -> Result<(), WizardError> {
        if tag == tags::ADD_IDENTITY && !self.is_admin(&event.actor) {
            debug!(actor = %event.actor, "Privileged button from unprivileged actor ignored");
            return Ok(());
        }
        self.presenter.acknowledge(callback_id).await;

        match tag {
            tags::SHORT => self.quick_report(event, ReportDepth::Short).await,
            tags::LONG => self.quick_report(event, ReportDepth::Long).await,
            tags::START_DRAFT => self.start_report(event).await,
            tags::DISPATCH => self.dispatch(event).await,
            tags::ADD_IDENTITY => self.start_provisioning(event).await,
            other => {
                debug!(tag = other, "Unknown button tag");
                Ok(())
            }
        }
    }

    async fn on_command(&self, event: &InboundEvent, name: &str, args: &str) -> Result<(), WizardError> {
        if PRIVILEGED_COMMANDS.contains(&name) {
            if !self.is_admin(&event.actor) {
                debug!(actor = %event.actor, command = name, "Privileged command from unprivileged actor ignored");
                return Ok(());
            }
            return self.admin_command(event, name, args).await;
        }

        match name {
            "start" => {
                self.presenter.send(event.chat_id, prompts::WELCOME, None).await?;
                Ok(())
            }
            "cancel" => self.cancel(event).await,
            _ => {
                self.presenter
                    .send(event.chat_id, prompts::UNKNOWN_COMMAND, None)
                    .await?;
                Ok(())
            }
        }
    }

    /// Leave any wizard and drop its fields. The screenshot is kept.
    async fn cancel(&self, event: &InboundEvent) -> Result<(), WizardError> {
        let session = self.sessions.get_session(&event.actor).await?;
        if let Some(prompt) = session.last_prompt() {
            self.presenter
                .cleanup(&[MessageRef::new(event.chat_id, prompt)])
                .await;
        }

        let patch = SessionPatch::new()
            .clear_all(keys::REPORT_SCOPED)
            .clear_all(keys::PROVISIONING_SCOPED)
            .clear(keys::LAST_PROMPT)
            .stage(Stage::Idle)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;
        info!(actor = %event.actor, from = %session.stage(), "Wizard cancelled");

        self.presenter.send(event.chat_id, prompts::CANCELLED, None).await?;
        Ok(())
    }

    /// Turn a failure into a reply, shown in place of `status` if given.
    pub(super) async fn recover(
        &self,
        event: &InboundEvent,
        status: Option<MessageRef>,
        error: WizardError,
    ) {
        let reply = match &error {
            WizardError::SessionMiss { field, .. } => {
                info!(actor = %event.actor, field = %field, "Session field missing");
                match field.as_str() {
                    keys::ARTIFACT => prompts::DRAFT_MISSING,
                    keys::PENDING_IDENTITY => prompts::IDENTITY_MISSING,
                    _ => prompts::SESSION_EXPIRED,
                }
            }
            WizardError::OutOfSequence { stage } => {
                info!(actor = %event.actor, stage = %stage, "Input out of sequence");
                prompts::NO_ACTIVE_STEP
            }
            WizardError::Analysis(e) => {
                warn!(actor = %event.actor, kind = e.kind(), error = %e, "Analysis failed");
                prompts::GENERIC_FAILURE
            }
            WizardError::Store(e) => {
                error!(actor = %event.actor, error = %e, "Session store failed");
                prompts::GENERIC_FAILURE
            }
            WizardError::Transport(e) => {
                error!(actor = %event.actor, error = %e, "Transport failed");
                prompts::GENERIC_FAILURE
            }
        };

        if matches!(error, WizardError::SessionMiss { .. } | WizardError::Analysis(_)) {
            let reset = SessionPatch::new().stage(Stage::Idle);
            match reset {
                Ok(patch) => {
                    if let Err(e) = self.sessions.upsert_session(&event.actor, &patch).await {
                        error!(actor = %event.actor, error = %e, "Failed to reset stage");
                    }
                }
                Err(e) => error!(error = %e, "Failed to build stage reset"),
            }
        }

        if let Err(e) = self.presenter.show(event.chat_id, status, reply, None).await {
            error!(actor = %event.actor, error = %e, "Failed to deliver error reply");
        }
    }

    /// Check an entry-point transition.
    pub(super) fn enter(current: Stage, target: Stage) -> Result<Stage, WizardError> {
        if current.can_transition_to(target) {
            Ok(target)
        } else {
            Err(WizardError::OutOfSequence {
                stage: current.to_string(),
            })
        }
    }

    /// The stage after a text step at `current`.
    pub(super) fn advance(current: Stage) -> Result<Stage, WizardError> {
        current
            .next()
            .filter(|next| current.can_transition_to(*next))
            .ok_or_else(|| WizardError::OutOfSequence {
                stage: current.to_string(),
            })
    }

    /// The consumed input message and the previous prompt.
    pub(super) fn step_messages(event: &InboundEvent, session: &Session) -> Vec<MessageRef> {
        event
            .message
            .into_iter()
            .chain(
                session
                    .last_prompt()
                    .map(|id| MessageRef::new(event.chat_id, id)),
            )
            .collect()
    }

    pub(super) fn miss(event: &InboundEvent, field: &str) -> WizardError {
        WizardError::SessionMiss {
            actor: event.actor.clone(),
            field: field.to_string(),
        }
    }

    pub(super) fn pick_signer(&self) -> &'static str {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        SIGNERS[rng.gen_range(0..SIGNERS.len())]
    }
}

fn kind_label(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Attachment { .. } => "attachment",
        EventKind::Text(_) => "text",
        EventKind::Button { .. } => "button",
        EventKind::Command { .. } => "command",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::state::{ProvisioningStage, ReportStage};

    #[test]
    fn advance_walks_one_step() {
        assert_eq!(
            Engine::advance(Stage::Report(ReportStage::AwaitingTarget)).unwrap(),
            Stage::Report(ReportStage::AwaitingIdentifier)
        );
        assert_eq!(
            Engine::advance(Stage::Provisioning(ProvisioningStage::AwaitingSecret)).unwrap(),
            Stage::Idle
        );
    }

    #[test]
    fn advance_from_idle_is_out_of_sequence() {
        let err = Engine::advance(Stage::Idle).unwrap_err();
        assert!(matches!(err, WizardError::OutOfSequence { ref stage } if stage == "idle"));
        assert!(Engine::advance(Stage::Report(ReportStage::AwaitingAction)).is_err());
    }

    #[test]
    fn entry_points_allowed_mid_flow() {
        let mid = Stage::Report(ReportStage::AwaitingReason);
        assert!(Engine::enter(mid, Stage::Report(ReportStage::AwaitingTarget)).is_ok());
        assert!(Engine::enter(mid, Stage::Provisioning(ProvisioningStage::AwaitingIdentifier)).is_ok());
        assert!(Engine::enter(mid, Stage::Provisioning(ProvisioningStage::AwaitingSecret)).is_err());
    }

    #[test]
    fn step_messages_collects_input_and_prompt() {
        let event = InboundEvent {
            update_id: 1,
            actor: "7".into(),
            chat_id: 70,
            message: Some(MessageRef::new(70, 5)),
            kind: EventKind::Text("x".into()),
        };
        let mut session = Session::default();
        assert_eq!(Engine::step_messages(&event, &session), vec![MessageRef::new(70, 5)]);

        session.apply(&SessionPatch::new().set(keys::LAST_PROMPT, 4));
        assert_eq!(
            Engine::step_messages(&event, &session),
            vec![MessageRef::new(70, 5), MessageRef::new(70, 4)]
        );
    }

    #[test]
    fn kind_labels() {
        assert_eq!(kind_label(&EventKind::Text("a".into())), "text");
        assert_eq!(
            kind_label(&EventKind::Command {
                name: "start".into(),
                args: String::new()
            }),
            "command"
        );
    }
}
