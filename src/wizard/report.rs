//! Report wizard: screenshot, quick reports, the three-step draft, dispatch.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::channels::InboundEvent;
use crate::error::WizardError;
use crate::llm::{Artifact, DraftRequest, ReportDepth};
use crate::store::{Session, SessionPatch, keys};

use super::engine::Engine;
use super::prompts;
use super::state::{ReportStage, Stage};

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhttps?://").expect("valid scheme pattern"));

/// Drop `http://` / `https://` everywhere in `text`.
pub fn strip_schemes(text: &str) -> String {
    URL_SCHEME.replace_all(text, "").into_owned()
}

/// Fixed subject for a takedown request about `bare_link`.
pub fn draft_subject(bare_link: &str) -> String {
    format!("Urgent Takedown Request: {bare_link}")
}

impl Engine {
    /// Store the screenshot and offer the actions.
    pub(super) async fn on_attachment(
        &self,
        event: &InboundEvent,
        file_id: &str,
    ) -> Result<(), WizardError> {
        let current = self.sessions.get_session(&event.actor).await?.stage();
        let stage = Self::enter(current, Stage::Report(ReportStage::AwaitingAction))?;

        let prompt = self
            .presenter
            .send(
                event.chat_id,
                prompts::SCREENSHOT_SAVED,
                Some(&prompts::action_keyboard()),
            )
            .await?;

        let patch = SessionPatch::new()
            .set(keys::ATTACHMENT, file_id)
            .set(keys::LAST_PROMPT, prompt.message_id)
            .stage(stage)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;
        info!(actor = %event.actor, from = %current, "Screenshot stored");
        Ok(())
    }

    /// Short or long verdict on the stored screenshot.
    pub(super) async fn quick_report(
        &self,
        event: &InboundEvent,
        depth: ReportDepth,
    ) -> Result<(), WizardError> {
        let session = self.sessions.get_session(&event.actor).await?;
        let Some(file_id) = session.attachment() else {
            self.recover(event, event.message, Self::miss(event, keys::ATTACHMENT))
                .await;
            return Ok(());
        };

        let status = self
            .presenter
            .show(event.chat_id, event.message, &prompts::generating(depth), None)
            .await?;

        let outcome = async {
            let image = self.presenter.download(file_id).await?;
            Ok::<_, WizardError>(self.analyzer.report(image, depth).await?)
        }
        .await;

        match outcome {
            Ok(text) => {
                self.presenter
                    .replace(status, &prompts::report(&text), None)
                    .await?;
                let patch = SessionPatch::new()
                    .clear(keys::LAST_PROMPT)
                    .stage(Stage::Idle)?;
                self.sessions.upsert_session(&event.actor, &patch).await?;
                info!(actor = %event.actor, depth = depth.label(), "Report delivered");
            }
            Err(e) => self.recover(event, Some(status), e).await,
        }
        Ok(())
    }

    /// Enter step 1 of the draft. Fields from an earlier run are dropped.
    pub(super) async fn start_report(&self, event: &InboundEvent) -> Result<(), WizardError> {
        let current = self.sessions.get_session(&event.actor).await?.stage();
        let stage = Self::enter(current, Stage::Report(ReportStage::AwaitingTarget))?;

        let prompt = self
            .presenter
            .show(event.chat_id, event.message, prompts::STEP_LINK, None)
            .await?;

        let patch = SessionPatch::new()
            .clear_all(keys::REPORT_SCOPED)
            .set(keys::LAST_PROMPT, prompt.message_id)
            .stage(stage)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;
        info!(actor = %event.actor, stage = %stage, "Draft wizard started");
        Ok(())
    }

    /// One free-text step of the draft.
    pub(super) async fn report_text(
        &self,
        event: &InboundEvent,
        session: &Session,
        step: ReportStage,
        text: &str,
    ) -> Result<(), WizardError> {
        let current = Stage::Report(step);
        let next = Self::advance(current)?;
        let text = text.trim();

        let (key, follow_up) = match step {
            ReportStage::AwaitingTarget => (keys::TARGET_LINK, prompts::STEP_IDENTIFIER),
            ReportStage::AwaitingIdentifier => (keys::TARGET_IDENTIFIER, prompts::STEP_REASON),
            ReportStage::AwaitingReason => (keys::REASON, prompts::DRAFTING),
            ReportStage::AwaitingAction => {
                return Err(WizardError::OutOfSequence {
                    stage: current.to_string(),
                });
            }
        };

        self.presenter
            .cleanup(&Self::step_messages(event, session))
            .await;

        if step == ReportStage::AwaitingReason {
            return self.finish_draft(event, session, text, next).await;
        }

        let prompt = self.presenter.send(event.chat_id, follow_up, None).await?;
        let patch = SessionPatch::new()
            .set(key, text)
            .set(keys::LAST_PROMPT, prompt.message_id)
            .stage(next)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;
        info!(actor = %event.actor, stage = %next, "Draft step recorded");
        Ok(())
    }

    /// Terminal step: draft the artifact and offer dispatch.
    async fn finish_draft(
        &self,
        event: &InboundEvent,
        session: &Session,
        reason: &str,
        next: Stage,
    ) -> Result<(), WizardError> {
        let patch = SessionPatch::new()
            .set(keys::REASON, reason)
            .clear(keys::LAST_PROMPT)
            .stage(next)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;

        let status = self
            .presenter
            .send(event.chat_id, prompts::DRAFTING, None)
            .await?;

        match self.draft_artifact(event, session, reason).await {
            Ok(artifact) => {
                let patch = SessionPatch::new().set_json(keys::ARTIFACT, &artifact)?;
                self.sessions.upsert_session(&event.actor, &patch).await?;
                info!(actor = %event.actor, target = %artifact.target, "Draft stored");

                self.presenter
                    .replace(
                        status,
                        &prompts::draft(&artifact.target, &artifact.subject, &artifact.body),
                        Some(&prompts::dispatch_keyboard()),
                    )
                    .await?;
            }
            Err(e) => self.recover(event, Some(status), e).await,
        }
        Ok(())
    }

    async fn draft_artifact(
        &self,
        event: &InboundEvent,
        session: &Session,
        reason: &str,
    ) -> Result<Artifact, WizardError> {
        let file_id = session
            .attachment()
            .ok_or_else(|| Self::miss(event, keys::ATTACHMENT))?;
        let link = session
            .get_str(keys::TARGET_LINK)
            .ok_or_else(|| Self::miss(event, keys::TARGET_LINK))?;
        let identifier = session
            .get_str(keys::TARGET_IDENTIFIER)
            .ok_or_else(|| Self::miss(event, keys::TARGET_IDENTIFIER))?;

        let image = self.presenter.download(file_id).await?;

        let bare_link = strip_schemes(link);
        let subject = draft_subject(&bare_link);
        let signer = self.pick_signer();
        let request = DraftRequest {
            link: &bare_link,
            identifier,
            reason,
            subject: &subject,
            signer,
        };

        let mut artifact = self.analyzer.draft(image, &request).await?;
        artifact.subject = subject;
        artifact.body = strip_schemes(&artifact.body);
        Ok(artifact)
    }

    /// Fan the stored draft out through every identity.
    pub(super) async fn dispatch(&self, event: &InboundEvent) -> Result<(), WizardError> {
        let session = self.sessions.get_session(&event.actor).await?;
        let artifact = session
            .artifact()
            .ok_or_else(|| Self::miss(event, keys::ARTIFACT))?;
        let identities = self.identities.list_identities().await?;

        let status = self
            .presenter
            .send(event.chat_id, prompts::DISPATCH_STARTING, None)
            .await?;
        let report = self.dispatcher.run(&artifact, &identities, status).await?;
        info!(
            actor = %event.actor,
            sent = report.sent,
            total = report.total(),
            "Dispatch pass complete"
        );
        Ok(())
    }
}
