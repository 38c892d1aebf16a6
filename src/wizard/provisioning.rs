//! Provisioning wizard and admin commands. Callers have already checked that
//! the actor is privileged.

use secrecy::SecretString;
use tracing::info;

use crate::channels::InboundEvent;
use crate::dispatch::mask;
use crate::error::WizardError;
use crate::store::{Session, SessionPatch, keys};

use super::engine::Engine;
use super::prompts;
use super::state::{ProvisioningStage, Stage};

/// Cheap shape check before asking for a secret.
fn looks_like_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl Engine {
    pub(super) async fn start_provisioning(&self, event: &InboundEvent) -> Result<(), WizardError> {
        let current = self.sessions.get_session(&event.actor).await?.stage();
        let stage = Self::enter(current, Stage::Provisioning(ProvisioningStage::AwaitingIdentifier))?;

        let prompt = self
            .presenter
            .send(event.chat_id, prompts::ASK_IDENTITY_ADDRESS, None)
            .await?;

        let patch = SessionPatch::new()
            .clear_all(keys::PROVISIONING_SCOPED)
            .set(keys::LAST_PROMPT, prompt.message_id)
            .stage(stage)?;
        self.sessions.upsert_session(&event.actor, &patch).await?;
        info!(stage = %stage, "Provisioning started");
        Ok(())
    }

    pub(super) async fn provisioning_text(
        &self,
        event: &InboundEvent,
        session: &Session,
        step: ProvisioningStage,
        text: &str,
    ) -> Result<(), WizardError> {
        let next = Self::advance(Stage::Provisioning(step))?;

        match step {
            ProvisioningStage::AwaitingIdentifier => {
                let address = text.trim();
                if !looks_like_address(address) {
                    self.presenter
                        .send(event.chat_id, prompts::INVALID_IDENTITY_ADDRESS, None)
                        .await?;
                    return Ok(());
                }

                self.presenter
                    .cleanup(&Self::step_messages(event, session))
                    .await;
                let prompt = self
                    .presenter
                    .send(event.chat_id, prompts::ASK_IDENTITY_SECRET, None)
                    .await?;

                let patch = SessionPatch::new()
                    .set(keys::PENDING_IDENTITY, address)
                    .set(keys::LAST_PROMPT, prompt.message_id)
                    .stage(next)?;
                self.sessions.upsert_session(&event.actor, &patch).await?;
                info!(identity = %mask(address), "Identity address recorded");
                Ok(())
            }
            ProvisioningStage::AwaitingSecret => {
                // The input carries the secret; remove it before anything can fail.
                self.presenter
                    .cleanup(&Self::step_messages(event, session))
                    .await;

                let address = session
                    .get_str(keys::PENDING_IDENTITY)
                    .ok_or_else(|| Self::miss(event, keys::PENDING_IDENTITY))?;
                let secret: String = text.split_whitespace().collect();

                self.identities
                    .upsert_identity(address, &SecretString::from(secret))
                    .await?;
                let total = self.identities.count_identities().await?;

                let patch = SessionPatch::new()
                    .clear_all(keys::PROVISIONING_SCOPED)
                    .clear(keys::LAST_PROMPT)
                    .stage(next)?;
                self.sessions.upsert_session(&event.actor, &patch).await?;

                let masked = mask(address);
                info!(identity = %masked, total, "Identity stored");
                self.presenter
                    .send(event.chat_id, &prompts::identity_saved(&masked, total), None)
                    .await?;
                Ok(())
            }
        }
    }

    /// `/admin`, `/identities`, `/remove <address>`.
    pub(super) async fn admin_command(
        &self,
        event: &InboundEvent,
        name: &str,
        args: &str,
    ) -> Result<(), WizardError> {
        let reply = match name {
            "admin" => {
                let total = self.identities.count_identities().await?;
                self.presenter
                    .send(
                        event.chat_id,
                        &prompts::admin_panel(total),
                        Some(&prompts::admin_keyboard()),
                    )
                    .await?;
                return Ok(());
            }
            "identities" => {
                let masked: Vec<String> = self
                    .identities
                    .list_identities()
                    .await?
                    .iter()
                    .map(|identity| mask(&identity.address))
                    .collect();
                prompts::identity_list(&masked)
            }
            "remove" => {
                let address = args.trim();
                if address.is_empty() {
                    prompts::REMOVE_USAGE.to_string()
                } else {
                    let existed = self.identities.remove_identity(address).await?;
                    info!(identity = %mask(address), existed, "Identity removal requested");
                    prompts::identity_removed(&mask(address), existed)
                }
            }
            _ => prompts::UNKNOWN_COMMAND.to_string(),
        };

        self.presenter.send(event.chat_id, &reply, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_shape() {
        assert!(looks_like_address("sender@example.com"));
        assert!(!looks_like_address("sender"));
        assert!(!looks_like_address("@example.com"));
        assert!(!looks_like_address("sender@localhost"));
        assert!(!looks_like_address("a b@example.com"));
    }
}
