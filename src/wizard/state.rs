//! Wizard stages — the explicit, persisted position of an actor in a flow.

use serde::{Deserialize, Serialize};

/// Report wizard stages.
///
/// Progresses: AwaitingAction → AwaitingTarget → AwaitingIdentifier →
/// AwaitingReason, then back to idle once the draft exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    /// Screenshot stored, waiting for an action button.
    AwaitingAction,
    AwaitingTarget,
    AwaitingIdentifier,
    AwaitingReason,
}

/// Provisioning wizard stages (privileged actor only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStage {
    AwaitingIdentifier,
    AwaitingSecret,
}

/// An actor's stage, stored in the session under `stage`.
///
/// Serialized as `{"wizard": "report", "stage": "awaiting_target"}`, or
/// `{"wizard": "idle"}` when no wizard is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "wizard", content = "stage", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Report(ReportStage),
    Provisioning(ProvisioningStage),
}

impl Stage {
    /// Whether a free-text message is the expected next input.
    pub fn expects_text(&self) -> bool {
        use ReportStage::*;
        matches!(
            self,
            Self::Report(AwaitingTarget | AwaitingIdentifier | AwaitingReason)
                | Self::Provisioning(_)
        )
    }

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Entry points (screenshot, wizard buttons, cancel) may start from any
    /// stage; everything else advances one step at a time.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use ProvisioningStage as P;
        use ReportStage as R;
        match (self, target) {
            (_, Stage::Idle) => true,
            (_, Stage::Report(R::AwaitingAction)) => true,
            (_, Stage::Report(R::AwaitingTarget)) => true,
            (_, Stage::Provisioning(P::AwaitingIdentifier)) => true,
            (Stage::Report(R::AwaitingTarget), Stage::Report(R::AwaitingIdentifier)) => true,
            (Stage::Report(R::AwaitingIdentifier), Stage::Report(R::AwaitingReason)) => true,
            (Stage::Provisioning(P::AwaitingIdentifier), Stage::Provisioning(P::AwaitingSecret)) => {
                true
            }
            _ => false,
        }
    }

    /// The stage after a successful text step. Terminal text stages return idle.
    pub fn next(&self) -> Option<Stage> {
        use ProvisioningStage as P;
        use ReportStage as R;
        match self {
            Self::Report(R::AwaitingTarget) => Some(Self::Report(R::AwaitingIdentifier)),
            Self::Report(R::AwaitingIdentifier) => Some(Self::Report(R::AwaitingReason)),
            Self::Report(R::AwaitingReason) => Some(Self::Idle),
            Self::Provisioning(P::AwaitingIdentifier) => Some(Self::Provisioning(P::AwaitingSecret)),
            Self::Provisioning(P::AwaitingSecret) => Some(Self::Idle),
            Self::Idle | Self::Report(R::AwaitingAction) => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Report(ReportStage::AwaitingAction) => "report/awaiting_action",
            Self::Report(ReportStage::AwaitingTarget) => "report/awaiting_target",
            Self::Report(ReportStage::AwaitingIdentifier) => "report/awaiting_identifier",
            Self::Report(ReportStage::AwaitingReason) => "report/awaiting_reason",
            Self::Provisioning(ProvisioningStage::AwaitingIdentifier) => {
                "provisioning/awaiting_identifier"
            }
            Self::Provisioning(ProvisioningStage::AwaitingSecret) => "provisioning/awaiting_secret",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_shape() {
        let stage = Stage::Report(ReportStage::AwaitingTarget);
        let json = serde_json::to_value(stage).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"wizard": "report", "stage": "awaiting_target"})
        );
        assert_eq!(
            serde_json::to_value(Stage::Idle).unwrap(),
            serde_json::json!({"wizard": "idle"})
        );
    }

    #[test]
    fn report_text_steps_walk_to_idle() {
        let mut stage = Stage::Report(ReportStage::AwaitingTarget);
        let expected = [
            Stage::Report(ReportStage::AwaitingIdentifier),
            Stage::Report(ReportStage::AwaitingReason),
            Stage::Idle,
        ];
        for want in expected {
            let next = stage.next().unwrap();
            assert!(stage.can_transition_to(next), "{stage} -> {next}");
            assert_eq!(next, want);
            stage = next;
        }
        assert!(stage.next().is_none());
    }

    #[test]
    fn provisioning_text_steps_walk_to_idle() {
        let stage = Stage::Provisioning(ProvisioningStage::AwaitingIdentifier);
        let secret = stage.next().unwrap();
        assert_eq!(secret, Stage::Provisioning(ProvisioningStage::AwaitingSecret));
        assert_eq!(secret.next(), Some(Stage::Idle));
    }

    #[test]
    fn invalid_transitions() {
        // Skipping a step
        assert!(
            !Stage::Report(ReportStage::AwaitingTarget)
                .can_transition_to(Stage::Report(ReportStage::AwaitingReason))
        );
        // Crossing wizards mid-flow
        assert!(
            !Stage::Report(ReportStage::AwaitingIdentifier)
                .can_transition_to(Stage::Provisioning(ProvisioningStage::AwaitingSecret))
        );
        // Going backward
        assert!(
            !Stage::Report(ReportStage::AwaitingReason)
                .can_transition_to(Stage::Report(ReportStage::AwaitingIdentifier))
        );
    }

    #[test]
    fn idle_and_action_stages_do_not_expect_text() {
        assert!(!Stage::Idle.expects_text());
        assert!(!Stage::Report(ReportStage::AwaitingAction).expects_text());
        assert!(Stage::Report(ReportStage::AwaitingReason).expects_text());
        assert!(Stage::Provisioning(ProvisioningStage::AwaitingSecret).expects_text());
    }
}
