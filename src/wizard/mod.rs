//! Session-backed wizards.
//!
//! Two linear flows share one session document per actor: the report wizard
//! (screenshot, analysis, takedown draft, dispatch) and the privileged
//! provisioning wizard (add a relay identity). The actor's position is an
//! explicit `Stage` stored in the session and checked on every text input.

pub mod engine;
pub mod prompts;
pub mod provisioning;
pub mod report;
pub mod state;

pub use engine::{Collaborators, Engine};
pub use state::{ProvisioningStage, ReportStage, Stage};
