//! Dispatch — fan a drafted artifact out through every relay identity.

pub mod coordinator;
pub mod mask;
pub mod relay;

pub use coordinator::{DispatchReport, Dispatcher, Outcome, StatusEntry};
pub use mask::mask;
pub use relay::{Relay, SmtpRelay};
