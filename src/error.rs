//! Error types for the takedown bot.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to edit message {message_id} on channel {name}: {reason}")]
    EditFailed {
        name: String,
        message_id: i64,
        reason: String,
    },

    #[error("Failed to delete message {message_id} on channel {name}: {reason}")]
    DeleteFailed {
        name: String,
        message_id: i64,
        reason: String,
    },

    #[error("Failed to download file {file_id}: {reason}")]
    DownloadFailed { file_id: String, reason: String },

    #[error("Message of {length} bytes exceeds the {limit}-byte limit")]
    MessageTooLong { length: usize, limit: usize },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Content-analysis failures.
///
/// `Invocation` means the service could not be reached or refused the call;
/// `Shape` means it answered but the answer is unusable.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Provider {provider} request failed: {reason}")]
    Invocation { provider: String, reason: String },

    #[error("Response from {provider} has the wrong shape: {reason}")]
    Shape { provider: String, reason: String },
}

impl AnalysisError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invocation { .. } => "invocation",
            Self::Shape { .. } => "shape",
        }
    }
}

/// Relay (SMTP submission) failures for a single identity.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Could not connect to relay {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Relay rejected message: {0}")]
    Rejected(String),

    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },
}

/// Wizard-level failures. All of them are recoverable from the actor's view.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Session field {field} missing for actor {actor}")]
    SessionMiss { actor: String, field: String },

    #[error("Input arrived out of sequence (stage {stage})")]
    OutOfSequence { stage: String },

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Transport error: {0}")]
    Transport(#[from] ChannelError),
}
