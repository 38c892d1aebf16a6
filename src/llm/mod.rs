//! Generative-content integration.
//!
//! The bot needs one capability from a model: given a prompt and (optionally)
//! an image, produce either free text or a JSON document. `GenerativeModel`
//! is that seam; `GeminiClient` implements it over the Gemini REST API and
//! tests substitute stubs. `ContentAnalyzer` sits on top and owns prompts and
//! response validation.

pub mod analysis;
pub mod gemini;

pub use analysis::{Analysis, Artifact, ContentAnalyzer, DraftRequest, ReportDepth};
pub use gemini::GeminiClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AnalysisError;

/// Requested response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Opaque prose.
    Text,
    /// A single JSON document.
    Json,
}

/// Binary input sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Wrap image bytes, sniffing PNG/WebP and defaulting to JPEG (what
    /// Telegram re-encodes photos to).
    pub fn image(data: Vec<u8>) -> Self {
        let mime_type = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            "image/webp"
        } else {
            "image/jpeg"
        };
        Self {
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub attachment: Option<Attachment>,
    pub shape: ResponseShape,
}

/// A model that turns a prompt (plus optional image) into text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Single attempt, no retry. Transport and service faults are
    /// `AnalysisError::Invocation`; an empty answer is `AnalysisError::Shape`.
    async fn generate(&self, request: GenerationRequest) -> Result<String, AnalysisError>;
}

/// Create the production model client.
pub fn create_provider(
    api_key: secrecy::SecretString,
    model: &str,
) -> Result<Arc<dyn GenerativeModel>, AnalysisError> {
    let client = GeminiClient::new(api_key, model)?;
    tracing::info!("Using Gemini (model: {})", model);
    Ok(Arc::new(client))
}
