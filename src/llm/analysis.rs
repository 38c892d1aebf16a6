//! Content-Analysis Invoker — prompt building and response validation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AnalysisError;

use super::{Attachment, GenerationRequest, GenerativeModel, ResponseShape};

/// The drafted notification: where it goes, its subject, and its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artifact {
    pub target: String,
    pub subject: String,
    pub body: String,
}

/// Result of an analysis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    Text(String),
    Artifact(Artifact),
}

/// Depth of a screenshot report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDepth {
    Short,
    Long,
}

impl ReportDepth {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Short => "SHORT",
            Self::Long => "LONG",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Short => {
                "Analyze this screenshot. Give a short verdict (Safe/Unsafe) in 3 lines with emojis."
            }
            Self::Long => {
                "Analyze this screenshot. Give a detailed professional analysis \
                 (Members, Vibe, Fake/Real)."
            }
        }
    }
}

/// Inputs collected by the report wizard for drafting.
#[derive(Debug, Clone)]
pub struct DraftRequest<'a> {
    /// Scheme-less link to the reported group, e.g. `t.me/group`.
    pub link: &'a str,
    pub identifier: &'a str,
    pub reason: &'a str,
    pub subject: &'a str,
    pub signer: &'a str,
}

impl DraftRequest<'_> {
    fn prompt(&self) -> String {
        format!(
            "Act as a cybersecurity legal expert. Write a formal takedown request email \
             to the Telegram abuse department about the group in the attached screenshot.\n\
             DETAILS PROVIDED:\n\
             - Group link: {link}\n\
             - Chat ID: {identifier}\n\
             - Reason/Evidence: {reason}\n\
             Analyze the attached screenshot for further proof.\n\n\
             Rules:\n\
             - Write links without the http:// or https:// prefix.\n\
             - Be professional, urgent, and strict.\n\
             - Sign the email as {signer}.\n\n\
             Respond with ONLY a JSON object with exactly these keys:\n\
             - \"target\": the abuse department email address (abuse@telegram.org)\n\
             - \"subject\": exactly \"{subject}\"\n\
             - \"body\": the full email body as plain text",
            link = self.link,
            identifier = self.identifier,
            reason = self.reason,
            signer = self.signer,
            subject = self.subject,
        )
    }
}

/// Builds prompts, calls the model once, and validates the answer.
pub struct ContentAnalyzer {
    model: Arc<dyn GenerativeModel>,
}

impl ContentAnalyzer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Run one instruction against one image.
    ///
    /// With `ResponseShape::Json` the answer must be an object with exactly
    /// `target`, `subject` and `body`, all non-empty.
    pub async fn analyze(
        &self,
        image: Vec<u8>,
        instruction: &str,
        shape: ResponseShape,
    ) -> Result<Analysis, AnalysisError> {
        let request = GenerationRequest {
            prompt: instruction.to_string(),
            attachment: Some(Attachment::image(image)),
            shape,
        };

        let raw = self.model.generate(request).await.inspect_err(|e| {
            warn!(kind = e.kind(), error = %e, model = self.model.model_name(), "Analysis call failed");
        })?;

        match shape {
            ResponseShape::Text => Ok(Analysis::Text(raw.trim().to_string())),
            ResponseShape::Json => {
                let artifact = parse_artifact(self.model.model_name(), &raw).inspect_err(|e| {
                    warn!(kind = e.kind(), error = %e, "Analysis response rejected");
                })?;
                Ok(Analysis::Artifact(artifact))
            }
        }
    }

    /// Short or long verdict on a screenshot.
    pub async fn report(&self, image: Vec<u8>, depth: ReportDepth) -> Result<String, AnalysisError> {
        match self
            .analyze(image, depth.instruction(), ResponseShape::Text)
            .await?
        {
            Analysis::Text(text) => Ok(text),
            Analysis::Artifact(_) => Err(self.shape_error("expected text, got a record")),
        }
    }

    /// Draft the takedown notification.
    pub async fn draft(
        &self,
        image: Vec<u8>,
        request: &DraftRequest<'_>,
    ) -> Result<Artifact, AnalysisError> {
        info!(link = request.link, "Drafting takedown notification");
        match self
            .analyze(image, &request.prompt(), ResponseShape::Json)
            .await?
        {
            Analysis::Artifact(artifact) => Ok(artifact),
            Analysis::Text(_) => Err(self.shape_error("expected a record, got text")),
        }
    }

    fn shape_error(&self, reason: &str) -> AnalysisError {
        AnalysisError::Shape {
            provider: self.model.model_name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Validate a model answer as an `Artifact`.
fn parse_artifact(provider: &str, raw: &str) -> Result<Artifact, AnalysisError> {
    let shape = |reason: String| AnalysisError::Shape {
        provider: provider.to_string(),
        reason,
    };

    let json_str = extract_json_object(raw).ok_or_else(|| shape("no JSON object in response".into()))?;
    let artifact: Artifact =
        serde_json::from_str(json_str).map_err(|e| shape(format!("invalid artifact: {e}")))?;

    for (field, value) in [
        ("target", &artifact.target),
        ("subject", &artifact.subject),
        ("body", &artifact.body),
    ] {
        if value.trim().is_empty() {
            return Err(shape(format!("field '{field}' is empty")));
        }
    }
    Ok(artifact)
}

/// Extract a JSON object from model output that might contain markdown fences
/// or surrounding prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
