//! Session documents — a flat field map per actor.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::DatabaseError;
use crate::llm::Artifact;
use crate::wizard::state::Stage;

/// Field names used inside a session document.
pub mod keys {
    /// Transport file id of the evidence screenshot.
    pub const ATTACHMENT: &str = "photo_id";
    /// Explicit wizard stage (`{"wizard": ..., "stage": ...}`).
    pub const STAGE: &str = "stage";
    /// Message id of the last bot prompt, deleted on the next step.
    pub const LAST_PROMPT: &str = "last_prompt_id";
    /// Report wizard, step 1.
    pub const TARGET_LINK: &str = "target_link";
    /// Report wizard, step 2.
    pub const TARGET_IDENTIFIER: &str = "target_identifier";
    /// Report wizard, step 3.
    pub const REASON: &str = "reason";
    /// Drafted `{target, subject, body}`.
    pub const ARTIFACT: &str = "artifact";
    /// Provisioning wizard, step 1.
    pub const PENDING_IDENTITY: &str = "pending_identity";

    /// Fields owned by the report wizard, cleared when it restarts.
    pub const REPORT_SCOPED: &[&str] = &[TARGET_LINK, TARGET_IDENTIFIER, REASON, ARTIFACT];

    /// Fields owned by the provisioning wizard.
    pub const PROVISIONING_SCOPED: &[&str] = &[PENDING_IDENTITY];
}

/// A snapshot of one actor's session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    fields: BTreeMap<String, Value>,
}

impl Session {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn attachment(&self) -> Option<&str> {
        self.get_str(keys::ATTACHMENT).filter(|s| !s.is_empty())
    }

    /// Current stage. Absent or unreadable stages read as idle.
    pub fn stage(&self) -> Stage {
        match self.fields.get(keys::STAGE) {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Unreadable stage in session, treating as idle");
                Stage::Idle
            }),
            None => Stage::Idle,
        }
    }

    pub fn artifact(&self) -> Option<Artifact> {
        let raw = self.fields.get(keys::ARTIFACT)?;
        serde_json::from_value(raw.clone()).ok()
    }

    pub fn last_prompt(&self) -> Option<i64> {
        self.fields.get(keys::LAST_PROMPT).and_then(Value::as_i64)
    }

    /// Merge a patch into this snapshot, mirroring what the store does.
    pub fn apply(&mut self, patch: &SessionPatch) {
        for (key, value) in patch.iter() {
            if value.is_null() {
                self.fields.remove(key);
            } else {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }
}

/// A partial update to a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    fields: BTreeMap<String, Value>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn set_json<T: Serialize>(self, key: &str, value: &T) -> Result<Self, DatabaseError> {
        let value =
            serde_json::to_value(value).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        Ok(self.set(key, value))
    }

    pub fn stage(self, stage: Stage) -> Result<Self, DatabaseError> {
        self.set_json(keys::STAGE, &stage)
    }

    /// Remove a field on write.
    pub fn clear(mut self, key: &str) -> Self {
        self.fields.insert(key.to_string(), Value::Null);
        self
    }

    pub fn clear_all(self, keys: &[&str]) -> Self {
        keys.iter().fold(self, |patch, key| patch.clear(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::state::ReportStage;

    #[test]
    fn apply_merges_and_overrides() {
        let mut session = Session::default();
        session.apply(&SessionPatch::new().set("a", "1").set("b", "2"));
        session.apply(&SessionPatch::new().set("b", "3").set("c", "4"));

        assert_eq!(session.get_str("a"), Some("1"));
        assert_eq!(session.get_str("b"), Some("3"));
        assert_eq!(session.get_str("c"), Some("4"));
    }

    #[test]
    fn clear_removes_field() {
        let mut session = Session::default();
        session.apply(&SessionPatch::new().set("a", "1").set("b", "2"));
        session.apply(&SessionPatch::new().clear("a"));
        assert!(session.get("a").is_none());
        assert_eq!(session.get_str("b"), Some("2"));
    }

    #[test]
    fn stage_defaults_to_idle() {
        assert_eq!(Session::default().stage(), Stage::Idle);

        let mut session = Session::default();
        session.apply(&SessionPatch::new().set(keys::STAGE, "garbage"));
        assert_eq!(session.stage(), Stage::Idle);
    }

    #[test]
    fn stage_read_back() {
        let mut session = Session::default();
        let patch = SessionPatch::new()
            .stage(Stage::Report(ReportStage::AwaitingReason))
            .unwrap();
        session.apply(&patch);
        assert_eq!(session.stage(), Stage::Report(ReportStage::AwaitingReason));
    }

    #[test]
    fn empty_attachment_is_absent() {
        let mut session = Session::default();
        session.apply(&SessionPatch::new().set(keys::ATTACHMENT, ""));
        assert!(session.attachment().is_none());
    }

    #[test]
    fn artifact_requires_all_fields() {
        let mut session = Session::default();
        session.apply(&SessionPatch::new().set(
            keys::ARTIFACT,
            serde_json::json!({"target": "abuse@telegram.org", "subject": "s"}),
        ));
        assert!(session.artifact().is_none());

        session.apply(&SessionPatch::new().set(
            keys::ARTIFACT,
            serde_json::json!({"target": "abuse@telegram.org", "subject": "s", "body": "b"}),
        ));
        assert_eq!(session.artifact().unwrap().body, "b");
    }
}
