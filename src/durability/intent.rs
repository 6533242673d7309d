use super::prefs::PreferenceStore;
use crate::error::DurabilityError;
use serde_json::Value;

/// Namespace of the recording keys in the preference store
pub const RESUME_NAMESPACE: &str = "recording_prefs";

fn key(name: &str) -> String {
    format!("{}.{}", RESUME_NAMESPACE, name)
}

/// Persisted belief that a recording should still be running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeIntent {
    pub should_resume: bool,
    pub session_id: Option<String>,
}

impl ResumeIntent {
    pub fn active(session_id: impl Into<String>) -> Self {
        Self {
            should_resume: true,
            session_id: Some(session_id.into()),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }

    /// Read the intent; missing keys mean "not resuming"
    pub fn load(store: &dyn PreferenceStore) -> Result<Self, DurabilityError> {
        let should_resume = store
            .get(&key("should_resume"))?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let session_id = store
            .get(&key("session_id"))?
            .and_then(|v| v.as_str().map(str::to_string));

        Ok(Self {
            should_resume,
            session_id,
        })
    }

    /// Both keys go to the store as one batch, so a failed write never
    /// leaves the flag and the session id out of step
    pub fn save(&self, store: &dyn PreferenceStore) -> Result<(), DurabilityError> {
        store.apply(&[
            (key("should_resume"), Some(Value::Bool(self.should_resume))),
            (key("session_id"), self.session_id.clone().map(Value::String)),
        ])
    }
}
