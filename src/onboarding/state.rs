//! Session state: where the user is in the flow and what they answered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::{Answer, FlowDefinition};

/// Id of the welcome step in the built-in flow.
pub const INITIAL_STEP_ID: &str = "welcome";

/// Keys used in the settings table.
pub mod settings_keys {
    /// Key for the persisted session blob; the owner id is the session id.
    pub const ONBOARDING_STATE: &str = "onboarding-storage";
}

/// Mutable per-session record. Only the flow engine mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_step_id: String,
    pub answers: BTreeMap<String, Answer>,
    /// Previously visited step ids, most recent last.
    pub history: Vec<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub is_complete: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::starting_at(INITIAL_STEP_ID)
    }
}

impl SessionState {
    /// Fresh state positioned on `step_id`.
    pub fn starting_at(step_id: &str) -> Self {
        Self {
            current_step_id: step_id.to_string(),
            answers: BTreeMap::new(),
            history: Vec::new(),
            company: None,
            role: None,
            is_complete: false,
        }
    }
}

/// Which parts of the session survive a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Answers, company, role and completion only. A reloaded session starts
    /// over at the welcome step with its answers intact.
    #[default]
    Partial,
    /// Everything, including position and back-navigation history.
    Full,
}

impl std::str::FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partial" => Ok(Self::Partial),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown persist mode '{other}' (expected partial or full)")),
        }
    }
}

/// The persisted session blob.
///
/// Stored in the `settings` table under key `"onboarding-storage"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub answers: BTreeMap<String, Answer>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,
}

impl PersistedSession {
    pub fn capture(state: &SessionState, mode: PersistMode) -> Self {
        let full = mode == PersistMode::Full;
        Self {
            answers: state.answers.clone(),
            company: state.company.clone(),
            role: state.role.clone(),
            is_complete: state.is_complete,
            current_step_id: full.then(|| state.current_step_id.clone()),
            history: full.then(|| state.history.clone()),
        }
    }

    /// Rebuild a session from a stored blob.
    ///
    /// Never fails: each missing or malformed field falls back to its
    /// initial value on its own, and answers for steps the flow does not
    /// know are dropped. Position and history are only read in `Full` mode.
    pub fn restore(value: &serde_json::Value, flow: &FlowDefinition, mode: PersistMode) -> SessionState {
        let mut state = SessionState::starting_at(&flow.welcome_step().id);

        let Some(obj) = value.as_object() else {
            tracing::warn!("Persisted session is not an object; starting fresh");
            return state;
        };

        match obj.get("answers") {
            Some(serde_json::Value::Object(answers)) => {
                for (step_id, raw) in answers {
                    if !flow.contains(step_id) {
                        tracing::warn!(step_id = %step_id, "Dropping persisted answer for unknown step");
                        continue;
                    }
                    match serde_json::from_value::<Answer>(raw.clone()) {
                        Ok(answer) => {
                            state.answers.insert(step_id.clone(), answer);
                        }
                        Err(e) => {
                            tracing::warn!(step_id = %step_id, "Dropping malformed persisted answer: {}", e);
                        }
                    }
                }
            }
            None | Some(serde_json::Value::Null) => {}
            Some(other) => {
                tracing::warn!("Persisted answers are not an object ({other}); ignoring");
            }
        }

        state.company = optional_string(obj, "company");
        state.role = optional_string(obj, "role");

        match obj.get("isComplete") {
            Some(serde_json::Value::Bool(done)) => state.is_complete = *done,
            None | Some(serde_json::Value::Null) => {}
            Some(other) => tracing::warn!("Persisted isComplete is not a bool ({other}); ignoring"),
        }

        if mode == PersistMode::Full {
            if let Some(id) = obj.get("currentStepId").and_then(|v| v.as_str()) {
                if flow.contains(id) {
                    state.current_step_id = id.to_string();
                } else {
                    tracing::warn!(step_id = %id, "Persisted current step is unknown; starting at welcome");
                }
            }
            if let Some(history) = obj.get("history").and_then(|v| v.as_array()) {
                state.history = history
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter(|id| flow.contains(id))
                    .map(String::from)
                    .collect();
            }
        }

        state
    }
}

fn optional_string(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        None | Some(serde_json::Value::Null) => None,
        Some(other) => {
            tracing::warn!("Persisted {key} is not a string ({other}); ignoring");
            None
        }
    }
}
