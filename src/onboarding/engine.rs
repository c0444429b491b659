//! FlowEngine: the per-session state machine over a `FlowDefinition`.

use std::sync::Arc;

use serde::Serialize;

use crate::error::FlowError;
use crate::flow::{Answer, FlowDefinition, Step};
use crate::plan::{Plan, generate_plan};

use super::state::SessionState;

/// Company name used in plan recommendations when no entry context was given.
const FALLBACK_COMPANY: &str = "your target company";

/// Outcome of a navigation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Advanced { from: String, to: String },
    /// No successor resolved (or the target was the current step).
    Stayed { step: String },
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }

    /// Step the session is on after the transition.
    pub fn current(&self) -> &str {
        match self {
            Self::Advanced { to, .. } => to,
            Self::Stayed { step } => step,
        }
    }
}

/// Owns one session's state. All mutation goes through here.
#[derive(Debug, Clone)]
pub struct FlowEngine {
    flow: Arc<FlowDefinition>,
    state: SessionState,
}

impl FlowEngine {
    pub fn new(flow: Arc<FlowDefinition>) -> Self {
        let state = SessionState::starting_at(&flow.welcome_step().id);
        Self { flow, state }
    }

    /// Adopt a previously saved state, repairing anything that does not
    /// fit this flow.
    pub fn with_state(flow: Arc<FlowDefinition>, mut state: SessionState) -> Self {
        if !flow.contains(&state.current_step_id) {
            tracing::warn!(
                step_id = %state.current_step_id,
                "Restored step is not in the flow; moving to welcome"
            );
            state.current_step_id = flow.welcome_step().id.clone();
        }

        let current = state.current_step_id.clone();
        state
            .history
            .retain(|id| flow.contains(id) && *id != current);
        state.answers.retain(|id, _| flow.contains(id));

        Self { flow, state }
    }

    pub fn flow(&self) -> &Arc<FlowDefinition> {
        &self.flow
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Record the entry context. Does not move the flow.
    pub fn set_context(&mut self, company: &str, role: &str) {
        self.state.company = Some(company.to_string());
        self.state.role = Some(role.to_string());
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.flow.step(&self.state.current_step_id)
    }

    /// Record `answer` for the current step and move to its successor.
    ///
    /// The routing key is the single value, or the first element of a
    /// multi-valued answer. With no successor the session stays put and
    /// history is left alone.
    pub fn submit_answer(&mut self, answer: Answer) -> Transition {
        let from = self.state.current_step_id.clone();
        let next = self
            .flow
            .step(&from)
            .and_then(|step| self.flow.next_step_id(step, answer.routing_key()))
            .map(str::to_string);

        self.state.answers.insert(from.clone(), answer);

        match next {
            Some(to) if to != from => self.move_to(to),
            Some(_) => {
                tracing::debug!(step_id = %from, "Answer routes back to the same step; staying put");
                Transition::Stayed { step: from }
            }
            None => {
                tracing::debug!(step_id = %from, "No next step; staying put");
                Transition::Stayed { step: from }
            }
        }
    }

    /// Pop the most recent history entry. Returns false when there is
    /// nothing to go back to.
    pub fn go_back(&mut self) -> bool {
        let Some(previous) = self.state.history.pop() else {
            return false;
        };
        tracing::debug!(from = %self.state.current_step_id, to = %previous, "Went back");
        self.state.current_step_id = previous;
        true
    }

    /// Jump directly to `step_id`.
    pub fn go_to_step(&mut self, step_id: &str) -> Result<Transition, FlowError> {
        if !self.flow.contains(step_id) {
            return Err(FlowError::UnknownStep {
                id: step_id.to_string(),
            });
        }
        if step_id == self.state.current_step_id {
            return Ok(Transition::Stayed {
                step: step_id.to_string(),
            });
        }
        Ok(self.move_to(step_id.to_string()))
    }

    /// Return to the initial state, clearing answers and entry context.
    pub fn reset(&mut self) {
        self.state = SessionState::starting_at(&self.flow.welcome_step().id);
    }

    pub fn complete_onboarding(&mut self) {
        self.state.is_complete = true;
    }

    /// Back navigation is offered when there is history and the session is
    /// not on the loading or plan step.
    pub fn can_go_back(&self) -> bool {
        !self.state.history.is_empty()
            && self
                .current_step()
                .is_some_and(|s| !s.is_loading() && !s.is_plan())
    }

    pub fn plan(&self) -> Plan {
        let company = self.state.company.as_deref().unwrap_or(FALLBACK_COMPANY);
        generate_plan(&self.state.answers, company)
    }

    fn move_to(&mut self, to: String) -> Transition {
        let from = std::mem::replace(&mut self.state.current_step_id, to.clone());
        self.state.history.push(from.clone());
        self.state.history.retain(|id| *id != to);
        tracing::debug!(from = %from, to = %to, "Step transition");
        Transition::Advanced { from, to }
    }
}
