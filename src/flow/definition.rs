//! Validated, immutable flow graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use serde::Deserialize;

use super::step::{QuestionType, Step, StepKind};
use crate::error::{ConfigError, FlowError};

/// The fixed step graph shared by every session.
///
/// Construction validates the graph, so a `FlowDefinition` in hand always
/// has unique ids, no dangling edges, one welcome step, one plan step, and
/// every step reachable from the welcome step.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    welcome: usize,
    plan: usize,
}

/// Accepted layouts for flow files.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlowFile {
    Steps(Vec<Step>),
    Wrapped { steps: Vec<Step> },
}

impl FlowDefinition {
    pub fn new(steps: Vec<Step>) -> Result<Self, FlowError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(FlowError::DuplicateStep {
                    id: step.id.clone(),
                });
            }
        }

        for step in &steps {
            for target in step.successors() {
                if !index.contains_key(target) {
                    return Err(FlowError::DanglingTarget {
                        from: step.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
            check_question(step)?;
        }

        let welcome = unique_kind(&steps, "welcome", Step::is_welcome)?;
        let plan = unique_kind(&steps, "plan", Step::is_plan)?;

        let flow = Self {
            steps,
            index,
            welcome,
            plan,
        };

        let reachable: HashSet<&str> = flow
            .reachable_from(&flow.steps[welcome].id)
            .into_iter()
            .collect();
        if let Some(orphan) = flow
            .steps
            .iter()
            .find(|s| !reachable.contains(s.id.as_str()))
        {
            return Err(FlowError::Unreachable {
                id: orphan.id.clone(),
            });
        }

        Ok(flow)
    }

    /// Parse a flow from JSON: either an array of steps or `{"steps": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let file: FlowFile =
            serde_json::from_str(json).map_err(|e| FlowError::Parse(e.to_string()))?;
        let steps = match file {
            FlowFile::Steps(steps) | FlowFile::Wrapped { steps } => steps,
        };
        Self::new(steps)
    }

    /// Load and validate a flow file.
    pub fn from_path(path: &Path) -> Result<Self, crate::error::Error> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let flow = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), steps = flow.len(), "Loaded custom flow");
        Ok(flow)
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&pos| &self.steps[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolve the successor of `step` for the given routing key.
    ///
    /// A matching `conditional_next` entry wins; otherwise `next_step`.
    /// `None` means terminal (or nowhere to go), never an error.
    pub fn next_step_id<'a>(&self, step: &'a Step, routing_key: Option<&str>) -> Option<&'a str> {
        if let Some(key) = routing_key
            && let Some(target) = step.conditional_next.get(key)
        {
            return Some(target.as_str());
        }
        step.next_step.as_deref()
    }

    pub fn welcome_step(&self) -> &Step {
        &self.steps[self.welcome]
    }

    pub fn plan_step(&self) -> &Step {
        &self.steps[self.plan]
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step ids reachable from `start` (inclusive), breadth-first.
    pub fn reachable_from(&self, start: &str) -> Vec<&str> {
        let Some(first) = self.step(start) else {
            return Vec::new();
        };
        let mut seen: HashSet<&str> = HashSet::from([first.id.as_str()]);
        let mut order = vec![first.id.as_str()];
        let mut queue = VecDeque::from([first]);

        while let Some(step) = queue.pop_front() {
            for target in step.successors() {
                if let Some(next) = self.step(target)
                    && seen.insert(next.id.as_str())
                {
                    order.push(next.id.as_str());
                    queue.push_back(next);
                }
            }
        }
        order
    }
}

fn unique_kind(steps: &[Step], kind: &str, is_kind: fn(&Step) -> bool) -> Result<usize, FlowError> {
    let mut found: Option<usize> = None;
    for (pos, step) in steps.iter().enumerate() {
        if !is_kind(step) {
            continue;
        }
        if let Some(first) = found {
            return Err(FlowError::DuplicateStepKind {
                kind: kind.to_string(),
                first: steps[first].id.clone(),
                second: step.id.clone(),
            });
        }
        found = Some(pos);
    }
    found.ok_or_else(|| FlowError::MissingStepKind {
        kind: kind.to_string(),
    })
}

fn check_question(step: &Step) -> Result<(), FlowError> {
    let StepKind::Question(question) = &step.kind else {
        return Ok(());
    };

    if question.is_discrete() && question.options.is_empty() {
        return Err(FlowError::MissingOptions {
            id: step.id.clone(),
        });
    }

    match question.question_type {
        QuestionType::MultiSelect => {
            let (min, max) = (question.min_select(), question.max_select());
            if min == 0 || min > max || max > question.options.len() {
                return Err(FlowError::InvalidBounds {
                    id: step.id.clone(),
                    min: min as i64,
                    max: max as i64,
                });
            }
        }
        QuestionType::Slider => {
            if let (Some(min), Some(max)) = (question.min, question.max)
                && min > max
            {
                return Err(FlowError::InvalidBounds {
                    id: step.id.clone(),
                    min,
                    max,
                });
            }
        }
        QuestionType::MultipleChoice | QuestionType::TextInput => {}
    }
    Ok(())
}
