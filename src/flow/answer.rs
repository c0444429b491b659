//! Answers recorded against question steps.

use serde::{Deserialize, Serialize};

/// A user's answer to a step.
///
/// Serialized untagged: a single value is a JSON string, a multi-select is a
/// JSON array of option ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// A selected option id, free text, or a slider value.
    Single(String),
    /// Selected option ids, in selection order.
    Multi(Vec<String>),
}

impl Answer {
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multi(values.into_iter().map(Into::into).collect())
    }

    /// The value used to resolve conditional transitions.
    ///
    /// Multi-select answers route on their first selection only.
    pub fn routing_key(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Multi(_) => None,
        }
    }

    /// All values carried by the answer; a single value yields one item.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for Answer {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}
