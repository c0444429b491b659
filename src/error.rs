//! Error types for the interview coach.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

/// Flow definition and navigation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Step {id} is declared more than once")]
    DuplicateStep { id: String },

    #[error("Step {from} points at unknown step {target}")]
    DanglingTarget { from: String, target: String },

    #[error("Flow has no {kind} step")]
    MissingStepKind { kind: String },

    #[error("Flow has more than one {kind} step: {first} and {second}")]
    DuplicateStepKind {
        kind: String,
        first: String,
        second: String,
    },

    #[error("Step {id} is not reachable from the welcome step")]
    Unreachable { id: String },

    #[error("Question step {id} has no options")]
    MissingOptions { id: String },

    #[error("Question step {id} has invalid bounds: min {min}, max {max}")]
    InvalidBounds { id: String, min: i64, max: i64 },

    #[error("Unknown step: {id}")]
    UnknownStep { id: String },

    #[error("Failed to parse flow definition: {0}")]
    Parse(String),
}

/// Session-level errors surfaced to presentation adapters.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found")]
    NotFound { id: String },

    #[error("Invalid answer for step {step_id}: {reason}")]
    InvalidAnswer { step_id: String, reason: String },

    #[error("{kind} step {step_id} does not accept {action}")]
    WrongStep {
        step_id: String,
        kind: &'static str,
        action: String,
    },

    #[error("Navigation failed: {0}")]
    Navigation(#[from] FlowError),
}

/// Result type alias for the coach.
pub type Result<T> = std::result::Result<T, Error>;
