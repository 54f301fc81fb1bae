//! Evaluation errors.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised while evaluating a value tree.
///
/// Errors are `Clone` because a pending value is shared: every consumer that
/// awaits it observes the same outcome, including a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Expected a resource when evaluating {input}, got {value}")]
    UnexpectedShape { input: String, value: String },

    #[error("{component} expects {expected} child, got {found}")]
    ChildCount {
        component: String,
        expected: String,
        found: usize,
    },

    #[error("{component} requires the '{prop}' prop")]
    MissingProp { component: String, prop: String },

    #[error("{0}")]
    Service(String),

    #[error("Evaluation did not settle after {0} steps")]
    StepLimitExceeded(usize),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EvalError {
    /// Shorthand for a failure raised by a service body.
    pub fn service(message: impl Into<String>) -> Self {
        EvalError::Service(message.into())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(e: serde_json::Error) -> Self {
        EvalError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for EvalError {
    fn from(e: toml::de::Error) -> Self {
        EvalError::Config(e.to_string())
    }
}

impl From<std::io::Error> for EvalError {
    fn from(e: std::io::Error) -> Self {
        EvalError::Config(e.to_string())
    }
}
