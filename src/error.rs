use thiserror::Error;

/// Every failure a generation pass can produce.
///
/// All variants abort the pass immediately; no partial text is returned.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Unmatched {bracket} bracket '{symbol}' in prompt near: '{context}'")]
    UnbalancedBracket {
        bracket: &'static str,
        symbol: char,
        context: String,
    },
    #[error("Selection key '{0}' not found in state data.")]
    MissingKey(String),
    #[error("Selection key '{key}' {reason}")]
    InvalidData { key: String, reason: String },
    #[error("Cannot compare non-numeric values: '{left}' and '{right}'")]
    NonNumeric { left: String, right: String },
    #[error("Unknown operator '{0}' in prompt.")]
    UnknownOperator(String),
    #[error("{0}")]
    ReservedKey(String),
    #[error("{operator} operator requires {format} format: '{argument}'")]
    Arity {
        operator: &'static str,
        format: &'static str,
        argument: String,
    },
    #[error("{0}")]
    Syntax(String),
    #[error("Hook '{0}' not found in state hooks.")]
    HookNotFound(String),
    #[error("Error operator triggered: {value} == {expected}")]
    Triggered { value: String, expected: String },
    #[error("Include error: {0}")]
    Include(String),
    #[error("Circular reference detected when including '{0}'.")]
    IncludeCycle(String),
    #[error("Invalid template: {0}")]
    Template(String),
    #[error("Invalid regex pattern '{pattern}' in {stage}: {message}")]
    Regex {
        pattern: String,
        stage: &'static str,
        message: String,
    },
    #[error("Resource limit exceeded: {0}")]
    ResourceExhausted(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PromptResult<T> = Result<T, PromptError>;

impl PromptError {
    pub fn syntax<S: Into<String>>(message: S) -> Self {
        PromptError::Syntax(message.into())
    }

    pub fn template<S: Into<String>>(message: S) -> Self {
        PromptError::Template(message.into())
    }

    pub fn invalid_data<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        PromptError::InvalidData {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
