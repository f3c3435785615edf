use std::time::Duration;

use thiserror::Error;

use crate::assistant::types::RunStatus;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AnalystError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Failed to decode function arguments: {0}")]
    MalformedOutput(String),

    #[error("Invalid function arguments received from assistant: {}", .0.join("; "))]
    InvalidOutput(Vec<String>),

    #[error("Unexpected action from assistant: {0}")]
    UnexpectedAction(String),

    #[error("Analysis failed with status {status}. Details: {detail}")]
    RunFailed { status: RunStatus, detail: String },

    #[error("Run did not reach a terminal state within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<reqwest::Error> for AnalystError {
    fn from(err: reqwest::Error) -> Self {
        AnalystError::Transport(err.to_string())
    }
}

impl AnalystError {
    /// True when the remote assistant answered but broke the output contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AnalystError::MalformedOutput(_)
                | AnalystError::InvalidOutput(_)
                | AnalystError::UnexpectedAction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalystError>;
