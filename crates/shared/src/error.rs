use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    /// Position is past the end of the script.
    Halted,
    /// The counterpart decision has been recorded; only a reset resumes.
    Decided,
    InputClosed,
    UploadUnavailable,
    UnknownLane,
    AlreadyActive,
    StaleCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRejection {
    pub code: RejectionCode,
    pub message: String,
}

impl CommandRejection {
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct CommandRejected {
    pub code: RejectionCode,
    pub message: String,
}

impl CommandRejected {
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<CommandRejected> for CommandRejection {
    fn from(value: CommandRejected) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
