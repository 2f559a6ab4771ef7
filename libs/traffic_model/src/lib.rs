pub mod outcome;
pub mod pacing;
pub mod task;

pub use outcome::{ErrorKind, OutcomeStatus, RequestOutcome};
pub use pacing::{RampUp, ThinkTime};
pub use task::{select_task, TaskDefinition, TaskSet, Tick};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Task set is empty")]
    EmptyTaskSet,

    #[error("Total task weight must be greater than zero")]
    ZeroTotalWeight,

    #[error("Task '{task}' has weight 0, weights must be at least 1")]
    InvalidWeight { task: String },

    #[error("Task '{task}' has gate probability {value}, expected a value in [0, 1]")]
    InvalidGateProbability { task: String, value: f64 },

    #[error("Task name '{0}' is registered more than once")]
    DuplicateTaskName(String),

    #[error("Think time minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvalidThinkTime { min_ms: u128, max_ms: u128 },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn invalid_setting(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
