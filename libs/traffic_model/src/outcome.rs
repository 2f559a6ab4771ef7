use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a request produced no HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connect,
    Body,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Body => "body",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Status(u16),
    Error(ErrorKind),
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{}", code),
            Self::Error(kind) => write!(f, "{}", kind),
        }
    }
}

/// Record of one executed action, emitted once and then handed off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub task_name: String,
    pub user_id: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: OutcomeStatus,
    pub success: bool,
}

impl RequestOutcome {
    /// Outcome for a request that got a response. Only 2xx counts as success.
    pub fn from_status(
        task_name: impl Into<String>,
        user_id: usize,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        status: u16,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            user_id,
            started_at,
            duration_ms: elapsed_ms(elapsed),
            status: OutcomeStatus::Status(status),
            success: (200..300).contains(&status),
        }
    }

    pub fn from_error(
        task_name: impl Into<String>,
        user_id: usize,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        kind: ErrorKind,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            user_id,
            started_at,
            duration_ms: elapsed_ms(elapsed),
            status: OutcomeStatus::Error(kind),
            success: false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.status {
            OutcomeStatus::Status(code) => Some(code),
            OutcomeStatus::Error(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.status {
            OutcomeStatus::Status(_) => None,
            OutcomeStatus::Error(kind) => Some(kind),
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
