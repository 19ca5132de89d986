//! Job lifecycle state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// State of an audit job in the work queue.
///
/// Transitions are `waiting → active → completed | failed`, with
/// `active → delayed → waiting` when a failed attempt is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Ready to be claimed by a worker.
    Waiting,
    /// Waiting for its backoff delay before the next attempt.
    Delayed,
    /// Claimed by a worker and running.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully after exhausting attempts.
    Failed,
}

impl JobState {
    /// Every state, in lifecycle order.
    pub const ALL: [JobState; 5] = [
        Self::Waiting,
        Self::Delayed,
        Self::Active,
        Self::Completed,
        Self::Failed,
    ];

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if the job has not started its current attempt yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Waiting | Self::Delayed)
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Delayed => "delayed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "delayed" => Ok(Self::Delayed),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}
