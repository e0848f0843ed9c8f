//! Execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    /// Created, not started
    #[default]
    Created,
    /// Process is running
    Started,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Created => write!(f, "created"),
            ExecutionState::Started => write!(f, "started"),
            ExecutionState::Completed => write!(f, "completed"),
            ExecutionState::Failed => write!(f, "failed"),
        }
    }
}

/// A single run of a playbook configuration. Owns the run's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution identifier
    pub model_id: String,

    /// Configuration being executed
    #[serde(default)]
    pub playbook_configuration_id: Option<String>,

    /// Current state
    #[serde(default)]
    pub state: ExecutionState,

    /// When the run started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a new execution record.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            playbook_configuration_id: None,
            state: ExecutionState::Created,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the execution as started.
    pub fn start(&mut self) {
        self.state = ExecutionState::Started;
        self.started_at = Some(Utc::now());
    }

    /// Mark the execution as finished.
    pub fn finish(&mut self, success: bool) {
        self.state = if success {
            ExecutionState::Completed
        } else {
            ExecutionState::Failed
        };
        self.finished_at = Some(Utc::now());
    }
}
