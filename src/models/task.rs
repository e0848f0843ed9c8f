//! Task records.

use serde::{Deserialize, Serialize};

/// A unit of work binding an execution to its playbook configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier
    pub model_id: String,

    /// Execution this task runs for
    pub execution_id: String,

    /// Playbook configuration built for this task
    #[serde(default)]
    pub playbook_configuration_id: Option<String>,

    /// Plugin specific payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Task {
    /// Create a task for an execution.
    pub fn new(model_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            execution_id: execution_id.into(),
            playbook_configuration_id: None,
            data: serde_json::Value::Null,
        }
    }

    /// Bind the task to a playbook configuration.
    pub fn with_playbook_configuration(mut self, id: impl Into<String>) -> Self {
        self.playbook_configuration_id = Some(id.into());
        self
    }

    /// Attach plugin specific data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Fetch a string field from the task data.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}
