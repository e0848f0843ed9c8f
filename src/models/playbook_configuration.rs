//! Playbook configurations: the persisted output of building a run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Variables handed to the playbook as `--extra-vars`, in insertion order.
pub type GlobalVars = IndexMap<String, serde_json::Value>;

/// The `{global_vars, inventory}` pair produced once per task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Variables passed to the playbook
    pub global_vars: GlobalVars,

    /// Inventory served to Ansible, opaque to the core
    pub inventory: serde_json::Value,
}

/// A persisted, named run configuration for a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookConfiguration {
    /// Configuration identifier
    pub model_id: String,

    /// Display name
    pub name: String,

    /// Entry point of the plugin the configuration was built by
    pub playbook_id: String,

    /// Cluster the configuration targets
    pub cluster_id: String,

    /// Built configuration
    pub configuration: RunConfiguration,
}
