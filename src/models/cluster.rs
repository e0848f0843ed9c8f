//! Cluster records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Deployment state and role layout of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfiguration {
    /// Whether the cluster has been deployed
    #[serde(default)]
    pub state: bool,

    /// Server identifiers per role (`mons`, `osds`, ...)
    #[serde(default)]
    pub roles: IndexMap<String, Vec<String>>,
}

/// A storage cluster managed by CephLCM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster identifier (also the Ceph fsid)
    pub model_id: String,

    /// Display name
    pub name: String,

    /// Deployment configuration
    #[serde(default)]
    pub configuration: ClusterConfiguration,
}

impl Cluster {
    /// Create a new, not yet deployed, cluster.
    pub fn new(model_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            name: name.into(),
            configuration: ClusterConfiguration::default(),
        }
    }

    /// Mark the cluster as deployed or not.
    pub fn with_state(mut self, deployed: bool) -> Self {
        self.configuration.state = deployed;
        self
    }

    /// Returns true if the cluster has been deployed.
    pub fn is_deployed(&self) -> bool {
        self.configuration.state
    }
}
