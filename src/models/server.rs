//! Server records.

use serde::{Deserialize, Serialize};

/// A managed server, optionally assigned to a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Server identifier
    pub model_id: String,

    /// Cluster the server belongs to (`None` = unassigned)
    #[serde(default)]
    pub cluster_id: Option<String>,

    /// Hostname
    #[serde(default)]
    pub name: String,

    /// Management IP address
    #[serde(default)]
    pub ip: String,

    /// SSH user for Ansible
    #[serde(default = "default_username")]
    pub username: String,

    /// Facts gathered by server discovery
    #[serde(default)]
    pub facts: serde_json::Value,
}

fn default_username() -> String {
    "ansible".to_string()
}

impl Server {
    /// Create a new unassigned server.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            cluster_id: None,
            name: String::new(),
            ip: String::new(),
            username: default_username(),
            facts: serde_json::Value::Null,
        }
    }

    /// Assign the server to a cluster.
    pub fn in_cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Set the management address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// Set gathered facts.
    pub fn with_facts(mut self, facts: serde_json::Value) -> Self {
        self.facts = facts;
        self
    }

    /// Address Ansible should use to reach the server.
    pub fn ansible_host(&self) -> &str {
        if self.ip.is_empty() {
            &self.model_id
        } else {
            &self.ip
        }
    }
}
