//! Server list policies.
//!
//! Every plugin declares how the servers it runs against must relate to the
//! target cluster. The policy is checked once, before a run configuration is
//! built, so a violation never leaves a partial run behind.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Cluster, Server};

/// Required relationship between the target servers and the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerListPolicy {
    /// No constraint
    #[default]
    AnyServer,
    /// Every server belongs to the cluster
    InThisCluster,
    /// No server belongs to the cluster
    NotInThisCluster,
    /// Every server belongs to some other cluster
    InOtherCluster,
    /// No server belongs to another cluster (unassigned is fine)
    NotInOtherCluster,
    /// Every server belongs to some cluster
    InAnyCluster,
    /// No server belongs to any cluster
    NotInAnyCluster,
}

impl ServerListPolicy {
    /// All policies, in declaration order.
    pub const ALL: [ServerListPolicy; 7] = [
        ServerListPolicy::AnyServer,
        ServerListPolicy::InThisCluster,
        ServerListPolicy::NotInThisCluster,
        ServerListPolicy::InOtherCluster,
        ServerListPolicy::NotInOtherCluster,
        ServerListPolicy::InAnyCluster,
        ServerListPolicy::NotInAnyCluster,
    ];

    /// Checks `servers` against the policy.
    ///
    /// Fails with [`Error::Validation`] if the list is empty or if any server
    /// violates the relationship. The error lists the violators sorted by id.
    pub fn check(&self, cluster: &Cluster, servers: &[Server]) -> Result<()> {
        if servers.is_empty() {
            return Err(Error::validation("Servers should not be empty.", Vec::new()));
        }

        let violators: Vec<&Server> = servers
            .iter()
            .filter(|srv| self.is_violated_by(cluster, srv))
            .collect();
        if violators.is_empty() {
            return Ok(());
        }

        let ids = sorted_ids(&violators);
        let message = self.violation_message(&ids.join(", "), &cluster.model_id);
        warn!("{}", message);

        Err(Error::validation(message, ids))
    }

    /// Returns true if `server` does not satisfy the policy for `cluster`.
    pub fn is_violated_by(&self, cluster: &Cluster, server: &Server) -> bool {
        let this = Some(cluster.model_id.as_str());
        // An empty cluster id means the server is unassigned.
        let current = server.cluster_id.as_deref().filter(|id| !id.is_empty());

        match self {
            ServerListPolicy::AnyServer => false,
            ServerListPolicy::InThisCluster => current != this,
            ServerListPolicy::NotInThisCluster => current == this,
            ServerListPolicy::InOtherCluster => current.is_none() || current == this,
            ServerListPolicy::NotInOtherCluster => current.is_some() && current != this,
            ServerListPolicy::InAnyCluster => current.is_none(),
            ServerListPolicy::NotInAnyCluster => current.is_some(),
        }
    }

    fn violation_message(&self, servers: &str, cluster: &str) -> String {
        match self {
            ServerListPolicy::AnyServer => String::new(),
            ServerListPolicy::InThisCluster => {
                format!("Servers {servers} do not belong to cluster {cluster}")
            }
            ServerListPolicy::NotInThisCluster => {
                format!("Servers {servers} belong to cluster {cluster}")
            }
            ServerListPolicy::InOtherCluster => {
                format!("Servers {servers} not in other cluster than {cluster}")
            }
            ServerListPolicy::NotInOtherCluster => {
                format!("Servers {servers} in other cluster than {cluster}")
            }
            ServerListPolicy::InAnyCluster => format!("Servers {servers} are not in any cluster"),
            ServerListPolicy::NotInAnyCluster => format!("Servers {servers} are in clusters"),
        }
    }
}

impl fmt::Display for ServerListPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerListPolicy::AnyServer => "any_server",
            ServerListPolicy::InThisCluster => "in_this_cluster",
            ServerListPolicy::NotInThisCluster => "not_in_this_cluster",
            ServerListPolicy::InOtherCluster => "in_other_cluster",
            ServerListPolicy::NotInOtherCluster => "not_in_other_cluster",
            ServerListPolicy::InAnyCluster => "in_any_cluster",
            ServerListPolicy::NotInAnyCluster => "not_in_any_cluster",
        };
        f.write_str(name)
    }
}

/// Validates `servers` against `policy` for `cluster`.
pub fn validate(policy: ServerListPolicy, cluster: &Cluster, servers: &[Server]) -> Result<()> {
    policy.check(cluster, servers)
}

fn sorted_ids(servers: &[&Server]) -> Vec<String> {
    let mut ids: Vec<String> = servers.iter().map(|srv| srv.model_id.clone()).collect();
    ids.sort();
    ids
}
