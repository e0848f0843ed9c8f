//! Plugins shipped with CephLCM.
//!
//! - [`server_discovery`]: gathers facts of a freshly added server
//! - [`cluster_deploy`]: deploys a Ceph cluster on a set of servers
//! - [`purge_cluster`]: removes Ceph from every server of a cluster

pub mod cluster_deploy;
pub mod purge_cluster;
pub mod server_discovery;

use serde_json::{json, Map, Value};

use super::PluginRegistry;
use crate::models::Server;

/// Registers every shipped plugin.
pub fn register_all(registry: &mut PluginRegistry) {
    registry.register(server_discovery::descriptor(), server_discovery::create);
    registry.register(cluster_deploy::descriptor(), cluster_deploy::create);
    registry.register(purge_cluster::descriptor(), purge_cluster::create);
}

/// `_meta.hostvars` for `servers`, keyed by inventory host name.
pub(crate) fn host_vars<F>(servers: &[&Server], extra: F) -> Value
where
    F: Fn(&Server, &mut Map<String, Value>),
{
    let mut hostvars = Map::new();
    for server in servers {
        let mut vars = Map::new();
        vars.insert("ansible_user".into(), json!(server.username));
        extra(server, &mut vars);
        hostvars.insert(server.ansible_host().to_string(), Value::Object(vars));
    }
    json!({ "hostvars": hostvars })
}

/// Inventory host names of `servers`, in order.
pub(crate) fn hosts(servers: &[&Server]) -> Value {
    servers
        .iter()
        .map(|server| json!(server.ansible_host()))
        .collect()
}

/// Servers sorted by identifier.
pub(crate) fn sorted(servers: &[Server]) -> Vec<&Server> {
    let mut sorted: Vec<&Server> = servers.iter().collect();
    sorted.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    sorted
}
