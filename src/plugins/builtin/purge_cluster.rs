//! Ceph cluster removal.

use serde_json::{Map, Value};

use super::{host_vars, hosts, sorted};
use crate::error::Result;
use crate::hints::ResolvedHints;
use crate::models::{Cluster, Server};
use crate::plugins::{
    CephAnsible, CephPlaybook, Plugin, PluginContext, PluginDescriptor, PlaybookPlugin,
};
use crate::policy::ServerListPolicy;

pub const ENTRY_POINT: &str = "purge_cluster";

/// Groups used when the cluster does not record its roles.
const DEFAULT_GROUPS: [&str; 2] = ["mons", "osds"];

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY_POINT, ENTRY_POINT)
        .with_name("Purge cluster")
        .with_description("Removes Ceph and its data from every server of a cluster")
        .with_server_list(true, ServerListPolicy::InThisCluster)
}

pub fn create(context: PluginContext) -> Result<Box<dyn Plugin>> {
    let plugin = PlaybookPlugin::new(descriptor(), context.clone(), |config| {
        CephAnsible::from_config(&context, config, PurgeCluster)
    })?;
    Ok(Box::new(plugin))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PurgeCluster;

impl CephPlaybook for PurgeCluster {
    fn make_inventory(
        &self,
        cluster: &Cluster,
        servers: &[Server],
        _hints: &ResolvedHints,
    ) -> Result<Value> {
        let servers = sorted(servers);
        let mut inventory = Map::new();

        let roles = &cluster.configuration.roles;
        if roles.is_empty() {
            for group in DEFAULT_GROUPS {
                inventory.insert(group.into(), hosts(&servers));
            }
        } else {
            for (role, ids) in roles {
                let members: Vec<&Server> = servers
                    .iter()
                    .copied()
                    .filter(|server| ids.contains(&server.model_id))
                    .collect();
                inventory.insert(role.clone(), hosts(&members));
            }
        }

        inventory.insert("_meta".into(), host_vars(&servers, |_, _| {}));
        Ok(Value::Object(inventory))
    }
}
