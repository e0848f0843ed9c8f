//! Ceph cluster deployment.

use serde_json::{json, Map, Value};

use super::{host_vars, hosts, sorted};
use crate::error::{Error, Result};
use crate::hints::{Hint, Hints, ResolvedHints};
use crate::models::{Cluster, GlobalVars, Server};
use crate::plugins::{
    CephAnsible, CephPlaybook, Plugin, PluginContext, PluginDescriptor, PlaybookPlugin,
};
use crate::policy::ServerListPolicy;

pub const ENTRY_POINT: &str = "cluster_deploy";

/// Monitors deployed when neither the config nor the hints say otherwise.
const DEFAULT_MON_COUNT: i64 = 3;

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY_POINT, ENTRY_POINT)
        .with_name("Deploy Ceph cluster")
        .with_description("Installs Ceph monitors and OSDs on the given servers")
        .with_server_list(true, ServerListPolicy::NotInOtherCluster)
        .with_cluster_must_be_deployed(false)
}

pub fn create(context: PluginContext) -> Result<Box<dyn Plugin>> {
    let plugin = PlaybookPlugin::new(descriptor(), context.clone(), |config| {
        CephAnsible::from_config(&context, config, ClusterDeploy::from_config(config))
    })?;
    Ok(Box::new(plugin))
}

/// Inventory and variables of a deployment.
#[derive(Debug, Clone)]
pub struct ClusterDeploy {
    mon_count: i64,
}

impl ClusterDeploy {
    pub fn new(mon_count: i64) -> Self {
        Self { mon_count }
    }

    /// Reads the default monitor count from the plugin configuration.
    pub fn from_config(config: &serde_yaml::Value) -> Self {
        let mon_count = config
            .get("mon_count")
            .and_then(serde_yaml::Value::as_i64)
            .unwrap_or(DEFAULT_MON_COUNT);
        Self::new(mon_count)
    }

    /// Requested monitor count; must be a positive integer.
    fn mon_count(&self, hints: &ResolvedHints) -> Result<usize> {
        let requested = hints
            .get("mon_count")
            .cloned()
            .unwrap_or_else(|| json!(self.mon_count));
        requested
            .as_i64()
            .filter(|&count| count > 0)
            .and_then(|count| usize::try_from(count).ok())
            .ok_or_else(|| {
                Error::validation(
                    format!("mon_count must be a positive integer, got {requested}"),
                    Vec::new(),
                )
            })
    }
}

/// Block devices without partitions that are not removable.
fn osd_devices(server: &Server) -> Vec<Value> {
    let devices = server
        .facts
        .pointer("/ansible_facts/ansible_devices")
        .or_else(|| server.facts.pointer("/ansible_devices"))
        .and_then(Value::as_object);
    let Some(devices) = devices else {
        return Vec::new();
    };

    let mut names: Vec<&String> = devices
        .iter()
        .filter(|(_, device)| {
            let partitioned = device
                .get("partitions")
                .and_then(Value::as_object)
                .map_or(false, |p| !p.is_empty());
            let removable = device.get("removable").and_then(Value::as_str) == Some("1");
            !partitioned && !removable
        })
        .map(|(name, _)| name)
        .collect();
    names.sort();
    names
        .into_iter()
        .map(|name| json!(format!("/dev/{name}")))
        .collect()
}

impl CephPlaybook for ClusterDeploy {
    fn hints(&self) -> Hints {
        Hints::new(vec![
            Hint::boolean("dmcrypt", "Encrypt OSD data with dm-crypt", false),
            Hint::integer("mon_count", "Number of monitors to deploy", self.mon_count),
            Hint::boolean("rgw", "Run rados gateways on the monitors", false),
        ])
    }

    fn make_inventory(
        &self,
        _cluster: &Cluster,
        servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<Value> {
        let servers = sorted(servers);
        let mon_count = self.mon_count(hints)?.min(servers.len());
        let mons = &servers[..mon_count];

        let mut inventory = Map::new();
        inventory.insert("mons".into(), hosts(mons));
        inventory.insert("osds".into(), hosts(&servers));
        if hints.get("rgw").and_then(Value::as_bool).unwrap_or(false) {
            inventory.insert("rgws".into(), hosts(mons));
        }
        inventory.insert(
            "_meta".into(),
            host_vars(&servers, |server, vars| {
                vars.insert("devices".into(), Value::Array(osd_devices(server)));
            }),
        );
        Ok(Value::Object(inventory))
    }

    fn extend_global_vars(
        &self,
        vars: &mut GlobalVars,
        _cluster: &Cluster,
        _servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<()> {
        let dmcrypt = hints.get("dmcrypt").and_then(Value::as_bool).unwrap_or(false);
        vars.insert("journal_collocation".into(), json!(!dmcrypt));
        vars.insert("dmcrypt_journal_collocation".into(), json!(dmcrypt));
        Ok(())
    }
}
