//! Ceph playbook plugins.
//!
//! Every Ceph playbook shares the same set of global variables, computed by
//! [`CephVariableBuilder`] from the plugin's static configuration, the
//! cluster and the servers. Individual plugins supply their inventory and
//! any extra variables through [`CephPlaybook`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::playbook::PlaybookHandler;
use super::PluginContext;
use crate::error::{Error, Result};
use crate::hints::{Hints, ResolvedHints};
use crate::models::{Cluster, GlobalVars, Server, Task};
use crate::network::NetworkTopology;

/// Install source that requires an explicit release.
const STABLE_SOURCE: &str = "stable";

// ============================================================================
// Static Configuration
// ============================================================================

/// Static configuration shared by Ceph playbook plugins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CephConfig {
    /// Where packages come from
    pub install: InstallConfig,

    /// Copy the admin keyring to every node
    #[serde(default)]
    pub copy_admin_key: bool,

    /// Rados gateway tuning
    pub radosgw: RadosgwConfig,

    /// Kernel tuning parameters, `{family: {param: value}}`
    #[serde(default)]
    pub os: IndexMap<String, IndexMap<String, Value>>,

    /// Open file limit for Ceph daemons
    #[serde(default)]
    pub max_open_files: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    pub source: String,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub distro_source: Option<String>,
    #[serde(default)]
    pub keyserver: Option<String>,
    #[serde(default)]
    pub repo_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadosgwConfig {
    pub port: Value,
    pub num_threads: Value,
    pub usage: RadosgwUsageConfig,
    pub static_website: Value,
    pub dns_s3website_name: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadosgwUsageConfig {
    pub log: Value,
    pub log_tick_interval: Value,
    pub log_flush_threshold: Value,
    pub max_shards: Value,
    pub user_shards: Value,
}

impl CephConfig {
    /// Parses and checks a plugin's static configuration.
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self> {
        let config: CephConfig = serde_yaml::from_value(value.clone())?;
        if config.install.source.is_empty() {
            return Err(Error::Internal("install.source must not be empty".into()));
        }
        if config.install.source == STABLE_SOURCE && non_empty(&config.install.release).is_none() {
            return Err(Error::Internal(
                "install.release is required for stable installs".into(),
            ));
        }
        Ok(config)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ============================================================================
// Variable Builder
// ============================================================================

/// Computes the global variables of a Ceph playbook run.
///
/// The result only depends on the configuration, the cluster, the servers
/// and the topology's answer; building twice gives identical maps.
#[derive(Debug, Clone)]
pub struct CephVariableBuilder {
    config: CephConfig,
    facts_template: PathBuf,
}

impl CephVariableBuilder {
    pub fn new(config: CephConfig, facts_template: impl Into<PathBuf>) -> Self {
        Self {
            config,
            facts_template: facts_template.into(),
        }
    }

    pub fn config(&self) -> &CephConfig {
        &self.config
    }

    pub fn build(
        &self,
        topology: &dyn NetworkTopology,
        cluster: &Cluster,
        servers: &[Server],
    ) -> Result<GlobalVars> {
        let install = &self.config.install;
        let public_network = topology.public_network(servers)?.to_string();

        let mut vars = GlobalVars::new();
        vars.insert(format!("ceph_{}", install.source), json!(true));
        vars.insert("fsid".into(), json!(cluster.model_id));
        vars.insert("cluster".into(), json!(cluster.name));
        vars.insert("copy_admin_key".into(), json!(self.config.copy_admin_key));
        vars.insert("public_network".into(), json!(public_network));
        vars.insert("os_tuning_params".into(), json!([]));
        vars.insert("nfs_file_gw".into(), json!(false));
        vars.insert("nfs_obj_gw".into(), json!(false));

        if install.source == STABLE_SOURCE {
            vars.insert("ceph_stable_release".into(), json!(install.release));
        }
        if let Some(repo) = non_empty(&install.repo) {
            vars.insert("ceph_stable_repo".into(), json!(repo));
        }
        if let Some(distro_source) = non_empty(&install.distro_source) {
            vars.insert("ceph_stable_distro_source".into(), json!(distro_source));
            // Keeps ceph-ansible from falling back to the distribution repo.
            vars.insert("ceph_stable_release_uca".into(), json!(distro_source));
        }
        if let Some(keyserver) = non_empty(&install.keyserver) {
            vars.insert("ceph_stable_repo_keyserver".into(), json!(keyserver));
        }
        if let Some(repo_key) = non_empty(&install.repo_key) {
            vars.insert("ceph_stable_repo_key".into(), json!(repo_key));
        }

        // Ceph does not converge with a separate cluster network, so the
        // cluster network is always the public one.
        vars.insert("cluster_network".into(), json!(public_network));

        let radosgw = &self.config.radosgw;
        vars.insert("radosgw_civetweb_port".into(), radosgw.port.clone());
        vars.insert(
            "radosgw_civetweb_num_threads".into(),
            radosgw.num_threads.clone(),
        );
        vars.insert("radosgw_usage_log".into(), radosgw.usage.log.clone());
        vars.insert(
            "radosgw_usage_log_tick_interval".into(),
            radosgw.usage.log_tick_interval.clone(),
        );
        vars.insert(
            "radosgw_usage_log_flush_threshold".into(),
            radosgw.usage.log_flush_threshold.clone(),
        );
        vars.insert(
            "radosgw_usage_max_shards".into(),
            radosgw.usage.max_shards.clone(),
        );
        vars.insert(
            "radosgw_usage_max_user_shards".into(),
            radosgw.usage.user_shards.clone(),
        );
        vars.insert(
            "radosgw_static_website".into(),
            radosgw.static_website.clone(),
        );
        vars.insert(
            "radosgw_dns_s3website_name".into(),
            radosgw.dns_s3website_name.clone(),
        );
        vars.insert(
            "ceph_facts_template".into(),
            json!(self.facts_template.display().to_string()),
        );

        vars.insert("os_tuning_params".into(), Value::Array(self.os_tuning_params()));

        if let Some(max_open_files) = &self.config.max_open_files {
            vars.insert("max_open_files".into(), max_open_files.clone());
        }

        Ok(vars)
    }

    fn os_tuning_params(&self) -> Vec<Value> {
        self.config
            .os
            .iter()
            .flat_map(|(family, params)| {
                params.iter().map(move |(param, value)| {
                    json!({
                        "name": format!("{family}.{param}"),
                        "value": value,
                    })
                })
            })
            .collect()
    }
}

// ============================================================================
// Playbook Handler
// ============================================================================

/// Per-plugin parts of a Ceph playbook.
pub trait CephPlaybook: Send {
    fn hints(&self) -> Hints {
        Hints::default()
    }

    /// Inventory for the run.
    fn make_inventory(
        &self,
        cluster: &Cluster,
        servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<Value>;

    /// Adds plugin specific variables to the shared Ceph ones.
    fn extend_global_vars(
        &self,
        vars: &mut GlobalVars,
        cluster: &Cluster,
        servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<()> {
        let _ = (vars, cluster, servers, hints);
        Ok(())
    }
}

/// [`PlaybookHandler`] shared by Ceph playbooks.
///
/// Owns a scratch directory for files fetched from the nodes during a run.
/// It is created before the run and removed after it, whatever the outcome.
pub struct CephAnsible<D> {
    builder: CephVariableBuilder,
    playbook: D,
    fetch_dir: Option<TempDir>,
}

impl<D: CephPlaybook> CephAnsible<D> {
    pub fn new(builder: CephVariableBuilder, playbook: D) -> Self {
        Self {
            builder,
            playbook,
            fetch_dir: None,
        }
    }

    /// Builds the handler from a plugin's static configuration.
    pub fn from_config(
        context: &PluginContext,
        config: &serde_yaml::Value,
        playbook: D,
    ) -> Result<Self> {
        let config = CephConfig::from_value(config)?;
        let facts_template = context
            .settings
            .resource(&["facts", "ceph_facts_module.py.j2"]);
        Ok(Self::new(
            CephVariableBuilder::new(config, facts_template),
            playbook,
        ))
    }

    pub fn builder(&self) -> &CephVariableBuilder {
        &self.builder
    }

    pub fn playbook(&self) -> &D {
        &self.playbook
    }

    /// Scratch directory of the current run.
    pub fn fetch_dir(&self) -> Option<&std::path::Path> {
        self.fetch_dir.as_ref().map(TempDir::path)
    }
}

impl<D: CephPlaybook> PlaybookHandler for CephAnsible<D> {
    fn hints(&self) -> Hints {
        self.playbook.hints()
    }

    fn make_playbook_configuration(
        &self,
        context: &PluginContext,
        cluster: &Cluster,
        servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<(GlobalVars, Value)> {
        let mut vars = self.builder.build(context.topology.as_ref(), cluster, servers)?;
        self.playbook
            .extend_global_vars(&mut vars, cluster, servers, hints)?;
        let inventory = self.playbook.make_inventory(cluster, servers, hints)?;
        Ok((vars, inventory))
    }

    fn on_pre_execute(&mut self, task: &Task) -> Result<()> {
        let dir = tempfile::Builder::new().prefix("cephlcm-fetch-").tempdir()?;
        debug!(
            "Fetch directory of task {} is {}",
            task.model_id,
            dir.path().display()
        );
        self.fetch_dir = Some(dir);
        Ok(())
    }

    fn on_post_execute(&mut self, task: &Task, error: Option<&Error>) -> Result<()> {
        let _ = error;
        if let Some(dir) = self.fetch_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(
                    "Cannot remove fetch directory {} of task {}: {}",
                    path.display(),
                    task.model_id,
                    e
                );
            }
        }
        Ok(())
    }

    fn extend_extra_vars(&self, task: &Task, vars: &mut GlobalVars) -> Result<()> {
        let _ = task;
        if let Some(dir) = self.fetch_dir() {
            vars.insert(
                "fetch_directory".into(),
                json!(dir.display().to_string()),
            );
        }
        Ok(())
    }
}
