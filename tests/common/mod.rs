//! Shared test utilities and fixtures for the CephLCM test suite.
//!
//! This module provides:
//! - A fake executor that records commands and replays canned output
//! - A recording plugin that can fail at any lifecycle stage
//! - A fixture with plugin resource directories and an in-memory store
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use tempfile::TempDir;

use cephlcm::config::Settings;
use cephlcm::error::{Error, Result};
use cephlcm::models::{
    Cluster, Execution, PlaybookConfiguration, Server, Task,
};
use cephlcm::network::NetworkTopology;
use cephlcm::plugins::{
    ConfigRegistry, ExecutionRun, Plugin, PluginContext, PluginDescriptor, TaskBinding,
};
use cephlcm::process::{Executor, ProcessCommand, RunningProcess};
use cephlcm::store::{MemoryStore, Store};

// ============================================================================
// Static Configuration
// ============================================================================

/// Ceph plugin configuration used by the fixtures.
pub const CEPH_CONFIG: &str = r#"
install:
  source: stable
  release: jewel
  repo: http://mirror.example.com/ceph
copy_admin_key: true
radosgw:
  port: 8080
  num_threads: 100
  usage:
    log: true
    log_tick_interval: 30
    log_flush_threshold: 1024
    max_shards: 32
    user_shards: 1
  static_website: false
  dns_s3website_name: ""
os:
  kernel:
    pid_max: 4194303
mon_count: 3
"#;

// ============================================================================
// Fake Executor
// ============================================================================

/// Records spawned commands instead of running them.
#[derive(Default)]
pub struct FakeExecutor {
    commands: Mutex<Vec<ProcessCommand>>,
    output: Mutex<Vec<u8>>,
    fail_spawn: AtomicBool,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output every later process "prints".
    pub fn set_output(&self, output: &[u8]) {
        *self.output.lock() = output.to_vec();
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<ProcessCommand> {
        self.commands.lock().clone()
    }
}

impl Executor for FakeExecutor {
    fn spawn(&self, command: &ProcessCommand) -> Result<RunningProcess> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(Error::Internal(format!("cannot spawn {}", command.program)));
        }
        self.commands.lock().push(command.clone());

        let mut output = tempfile::tempfile()?;
        output.write_all(&self.output.lock())?;
        Ok(RunningProcess::finished(command.program.clone(), output))
    }
}

// ============================================================================
// Test Store
// ============================================================================

/// In-memory store whose execution logs can be made unavailable.
#[derive(Default)]
pub struct TestStore {
    inner: MemoryStore,
    fail_logs: AtomicBool,
}

impl TestStore {
    /// Makes every later `open_execution_log` call fail.
    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_logs.store(fail, Ordering::SeqCst);
    }
}

impl Store for TestStore {
    fn find_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        self.inner.find_cluster(id)
    }

    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.inner.save_cluster(cluster)
    }

    fn find_server(&self, id: &str) -> Result<Option<Server>> {
        self.inner.find_server(id)
    }

    fn save_server(&self, server: &Server) -> Result<()> {
        self.inner.save_server(server)
    }

    fn find_task(&self, id: &str) -> Result<Option<Task>> {
        self.inner.find_task(id)
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        self.inner.save_task(task)
    }

    fn find_execution(&self, id: &str) -> Result<Option<Execution>> {
        self.inner.find_execution(id)
    }

    fn save_execution(&self, execution: &Execution) -> Result<()> {
        self.inner.save_execution(execution)
    }

    fn find_playbook_configuration(&self, id: &str) -> Result<Option<PlaybookConfiguration>> {
        self.inner.find_playbook_configuration(id)
    }

    fn save_playbook_configuration(&self, config: &PlaybookConfiguration) -> Result<()> {
        self.inner.save_playbook_configuration(config)
    }

    fn open_execution_log(&self, execution: &Execution) -> Result<Box<dyn Write + Send>> {
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(Error::Persistence(format!(
                "log of execution {} is unavailable",
                execution.model_id
            )));
        }
        self.inner.open_execution_log(execution)
    }

    fn read_execution_log(&self, execution_id: &str) -> Result<Vec<u8>> {
        self.inner.read_execution_log(execution_id)
    }
}

// ============================================================================
// Fixed Topology
// ============================================================================

/// Topology answering the same network for any server set.
pub struct FixedTopology(pub &'static str);

impl NetworkTopology for FixedTopology {
    fn public_network(&self, _servers: &[Server]) -> Result<IpNetwork> {
        self.0
            .parse()
            .map_err(|_| Error::Internal(format!("bad network {}", self.0)))
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// Plugin resource tree, settings and collaborators for one test.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Arc<Settings>,
    pub configs: Arc<ConfigRegistry>,
    pub store: Arc<TestStore>,
    pub executor: Arc<FakeExecutor>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut settings = Settings::default();
        settings.paths.plugins_dir = dir.path().join("plugins");
        settings.paths.resources_dir = dir.path().join("resources");
        settings.paths.store_dir = dir.path().join("store");
        settings.ansible.inventory_script = PathBuf::from("/usr/bin/cephlcm-inventory");

        let fixture = Self {
            dir,
            settings: Arc::new(settings),
            configs: Arc::new(ConfigRegistry::new()),
            store: Arc::new(TestStore::default()),
            executor: Arc::new(FakeExecutor::new()),
        };
        fixture.write_plugin("cluster_deploy", CEPH_CONFIG);
        fixture.write_plugin("purge_cluster", CEPH_CONFIG);
        fixture.write_plugin("server_discovery", "");
        fixture.write_plugin("recording", "retries: 3\n");
        fixture
    }

    /// Creates a plugin resource directory with a config and a playbook.
    pub fn write_plugin(&self, module: &str, config: &str) -> PathBuf {
        let path = self.settings.plugin_dir(module);
        std::fs::create_dir_all(&path).expect("plugin dir");
        std::fs::write(path.join("config.yaml"), config).expect("config");
        std::fs::write(path.join("playbook.yaml"), "- hosts: all\n").expect("playbook");
        path
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.settings.paths.plugins_dir
    }

    /// Unbound plugin context.
    pub fn context(&self) -> PluginContext {
        PluginContext::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.configs),
            self.store.clone(),
            self.executor.clone(),
            Arc::new(FixedTopology("10.0.0.0/24")),
        )
    }

    /// Plugin context bound to a task.
    pub fn bound(&self, task_id: &str) -> PluginContext {
        self.context().with_binding(TaskBinding::task(task_id))
    }
}

// ============================================================================
// Records
// ============================================================================

pub fn cluster(deployed: bool) -> Cluster {
    Cluster::new("c1", "ceph").with_state(deployed)
}

/// Servers `s1..=n`, all in cluster `c1`.
pub fn servers(n: usize) -> Vec<Server> {
    (1..=n)
        .map(|i| {
            Server::new(format!("s{i}"))
                .in_cluster("c1")
                .with_ip(format!("10.0.0.{i}"))
        })
        .collect()
}

// ============================================================================
// Recording Plugin
// ============================================================================

/// Lifecycle stage a [`RecordingPlugin`] fails in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nothing,
    PreExecute,
    Compose,
    PostExecute,
    PanicInPreExecute,
    PanicInCompose,
}

/// Everything a [`RecordingPlugin`] saw.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub events: Vec<String>,
    /// Error message passed to each `on_post_execute` call
    pub post_errors: Vec<Option<String>>,
    /// Whether the command existed when `on_post_execute` ran
    pub post_had_command: Vec<bool>,
}

pub struct RecordingPlugin {
    descriptor: PluginDescriptor,
    context: PluginContext,
    config: Arc<serde_yaml::Value>,
    fail_at: FailAt,
    pub calls: Arc<Mutex<Calls>>,
}

impl RecordingPlugin {
    pub fn new(context: PluginContext, fail_at: FailAt) -> Result<Self> {
        let descriptor = PluginDescriptor::new("recording", "recording");
        let config = context.load_config(&descriptor)?;
        Ok(Self {
            descriptor,
            context,
            config,
            fail_at,
            calls: Arc::new(Mutex::new(Calls::default())),
        })
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().clone()
    }

    fn record(&self, event: &str) {
        self.calls.lock().events.push(event.to_string());
    }
}

impl Plugin for RecordingPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn config(&self) -> &serde_yaml::Value {
        &self.config
    }

    fn on_pre_execute(&mut self, _task: &Task) -> Result<()> {
        self.record("pre");
        if self.fail_at == FailAt::PreExecute {
            return Err(Error::Internal("pre failed".into()));
        }
        if self.fail_at == FailAt::PanicInPreExecute {
            panic!("pre exploded");
        }
        Ok(())
    }

    fn on_post_execute(
        &mut self,
        _task: &Task,
        run: &mut ExecutionRun,
        error: Option<&Error>,
    ) -> Result<()> {
        self.record("post");
        {
            let mut calls = self.calls.lock();
            calls.post_errors.push(error.map(ToString::to_string));
            calls.post_had_command.push(run.command().is_some());
        }
        if self.fail_at == FailAt::PostExecute {
            return Err(Error::Internal("post failed".into()));
        }
        Ok(())
    }

    fn compose_command(&mut self, task: &Task) -> Result<ProcessCommand> {
        self.record("compose");
        if self.fail_at == FailAt::Compose {
            return Err(Error::Internal("compose failed".into()));
        }
        if self.fail_at == FailAt::PanicInCompose {
            panic!("compose exploded");
        }
        let mut cmd = ProcessCommand::new("true");
        cmd.args.push(task.model_id.clone());
        Ok(cmd)
    }

    fn get_dynamic_inventory(&self) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}
