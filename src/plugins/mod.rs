//! Plugin System for CephLCM
//!
//! A plugin turns "run this operation against this cluster" into a concrete,
//! policy-checked, logged Ansible invocation. Plugins come in two flavours:
//!
//! ## Module Invocation Plugins
//!
//! Run a single Ansible module against the inventory hosts
//! (see [`module_invocation`]).
//!
//! ## Playbook Plugins
//!
//! Run a whole playbook. They first build a [`RunConfiguration`] (inventory
//! plus global variables) which is persisted and later consumed by the run
//! (see [`playbook`] and, for Ceph playbooks, [`ceph`]).
//!
//! # Execution Protocol
//!
//! [`PluginExt::execute`] drives every run the same way:
//!
//! 1. `on_pre_execute` runs; `compose_command` runs afterwards even if the
//!    pre-run hook failed, so the command is always available for logging.
//! 2. The composed command line is logged and handed to the executor.
//! 3. The caller's body runs with the spawned process.
//! 4. `on_post_execute` runs exactly once with the failure, if any. When both
//!    the run and the post-run hook fail, the run's error is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use cephlcm::plugins::{PluginExt, PluginRegistry};
//!
//! let registry = PluginRegistry::builtin();
//! let mut plugin = registry.create("cluster_deploy", context)?;
//! plugin.execute(&task, |process| process.wait())?;
//! ```

pub mod builtin;
pub mod ceph;
pub mod config_registry;
pub mod module_invocation;
pub mod playbook;
pub mod registry;

pub use ceph::{CephAnsible, CephConfig, CephPlaybook, CephVariableBuilder};
pub use config_registry::ConfigRegistry;
pub use module_invocation::{ModuleHandler, ModuleInvocationPlugin, ModuleSpec};
pub use playbook::{PlaybookHandler, PlaybookPlugin};
pub use registry::{PluginFactory, PluginRegistry};

use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::hints::RawHint;
use crate::models::{
    new_model_id, Cluster, GlobalVars, PlaybookConfiguration, RunConfiguration, Server, Task,
};
use crate::network::NetworkTopology;
use crate::policy::ServerListPolicy;
use crate::process::{Executor, ProcessCommand, RunningProcess, ENV_ENTRY_POINT, ENV_TASK_ID};
use crate::store::Store;

// ============================================================================
// Descriptor
// ============================================================================

/// Static, per-plugin-type declaration. Never changes per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    /// Entry point the plugin is registered under
    pub entry_point: String,

    /// Display name
    pub name: String,

    /// Human readable description
    pub description: String,

    /// Whether the plugin is listed to API users
    pub public: bool,

    /// Resource namespace: the plugin's directory under `paths.plugins_dir`
    pub module: String,

    /// Playbook file inside the resource directory
    pub playbook_filename: String,

    /// Static configuration file inside the resource directory
    pub config_filename: String,

    /// Whether a run needs an explicit server list
    pub require_server_list: bool,

    /// Required relationship between servers and the cluster
    pub server_list_policy: ServerListPolicy,

    /// Whether the cluster must already be deployed
    pub cluster_must_be_deployed: bool,

    /// Whether to run with `--become`
    pub r#become: bool,
}

impl PluginDescriptor {
    /// Descriptor with the framework defaults.
    pub fn new(entry_point: impl Into<String>, module: impl Into<String>) -> Self {
        let entry_point = entry_point.into();
        Self {
            name: entry_point.clone(),
            entry_point,
            description: String::new(),
            public: true,
            module: module.into(),
            playbook_filename: "playbook.yaml".to_string(),
            config_filename: "config.yaml".to_string(),
            require_server_list: true,
            server_list_policy: ServerListPolicy::AnyServer,
            cluster_must_be_deployed: true,
            r#become: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_playbook_filename(mut self, filename: impl Into<String>) -> Self {
        self.playbook_filename = filename.into();
        self
    }

    pub fn with_config_filename(mut self, filename: impl Into<String>) -> Self {
        self.config_filename = filename.into();
        self
    }

    pub fn with_server_list(mut self, required: bool, policy: ServerListPolicy) -> Self {
        self.require_server_list = required;
        self.server_list_policy = policy;
        self
    }

    pub fn with_cluster_must_be_deployed(mut self, required: bool) -> Self {
        self.cluster_must_be_deployed = required;
        self
    }

    pub fn with_become(mut self, r#become: bool) -> Self {
        self.r#become = r#become;
        self
    }
}

// ============================================================================
// Context
// ============================================================================

/// Task and entry point a plugin instance is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBinding {
    pub task_id: Option<String>,
    pub entry_point: Option<String>,
}

impl TaskBinding {
    /// Reads `CEPHLCM_TASK_ID` / `CEPHLCM_ENTRY_POINT`.
    pub fn from_env() -> Self {
        Self {
            task_id: non_empty_env(ENV_TASK_ID),
            entry_point: non_empty_env(ENV_ENTRY_POINT),
        }
    }

    pub fn task(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            entry_point: None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Process-wide collaborators handed to every plugin instance.
#[derive(Clone)]
pub struct PluginContext {
    pub settings: Arc<Settings>,
    pub configs: Arc<ConfigRegistry>,
    pub store: Arc<dyn Store>,
    pub executor: Arc<dyn Executor>,
    pub topology: Arc<dyn NetworkTopology>,
    pub binding: TaskBinding,
}

impl PluginContext {
    pub fn new(
        settings: Arc<Settings>,
        configs: Arc<ConfigRegistry>,
        store: Arc<dyn Store>,
        executor: Arc<dyn Executor>,
        topology: Arc<dyn NetworkTopology>,
    ) -> Self {
        Self {
            settings,
            configs,
            store,
            executor,
            topology,
            binding: TaskBinding::default(),
        }
    }

    /// Same collaborators, bound to another task.
    pub fn with_binding(mut self, binding: TaskBinding) -> Self {
        self.binding = binding;
        self
    }

    /// Path of a file inside a plugin's resource directory.
    pub fn plugin_file(&self, descriptor: &PluginDescriptor, filename: &str) -> PathBuf {
        self.settings.plugin_dir(&descriptor.module).join(filename)
    }

    /// Loads the descriptor's static configuration through the registry.
    pub fn load_config(&self, descriptor: &PluginDescriptor) -> Result<Arc<serde_yaml::Value>> {
        self.configs
            .load(&self.plugin_file(descriptor, &descriptor.config_filename))
    }

    /// The task this context is bound to, if any.
    pub fn bound_task(&self) -> Result<Option<Task>> {
        let Some(task_id) = self.binding.task_id.as_deref() else {
            return Ok(None);
        };
        self.store
            .find_task(task_id)?
            .map(Some)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("settings", &self.settings)
            .field("configs", &self.configs)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Plugin Trait
// ============================================================================

/// State of one `execute` call, handed to the post-run hook.
#[derive(Default)]
pub struct ExecutionRun {
    command: Option<ProcessCommand>,
    process: Option<RunningProcess>,
    panic: Option<Box<dyn Any + Send>>,
}

impl ExecutionRun {
    /// The composed command, if composition succeeded.
    pub fn command(&self) -> Option<&ProcessCommand> {
        self.command.as_ref()
    }

    /// The spawned process, if the executor started one.
    pub fn process_mut(&mut self) -> Option<&mut RunningProcess> {
        self.process.as_mut()
    }

    /// Drops the process handle and its captured output.
    pub fn close_output(&mut self) {
        self.process = None;
    }

    /// Keeps the first panic payload for resuming and turns it into an error.
    fn record_panic(&mut self, entry_point: &str, payload: Box<dyn Any + Send>) -> Error {
        let message = panic_message(payload.as_ref());
        if self.panic.is_none() {
            self.panic = Some(payload);
        }
        Error::Internal(format!("run of {entry_point} panicked: {message}"))
    }
}

/// Lifecycle contract shared by all plugins.
///
/// Implementors provide the hooks; the run itself is driven by
/// [`PluginExt::execute`], which cannot be overridden.
pub trait Plugin: Send {
    /// Static declaration of the plugin.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Collaborators this instance was created with.
    fn context(&self) -> &PluginContext;

    /// Static configuration, loaded once at construction.
    fn config(&self) -> &serde_yaml::Value;

    /// Variables passed as `--extra-vars`.
    fn get_extra_vars(&self, task: &Task) -> Result<GlobalVars> {
        let _ = task;
        Ok(GlobalVars::new())
    }

    fn on_pre_execute(&mut self, task: &Task) -> Result<()> {
        let _ = task;
        Ok(())
    }

    /// Runs once per `execute`, with the run's failure if there was one.
    fn on_post_execute(
        &mut self,
        task: &Task,
        run: &mut ExecutionRun,
        error: Option<&Error>,
    ) -> Result<()> {
        let _ = (task, run, error);
        Ok(())
    }

    /// Builds the command for `task`. Performs no I/O besides lookups.
    fn compose_command(&mut self, task: &Task) -> Result<ProcessCommand>;

    /// Target host topology for the bound task.
    fn get_dynamic_inventory(&self) -> Result<Option<serde_json::Value>>;

    /// Builds the configuration a later run consumes.
    fn build_configuration(
        &self,
        cluster: &Cluster,
        servers: &[Server],
        hints: &[RawHint],
    ) -> Result<RunConfiguration> {
        let _ = (cluster, servers, hints);
        Err(Error::unsupported(
            &self.descriptor().entry_point,
            "building playbook configurations",
        ))
    }
}

/// The fixed execution protocol, available on every [`Plugin`].
pub trait PluginExt: Plugin {
    /// Runs the plugin for `task`, calling `body` with the spawned process.
    ///
    /// `on_post_execute` is called exactly once, whatever fails. A panic in
    /// the pre-run hook, in composition or in `body` is reported to the hook
    /// as an internal error and resumed afterwards.
    fn execute<T, F>(&mut self, task: &Task, body: F) -> Result<T>
    where
        F: FnOnce(&mut RunningProcess) -> Result<T>;
}

impl<P: Plugin + ?Sized> PluginExt for P {
    fn execute<T, F>(&mut self, task: &Task, body: F) -> Result<T>
    where
        F: FnOnce(&mut RunningProcess) -> Result<T>,
    {
        let entry_point = self.descriptor().entry_point.clone();
        let mut run = ExecutionRun::default();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            run_steps(&mut *self, task, &mut run, body)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => Err(run.record_panic(&entry_point, payload)),
        };

        info!("Execute post-run step for {}", entry_point);
        let post = self.on_post_execute(task, &mut run, outcome.as_ref().err());
        info!("Finish execution of post-run step for {}", entry_point);

        let result = match (outcome, post) {
            (Ok(value), Ok(())) => {
                if let Some(command) = run.command() {
                    info!("Finish execute {:?} for {}", command.commandline(), entry_point);
                }
                Ok(value)
            }
            (Ok(_), Err(post_err)) => Err(post_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(post_err)) => {
                error!("Post-run step of {} failed: {}", entry_point, post_err);
                Err(err)
            }
        };

        if let Some(payload) = run.panic.take() {
            panic::resume_unwind(payload);
        }
        result
    }
}

fn run_steps<P, T, F>(plugin: &mut P, task: &Task, run: &mut ExecutionRun, body: F) -> Result<T>
where
    P: Plugin + ?Sized,
    F: FnOnce(&mut RunningProcess) -> Result<T>,
{
    let entry_point = plugin.descriptor().entry_point.clone();

    info!("Execute pre-run step for {}", entry_point);
    // A panicking pre-run hook must not keep the command from being composed.
    let pre = match panic::catch_unwind(AssertUnwindSafe(|| plugin.on_pre_execute(task))) {
        Ok(pre) => pre,
        Err(payload) => Err(run.record_panic(&entry_point, payload)),
    };
    let composed = plugin.compose_command(task);
    info!("Finish execution of pre-run step for {}", entry_point);

    let command = match (pre, composed) {
        (Ok(()), Ok(command)) => command,
        (Ok(()), Err(err)) => return Err(err),
        (Err(err), Ok(command)) => {
            run.command = Some(command);
            return Err(err);
        }
        (Err(err), Err(compose_err)) => {
            warn!("Cannot compose command for {}: {}", entry_point, compose_err);
            return Err(err);
        }
    };

    info!("Execute {:?} for {}", command.commandline(), entry_point);
    debug!("Commandline: \"{}\"", command.printable_commandline());

    let executor = Arc::clone(&plugin.context().executor);
    let spawned = executor.spawn(&command);
    run.command = Some(command);
    let process = run.process.insert(spawned?);

    body(process)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Builds a run configuration with `plugin` and persists it.
pub fn create_playbook_configuration(
    plugin: &dyn Plugin,
    name: &str,
    cluster: &Cluster,
    servers: &[Server],
    hints: &[RawHint],
) -> Result<PlaybookConfiguration> {
    let configuration = plugin.build_configuration(cluster, servers, hints)?;
    let record = PlaybookConfiguration {
        model_id: new_model_id(),
        name: name.to_string(),
        playbook_id: plugin.descriptor().entry_point.clone(),
        cluster_id: cluster.model_id.clone(),
        configuration,
    };
    plugin.context().store.save_playbook_configuration(&record)?;
    info!(
        "Created playbook configuration {} for {}",
        record.model_id, record.playbook_id
    );
    Ok(record)
}
