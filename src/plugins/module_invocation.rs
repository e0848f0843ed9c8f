//! Plugins that invoke a single Ansible module.

use std::sync::Arc;

use super::{Plugin, PluginContext, PluginDescriptor};
use crate::error::Result;
use crate::models::{GlobalVars, Task};
use crate::process::{jsonify, ProcessCommand};

/// Which module to run and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Remote module name
    pub module: String,
    /// Pass `--one-line`
    pub one_line: bool,
    /// Pass `--become`
    pub r#become: bool,
}

impl ModuleSpec {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            one_line: true,
            r#become: true,
        }
    }

    pub fn with_one_line(mut self, one_line: bool) -> Self {
        self.one_line = one_line;
        self
    }

    pub fn with_become(mut self, r#become: bool) -> Self {
        self.r#become = r#become;
        self
    }
}

/// Plugin specific parts of a module invocation.
pub trait ModuleHandler: Send {
    /// Arguments for the module, passed as `--extra-vars`.
    fn extra_vars(&self, task: &Task) -> Result<GlobalVars> {
        let _ = task;
        Ok(GlobalVars::new())
    }

    /// Hosts to run the module against.
    fn dynamic_inventory(&self, context: &PluginContext) -> Result<Option<serde_json::Value>>;
}

/// A [`Plugin`] running one module through the `ansible` program.
pub struct ModuleInvocationPlugin<H> {
    descriptor: PluginDescriptor,
    spec: ModuleSpec,
    context: PluginContext,
    config: Arc<serde_yaml::Value>,
    handler: H,
}

impl<H: ModuleHandler> ModuleInvocationPlugin<H> {
    /// Creates the plugin; fails if its static configuration cannot be loaded.
    pub fn new(
        descriptor: PluginDescriptor,
        spec: ModuleSpec,
        context: PluginContext,
        handler: H,
    ) -> Result<Self> {
        let config = context.load_config(&descriptor)?;
        Ok(Self {
            descriptor,
            spec,
            context,
            config,
            handler,
        })
    }

    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: ModuleHandler> Plugin for ModuleInvocationPlugin<H> {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn config(&self) -> &serde_yaml::Value {
        &self.config
    }

    fn get_extra_vars(&self, task: &Task) -> Result<GlobalVars> {
        self.handler.extra_vars(task)
    }

    fn compose_command(&mut self, task: &Task) -> Result<ProcessCommand> {
        let mut cmd = ProcessCommand::ansible(
            &self.context.settings.ansible,
            &self.descriptor.entry_point,
            &task.model_id,
            &self.spec.module,
        );

        if self.spec.one_line {
            cmd.set_flag("--one-line");
        }
        if self.spec.r#become {
            cmd.set_flag("--become");
        }

        let extra = self.get_extra_vars(task)?;
        if !extra.is_empty() {
            cmd.set_option("--extra-vars", jsonify(&extra)?);
        }

        Ok(cmd)
    }

    fn get_dynamic_inventory(&self) -> Result<Option<serde_json::Value>> {
        self.handler.dynamic_inventory(&self.context)
    }
}
