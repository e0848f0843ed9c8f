//! Run command: execute a plugin for a task.

use anyhow::{Context, Result};
use clap::Parser;

use super::{CommandContext, Runnable};
use cephlcm::error::{render_trace, Error};
use cephlcm::models::{new_model_id, Execution, Task};
use cephlcm::plugins::{PluginExt, TaskBinding};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Plugin entry point
    pub plugin: String,

    /// Existing task to run
    #[arg(long, conflicts_with_all = ["configuration", "data"])]
    pub task: Option<String>,

    /// Playbook configuration to execute (for a new task)
    #[arg(long)]
    pub configuration: Option<String>,

    /// Task data as JSON (for a new task)
    #[arg(long)]
    pub data: Option<String>,
}

impl RunArgs {
    /// Loads the requested task or creates a new one with its execution.
    fn prepare_task(&self, ctx: &mut CommandContext) -> Result<Task> {
        let store = ctx.store()?;
        if let Some(task_id) = &self.task {
            let task = store
                .find_task(task_id)?
                .ok_or_else(|| Error::TaskNotFound(task_id.clone()))?;
            return Ok(task);
        }

        let data = match &self.data {
            Some(data) => serde_json::from_str(data).context("Task data must be valid JSON")?,
            None => serde_json::Value::Null,
        };

        let mut execution = Execution::new(new_model_id());
        execution.playbook_configuration_id = self.configuration.clone();
        store.save_execution(&execution)?;

        let mut task = Task::new(new_model_id(), &execution.model_id).with_data(data);
        task.playbook_configuration_id = self.configuration.clone();
        store.save_task(&task)?;

        ctx.output.info(&format!(
            "Created task {} for execution {}",
            task.model_id, execution.model_id
        ));
        Ok(task)
    }
}

impl Runnable for RunArgs {
    fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let task = self.prepare_task(ctx)?;
        let store = ctx.store()?;
        let mut execution = store
            .find_execution(&task.execution_id)?
            .ok_or_else(|| Error::ExecutionNotFound(task.execution_id.clone()))?;

        let binding = TaskBinding {
            task_id: Some(task.model_id.clone()),
            entry_point: Some(self.plugin.clone()),
        };
        let context = ctx.plugin_context(binding)?;
        let mut plugin = ctx.registry.create(&self.plugin, context)?;

        ctx.output.banner(&format!("RUN {}", self.plugin.to_uppercase()));
        execution.start();
        store.save_execution(&execution)?;

        let result = plugin.execute(&task, |process| process.wait());

        execution.finish(result.is_ok());
        store.save_execution(&execution)?;

        match result {
            Ok(()) => {
                if ctx.output.is_json() {
                    ctx.output.json(&execution)?;
                } else {
                    ctx.output.success(&format!(
                        "Execution {} {}",
                        execution.model_id, execution.state
                    ));
                }
                Ok(0)
            }
            Err(err) => {
                ctx.output.error(render_trace(&err).trim_end());
                if ctx.output.is_json() {
                    ctx.output.json(&execution)?;
                }
                Ok(err.exit_code())
            }
        }
    }
}
