//! Plugins that run a whole playbook.
//!
//! A playbook run happens in two phases. [`PlaybookPlugin::build_configuration`]
//! checks the request and computes a [`RunConfiguration`], which the caller
//! persists. The run itself then reads that configuration back through the
//! task it is bound to: the global variables become `--extra-vars` and the
//! inventory is served to Ansible by the dynamic inventory script.
//!
//! After the run the captured output is appended to the execution log,
//! prefixed by the command line or, on failure, by the error trace.

use once_cell::sync::OnceCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{ExecutionRun, Plugin, PluginContext, PluginDescriptor};
use crate::error::{render_trace, Error, Result};
use crate::hints::{Hints, RawHint, ResolvedHints};
use crate::models::{Cluster, GlobalVars, PlaybookConfiguration, RunConfiguration, Server, Task};
use crate::process::{jsonify, ProcessCommand};

/// Widest banner written above the command line in execution logs.
const HEADER_MAX_WIDTH: usize = 80;

/// Domain specific parts of a playbook plugin.
pub trait PlaybookHandler: Send {
    /// Hints accepted by `build_configuration`. Empty means none.
    fn hints(&self) -> Hints {
        Hints::default()
    }

    /// Computes `(global_vars, inventory)` for a checked request.
    fn make_playbook_configuration(
        &self,
        context: &PluginContext,
        cluster: &Cluster,
        servers: &[Server],
        hints: &ResolvedHints,
    ) -> Result<(GlobalVars, serde_json::Value)>;

    fn on_pre_execute(&mut self, task: &Task) -> Result<()> {
        let _ = task;
        Ok(())
    }

    fn on_post_execute(&mut self, task: &Task, error: Option<&Error>) -> Result<()> {
        let _ = (task, error);
        Ok(())
    }

    /// Adds run-time variables on top of the persisted global variables.
    fn extend_extra_vars(&self, task: &Task, vars: &mut GlobalVars) -> Result<()> {
        let _ = (task, vars);
        Ok(())
    }
}

/// A [`Plugin`] running a playbook through `ansible-playbook`.
pub struct PlaybookPlugin<H> {
    descriptor: PluginDescriptor,
    context: PluginContext,
    config: Arc<serde_yaml::Value>,
    handler: H,
    bound: OnceCell<(String, PlaybookConfiguration)>,
}

impl<H: PlaybookHandler> PlaybookPlugin<H> {
    /// Loads the static configuration and builds the handler from it.
    pub fn new<F>(
        descriptor: PluginDescriptor,
        context: PluginContext,
        make_handler: F,
    ) -> Result<Self>
    where
        F: FnOnce(&serde_yaml::Value) -> Result<H>,
    {
        let config = context.load_config(&descriptor)?;
        let handler = make_handler(&config).map_err(|e| match e {
            Error::ConfigLoad { .. } => e,
            other => Error::config_load(
                context.plugin_file(&descriptor, &descriptor.config_filename),
                "invalid plugin configuration",
                Some(Box::new(other)),
            ),
        })?;
        Ok(Self {
            descriptor,
            context,
            config,
            handler,
            bound: OnceCell::new(),
        })
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Absolute path of the playbook resource.
    pub fn playbook_path(&self) -> PathBuf {
        self.context
            .plugin_file(&self.descriptor, &self.descriptor.playbook_filename)
    }

    /// The playbook configuration built for `task`, if any.
    ///
    /// The configuration of the bound task is looked up once and then kept
    /// for the lifetime of the plugin. Misses are not remembered.
    pub fn playbook_configuration(&self, task: &Task) -> Result<Option<PlaybookConfiguration>> {
        if let Some((task_id, config)) = self.bound.get() {
            if *task_id == task.model_id {
                return Ok(Some(config.clone()));
            }
        }

        let config = self.lookup_configuration(task)?;
        if let Some(config) = &config {
            if self.context.binding.task_id.as_deref() == Some(task.model_id.as_str()) {
                let _ = self.bound.set((task.model_id.clone(), config.clone()));
            }
        }
        Ok(config)
    }

    fn lookup_configuration(&self, task: &Task) -> Result<Option<PlaybookConfiguration>> {
        let store = &self.context.store;
        let config_id = match &task.playbook_configuration_id {
            Some(id) => Some(id.clone()),
            None => store
                .find_execution(&task.execution_id)?
                .and_then(|execution| execution.playbook_configuration_id),
        };
        match config_id {
            Some(id) => store.find_playbook_configuration(&id),
            None => Ok(None),
        }
    }

    fn save_log(&self, task: &Task, run: &mut ExecutionRun, error: Option<&Error>) -> Result<()> {
        let store = &self.context.store;
        let execution = store
            .find_execution(&task.execution_id)?
            .ok_or_else(|| Error::ExecutionNotFound(task.execution_id.clone()))?;

        let mut sink = store.open_execution_log(&execution)?;
        match error {
            Some(err) => sink.write_all(error_block(err).as_bytes())?,
            None => {
                if let Some(command) = run.command() {
                    sink.write_all(log_header(&command.printable_commandline()).as_bytes())?;
                }
            }
        }

        if let Some(process) = run.process_mut() {
            let copied = io::copy(process.rewound_output()?, &mut sink)?;
            debug!("Copied {} bytes of output into log of {}", copied, execution.model_id);
        }
        sink.flush()?;
        Ok(())
    }
}

impl<H: PlaybookHandler> Plugin for PlaybookPlugin<H> {
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
        let config = self
            .playbook_configuration(task)?
            .ok_or_else(|| Error::UnknownConfiguration {
                task: task.model_id.clone(),
            })?;
        let mut vars = config.configuration.global_vars;
        self.handler.extend_extra_vars(task, &mut vars)?;
        Ok(vars)
    }

    fn on_pre_execute(&mut self, task: &Task) -> Result<()> {
        self.handler.on_pre_execute(task)
    }

    fn on_post_execute(
        &mut self,
        task: &Task,
        run: &mut ExecutionRun,
        error: Option<&Error>,
    ) -> Result<()> {
        if let Err(log_err) = self.save_log(task, run, error) {
            error!(
                "Cannot save log of execution {}: {}",
                task.execution_id, log_err
            );
        }
        run.close_output();
        self.handler.on_post_execute(task, error)
    }

    fn compose_command(&mut self, task: &Task) -> Result<ProcessCommand> {
        let mut cmd = ProcessCommand::ansible_playbook(
            &self.context.settings.ansible,
            &self.descriptor.entry_point,
            &task.model_id,
        );
        cmd.set_flag("-vvv");
        if self.descriptor.r#become {
            cmd.set_flag("--become");
        }

        let extra = self.get_extra_vars(task)?;
        if !extra.is_empty() {
            cmd.set_option("--extra-vars", jsonify(&extra)?);
        }
        cmd.args.push(self.playbook_path().display().to_string());

        Ok(cmd)
    }

    fn get_dynamic_inventory(&self) -> Result<Option<serde_json::Value>> {
        let task = self
            .context
            .bound_task()?
            .ok_or_else(|| Error::UnknownConfiguration {
                task: String::new(),
            })?;
        let config = self
            .playbook_configuration(&task)?
            .ok_or_else(|| Error::UnknownConfiguration {
                task: task.model_id.clone(),
            })?;
        Ok(Some(config.configuration.inventory))
    }

    fn build_configuration(
        &self,
        cluster: &Cluster,
        servers: &[Server],
        hints: &[RawHint],
    ) -> Result<RunConfiguration> {
        if self.descriptor.require_server_list {
            self.descriptor.server_list_policy.check(cluster, servers)?;
        }

        let schema = self.handler.hints();
        let resolved = if schema.is_empty() {
            ResolvedHints::new()
        } else {
            schema.consume(hints)?
        };

        if self.descriptor.cluster_must_be_deployed && !cluster.is_deployed() {
            return Err(Error::ClusterNotDeployed {
                cluster: cluster.model_id.clone(),
            });
        }

        let (global_vars, inventory) =
            self.handler
                .make_playbook_configuration(&self.context, cluster, servers, &resolved)?;
        info!(
            "Built configuration of {} for cluster {}",
            self.descriptor.entry_point, cluster.model_id
        );

        Ok(RunConfiguration {
            global_vars,
            inventory,
        })
    }
}

/// Banner written before the output of a successful run.
pub fn log_header(commandline: &str) -> String {
    let width = commandline.chars().count().min(HEADER_MAX_WIDTH);
    let title = center(" Ansible commandline ", width, '=');
    format!("\n\n{}\n{}\n{}\n", title, commandline, "=".repeat(width))
}

/// Block written before the output of a failed run.
pub fn error_block(err: &Error) -> String {
    format!("\nInternal error\n\n{}\n", render_trace(err))
}

/// Centers `text` in `width` columns, putting the odd padding column on the
/// left when both the padding and the width are odd.
fn center(text: &str, width: usize, fill: char) -> String {
    let len = text.chars().count();
    if width <= len {
        return text.to_string();
    }
    let margin = width - len;
    let left = margin / 2 + (margin & width & 1);
    let right = margin - left;

    let mut centered = String::with_capacity(width);
    centered.extend(std::iter::repeat(fill).take(left));
    centered.push_str(text);
    centered.extend(std::iter::repeat(fill).take(right));
    centered
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_center_odd_padding() {
        assert_eq!(center("ab", 5, '='), "==ab=");
        assert_eq!(center("abc", 6, '='), "=abc==");
        assert_eq!(center("abc", 7, '='), "==abc==");
        assert_eq!(center("abcdef", 3, '='), "abcdef");
    }

    #[test]
    fn test_header_for_long_commandline() {
        let commandline = format!("ansible-playbook {}", "x".repeat(100));
        let header = log_header(&commandline);
        let lines: Vec<&str> = header.split('\n').collect();

        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2].chars().count(), 80);
        assert!(lines[2].contains(" Ansible commandline "));
        assert_eq!(lines[3], commandline);
        assert_eq!(lines[4], "=".repeat(80));
    }

    #[test]
    fn test_header_for_short_commandline() {
        // Shorter than the title: the title is written as is.
        let header = log_header("ls");
        assert_eq!(header, "\n\n Ansible commandline \nls\n==\n");
    }

    #[test]
    fn test_error_block() {
        let err = Error::ProcessFailed {
            program: "ansible-playbook".into(),
            code: 2,
        };
        let block = error_block(&err);
        assert!(block.starts_with("\nInternal error\n\n"));
        assert!(block.contains("exit code 2"));
    }
}
