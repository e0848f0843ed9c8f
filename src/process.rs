//! External process composition and spawning.
//!
//! Plugins describe the command they want as a [`ProcessCommand`]; an
//! [`Executor`] turns it into a [`RunningProcess`] whose combined output is
//! captured in a seekable temporary file so it can be copied into the
//! execution log afterwards.

use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::process::{Child, Command, Stdio};
use tracing::debug;

use crate::config::AnsibleConfig;
use crate::error::{Error, Result};

/// Environment variable carrying the task id to child processes.
pub const ENV_TASK_ID: &str = "CEPHLCM_TASK_ID";

/// Environment variable carrying the plugin entry point to child processes.
pub const ENV_ENTRY_POINT: &str = "CEPHLCM_ENTRY_POINT";

/// Value of a command line option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Flag without a value (`--become`)
    NoValue,
    /// Option followed by a value
    Value(String),
}

/// A composed external command: program, options, positional args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub options: IndexMap<String, OptionValue>,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: IndexMap::new(),
            args: Vec::new(),
            env: IndexMap::new(),
        }
    }

    /// Base command for a single-module run against every inventory host.
    pub fn ansible(
        config: &AnsibleConfig,
        entry_point: &str,
        task_id: &str,
        module: &str,
    ) -> Self {
        let mut cmd = Self::base(&config.module_program, config, entry_point, task_id);
        cmd.set_option("--module-name", module);
        cmd.args.push("all".to_string());
        cmd
    }

    /// Base command for a playbook run.
    pub fn ansible_playbook(config: &AnsibleConfig, entry_point: &str, task_id: &str) -> Self {
        Self::base(&config.playbook_program, config, entry_point, task_id)
    }

    fn base(program: &str, config: &AnsibleConfig, entry_point: &str, task_id: &str) -> Self {
        let mut cmd = Self::new(program);
        cmd.set_option(
            "--inventory-file",
            config.inventory_script.display().to_string(),
        );
        cmd.env.extend(config.environment.clone());
        cmd.env.insert(ENV_TASK_ID.to_string(), task_id.to_string());
        cmd.env
            .insert(ENV_ENTRY_POINT.to_string(), entry_point.to_string());
        cmd
    }

    /// Set an option with a value.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options
            .insert(key.into(), OptionValue::Value(value.into()));
    }

    /// Set a flag.
    pub fn set_flag(&mut self, key: impl Into<String>) {
        self.options.insert(key.into(), OptionValue::NoValue);
    }

    /// Program, options and args as an argv vector.
    pub fn commandline(&self) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        for (key, value) in &self.options {
            argv.push(key.clone());
            if let OptionValue::Value(value) = value {
                argv.push(value.clone());
            }
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Shell-quoted command line, for logs.
    pub fn printable_commandline(&self) -> String {
        shell_words::join(self.commandline())
    }
}

/// Serializes a value as compact JSON for `--extra-vars`.
pub fn jsonify<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// A spawned (or already finished) process with captured output.
#[derive(Debug)]
pub struct RunningProcess {
    program: String,
    child: Option<Child>,
    output: File,
}

impl RunningProcess {
    /// Wraps a spawned child writing into `output`.
    pub fn new(program: impl Into<String>, child: Child, output: File) -> Self {
        Self {
            program: program.into(),
            child: Some(child),
            output,
        }
    }

    /// A process that has nothing left to wait for, e.g. a replayed run.
    pub fn finished(program: impl Into<String>, output: File) -> Self {
        Self {
            program: program.into(),
            child: None,
            output,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id, if a child is attached.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Waits for the child and fails if it exited unsuccessfully.
    pub fn wait(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let status = child.wait()?;
        debug!("{} exited with {}", self.program, status);
        if status.success() {
            Ok(())
        } else {
            Err(Error::ProcessFailed {
                program: self.program.clone(),
                code: status.code().unwrap_or(-1),
            })
        }
    }

    /// Captured output, rewound to the start.
    pub fn rewound_output(&mut self) -> Result<&mut File> {
        self.output.seek(SeekFrom::Start(0))?;
        Ok(&mut self.output)
    }
}

/// Spawns composed commands.
pub trait Executor: Send + Sync {
    fn spawn(&self, command: &ProcessCommand) -> Result<RunningProcess>;
}

/// Runs commands on the local host with `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExecutor;

impl Executor for LocalExecutor {
    fn spawn(&self, command: &ProcessCommand) -> Result<RunningProcess> {
        let output = tempfile::tempfile()?;
        let stdout = output.try_clone()?;
        let stderr = output.try_clone()?;

        let argv = command.commandline();
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| Error::Other {
                message: format!("Cannot spawn '{}'", command.program),
                source: Some(Box::new(e)),
            })?;

        debug!("Spawned {} with pid {}", command.program, child.id());
        Ok(RunningProcess::new(command.program.clone(), child, output))
    }
}
