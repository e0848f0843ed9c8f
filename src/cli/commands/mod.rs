//! Subcommands module for CephLCM CLI
//!
//! This module contains all the subcommand implementations.

pub mod build;
pub mod inventory;
pub mod plugins;
pub mod run;

use anyhow::Result;
use std::sync::Arc;

use crate::cli::output::OutputFormatter;
use cephlcm::config::Settings;
use cephlcm::network::FactsNetworkTopology;
use cephlcm::plugins::{ConfigRegistry, PluginContext, PluginRegistry, TaskBinding};
use cephlcm::process::LocalExecutor;
use cephlcm::store::{FileStore, Store};

/// Common context shared between commands
pub struct CommandContext {
    /// Settings
    pub settings: Arc<Settings>,
    /// Output formatter
    pub output: OutputFormatter,
    /// Registered plugins
    pub registry: PluginRegistry,
    /// Parsed plugin configuration, shared by every plugin instance
    pub configs: Arc<ConfigRegistry>,
    store: Option<Arc<dyn Store>>,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, settings: Settings) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            settings: Arc::new(settings),
            output,
            registry: PluginRegistry::builtin(),
            configs: Arc::new(ConfigRegistry::new()),
            store: None,
        }
    }

    /// The record store, opened on first use
    pub fn store(&mut self) -> Result<Arc<dyn Store>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let store: Arc<dyn Store> = Arc::new(FileStore::open(&self.settings.paths.store_dir)?);
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Collaborators for a plugin instance bound to `binding`
    pub fn plugin_context(&mut self, binding: TaskBinding) -> Result<PluginContext> {
        let store = self.store()?;
        Ok(PluginContext::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.configs),
            store,
            Arc::new(LocalExecutor),
            Arc::new(FactsNetworkTopology),
        )
        .with_binding(binding))
    }
}

/// Trait for runnable commands
pub trait Runnable {
    /// Execute the command, returning the process exit code
    fn execute(&self, ctx: &mut CommandContext) -> Result<i32>;
}
