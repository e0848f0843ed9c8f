//! Build command: create a playbook configuration.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use super::{CommandContext, Runnable};
use cephlcm::error::Error;
use cephlcm::hints::RawHint;
use cephlcm::plugins::{create_playbook_configuration, TaskBinding};

/// Arguments for the build command
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Plugin entry point
    pub plugin: String,

    /// Target cluster id
    #[arg(long)]
    pub cluster: String,

    /// Target server ids
    #[arg(short = 's', long = "server", action = clap::ArgAction::Append)]
    pub servers: Vec<String>,

    /// Hints file: a YAML or JSON list of `{id, value}`
    #[arg(long)]
    pub hints: Option<PathBuf>,

    /// Name of the configuration
    #[arg(long)]
    pub name: Option<String>,
}

fn load_hints(path: &Path) -> Result<Vec<RawHint>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hints file: {}", path.display()))?;
    let hints = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse hints file: {}", path.display()))?;
    Ok(hints)
}

impl Runnable for BuildArgs {
    fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let store = ctx.store()?;
        let cluster = store
            .find_cluster(&self.cluster)?
            .ok_or_else(|| Error::ClusterNotFound(self.cluster.clone()))?;
        let servers = store.find_servers(&self.servers)?;
        let hints = match &self.hints {
            Some(path) => load_hints(path)?,
            None => Vec::new(),
        };

        let context = ctx.plugin_context(TaskBinding::default())?;
        let plugin = ctx.registry.create(&self.plugin, context)?;
        let name = self.name.clone().unwrap_or_else(|| self.plugin.clone());

        let record = create_playbook_configuration(plugin.as_ref(), &name, &cluster, &servers, &hints)?;

        if ctx.output.is_json() {
            ctx.output.json(&record)?;
        } else {
            ctx.output.success(&format!(
                "Playbook configuration {} created for cluster {}",
                record.model_id, record.cluster_id
            ));
        }
        Ok(0)
    }
}
