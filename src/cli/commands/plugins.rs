//! Plugins command: list registered plugins.

use anyhow::Result;
use clap::Parser;

use super::{CommandContext, Runnable};
use cephlcm::plugins::PluginDescriptor;

/// Arguments for the plugins command
#[derive(Parser, Debug, Clone)]
pub struct PluginsArgs {
    /// Include internal plugins
    #[arg(long)]
    pub all: bool,
}

impl Runnable for PluginsArgs {
    fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let descriptors: Vec<&PluginDescriptor> = if self.all {
            let mut all: Vec<_> = ctx
                .registry
                .entry_points()
                .filter_map(|name| ctx.registry.descriptor(name))
                .collect();
            all.sort_by(|a, b| a.entry_point.cmp(&b.entry_point));
            all
        } else {
            ctx.registry.public()
        };

        if ctx.output.is_json() {
            ctx.output.json(&descriptors)?;
            return Ok(0);
        }

        let rows: Vec<Vec<String>> = descriptors
            .iter()
            .map(|d| {
                vec![
                    d.entry_point.clone(),
                    d.name.clone(),
                    d.server_list_policy.to_string(),
                    d.description.clone(),
                ]
            })
            .collect();
        ctx.output
            .table(&["ENTRY POINT", "NAME", "POLICY", "DESCRIPTION"], &rows);
        Ok(0)
    }
}
