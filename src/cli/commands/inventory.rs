//! Inventory command: the Ansible dynamic inventory protocol.
//!
//! Ansible calls the configured inventory script with `--list` or
//! `--host <name>`. The task and plugin come from `CEPHLCM_TASK_ID` and
//! `CEPHLCM_ENTRY_POINT`, which the executor sets on the Ansible process.

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser};
use serde_json::{json, Value};

use super::{CommandContext, Runnable};
use cephlcm::plugins::TaskBinding;
use cephlcm::process::ENV_ENTRY_POINT;

/// Arguments for the inventory command
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "host"])))]
pub struct InventoryArgs {
    /// Print the whole inventory
    #[arg(long)]
    pub list: bool,

    /// Print the variables of one host
    #[arg(long)]
    pub host: Option<String>,
}

/// Variables of `host` from `_meta.hostvars`, empty when unknown.
pub fn host_vars(inventory: &Value, host: &str) -> Value {
    inventory
        .pointer("/_meta/hostvars")
        .and_then(|hostvars| hostvars.get(host))
        .cloned()
        .unwrap_or_else(|| json!({}))
}

impl Runnable for InventoryArgs {
    fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let binding = TaskBinding::from_env();
        let Some(entry_point) = binding.entry_point.clone() else {
            bail!("{} is not set", ENV_ENTRY_POINT);
        };

        let context = ctx.plugin_context(binding)?;
        let plugin = ctx.registry.create(&entry_point, context)?;
        let inventory = plugin.get_dynamic_inventory()?.unwrap_or_else(|| json!({}));

        match &self.host {
            Some(host) => ctx.output.json(&host_vars(&inventory, host))?,
            None => ctx.output.json(&inventory)?,
        }
        Ok(0)
    }
}
