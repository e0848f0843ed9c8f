//! Server discovery.
//!
//! Runs the `server_discovery` module against a single new host. The host is
//! not known to the store yet, so everything comes from the task data.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::{GlobalVars, Task};
use crate::plugins::{
    ModuleHandler, ModuleInvocationPlugin, ModuleSpec, Plugin, PluginContext, PluginDescriptor,
};
use crate::policy::ServerListPolicy;

pub const ENTRY_POINT: &str = "server_discovery";

/// Fields copied from the task data into the module arguments.
const TASK_FIELDS: [&str; 3] = ["id", "host", "username"];

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY_POINT, ENTRY_POINT)
        .with_name("Server discovery")
        .with_description("Gathers facts of a new server and registers it")
        .with_public(false)
        .with_server_list(false, ServerListPolicy::AnyServer)
}

pub fn create(context: PluginContext) -> Result<Box<dyn Plugin>> {
    let plugin = ModuleInvocationPlugin::new(
        descriptor(),
        ModuleSpec::new(ENTRY_POINT),
        context,
        ServerDiscovery,
    )?;
    Ok(Box::new(plugin))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ServerDiscovery;

fn required<'a>(task: &'a Task, key: &str) -> Result<&'a str> {
    task.data_str(key).ok_or_else(|| Error::Other {
        message: format!("Task '{}' has no '{}' in its data", task.model_id, key),
        source: None,
    })
}

impl ModuleHandler for ServerDiscovery {
    fn extra_vars(&self, task: &Task) -> Result<GlobalVars> {
        let mut vars = GlobalVars::new();
        for key in TASK_FIELDS {
            vars.insert(key.to_string(), json!(required(task, key)?));
        }
        Ok(vars)
    }

    fn dynamic_inventory(&self, context: &PluginContext) -> Result<Option<Value>> {
        let Some(task) = context.bound_task()? else {
            return Ok(None);
        };
        let host = required(&task, "host")?;
        let username = required(&task, "username")?;

        Ok(Some(json!({
            "new": [host],
            "_meta": {
                "hostvars": {
                    host: {"ansible_user": username},
                },
            },
        })))
    }
}
