//! # CephLCM - Ceph Lifecycle Management
//!
//! CephLCM deploys and operates Ceph clusters by running Ansible playbooks
//! through plugins. The library holds the plugin orchestration core: every
//! operation on a cluster is a plugin that checks its inputs, builds a run
//! configuration, composes an Ansible command line, runs it and captures
//! its output into the execution log.
//!
//! ## Core Concepts
//!
//! - **Policies**: how the target servers must relate to the cluster
//!   ([`policy`])
//! - **Hints**: per-run overrides a plugin declares and validates ([`hints`])
//! - **Run configurations**: the persisted `{global_vars, inventory}` pair a
//!   playbook run consumes ([`models`])
//! - **Plugins**: module invocations and playbooks with a fixed execution
//!   protocol ([`plugins`])
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                             │
//! │          (plugins / build / run / inventory subcommands)            │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Plugin Registry                            │
//! │        (entry point -> factory, descriptors, config registry)       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │  Policy + Hints │   │   Ceph variables    │   │   Execute protocol  │
//! │  (checked once  │   │   (global vars +    │   │   (pre / compose /  │
//! │   up front)     │   │    inventory)       │   │    run / post)      │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │                         │                         │
//!          └─────────────────────────┼─────────────────────────┘
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                Store, Executor, Network topology                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use cephlcm::prelude::*;
//!
//! let plugin = registry.create("cluster_deploy", context)?;
//! let record = create_playbook_configuration(plugin.as_ref(), "deploy", &cluster, &servers, &[])?;
//!
//! let mut plugin = registry.create("cluster_deploy", bound_context)?;
//! plugin.execute(&task, |process| process.wait())?;
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hints;
pub mod models;
pub mod network;
pub mod plugins;
pub mod policy;
pub mod process;
pub mod store;

pub use error::{Error, Result};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Settings;
    pub use crate::error::{Error, ErrorContext, Result};
    pub use crate::hints::{Hint, Hints, RawHint, ResolvedHints};
    pub use crate::models::{
        Cluster, Execution, GlobalVars, PlaybookConfiguration, RunConfiguration, Server, Task,
    };
    pub use crate::network::{FactsNetworkTopology, NetworkTopology};
    pub use crate::plugins::{
        create_playbook_configuration, ConfigRegistry, Plugin, PluginContext, PluginDescriptor,
        PluginExt, PluginRegistry, TaskBinding,
    };
    pub use crate::policy::{validate, ServerListPolicy};
    pub use crate::process::{Executor, LocalExecutor, ProcessCommand, RunningProcess};
    pub use crate::store::{FileStore, MemoryStore, Store};
}
