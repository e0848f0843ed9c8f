//! Data model consumed by the plugin framework.
//!
//! The persistence layer owns these records; the orchestration core only
//! reads clusters and servers, creates playbook configurations and appends to
//! execution logs.

pub mod cluster;
pub mod execution;
pub mod playbook_configuration;
pub mod server;
pub mod task;

pub use cluster::{Cluster, ClusterConfiguration};
pub use execution::{Execution, ExecutionState};
pub use playbook_configuration::{GlobalVars, PlaybookConfiguration, RunConfiguration};
pub use server::Server;
pub use task::Task;

/// Generates a fresh model identifier.
pub fn new_model_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
