//! Error types for CephLCM.
//!
//! This module defines the error taxonomy shared by the plugin framework:
//! caller-correctable failures raised before anything runs (server policy,
//! cluster state, hints), ordering errors, static configuration errors and
//! failures of the external process itself.

use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

use crate::hints::HintsError;

/// Result type alias for CephLCM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for CephLCM.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// Servers do not satisfy the plugin's relationship policy.
    #[error("{message}")]
    Validation {
        /// Human readable message naming violators and the cluster
        message: String,
        /// Violating server identifiers, sorted
        servers: Vec<String>,
    },

    /// Plugin requires a deployed cluster.
    #[error("Cluster '{cluster}' must be deployed first")]
    ClusterNotDeployed {
        /// Cluster identifier
        cluster: String,
    },

    /// Hints supplied for a run are malformed.
    #[error("Invalid hints: {0}")]
    Hints(#[from] HintsError),

    // ========================================================================
    // Ordering / Lookup Errors
    // ========================================================================
    /// No playbook configuration was built for the task.
    #[error("Unknown playbook configuration for task '{task}'")]
    UnknownConfiguration {
        /// Task identifier (empty when no task is bound)
        task: String,
    },

    /// Task not found in the store.
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    /// Execution not found in the store.
    #[error("Execution '{0}' not found")]
    ExecutionNotFound(String),

    /// Cluster not found in the store.
    #[error("Cluster '{0}' not found")]
    ClusterNotFound(String),

    /// Server not found in the store.
    #[error("Server '{0}' not found")]
    ServerNotFound(String),

    /// No plugin registered under the entry point.
    #[error("Plugin '{0}' is not registered")]
    PluginNotFound(String),

    /// Operation is not supported by the plugin.
    #[error("Plugin '{plugin}' does not support {operation}")]
    Unsupported {
        /// Plugin entry point
        plugin: String,
        /// Operation name
        operation: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Static plugin configuration cannot be read or parsed.
    #[error("Failed to load configuration '{path}': {message}")]
    ConfigLoad {
        /// Resolved configuration path
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// External process finished unsuccessfully.
    #[error("Process '{program}' failed with exit code {code}")]
    ProcessFailed {
        /// Program name
        program: String,
        /// Exit code (-1 when killed by a signal)
        code: i32,
    },

    /// Persistence layer failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, servers: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            servers,
        }
    }

    /// Creates a new configuration load error.
    pub fn config_load(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new unsupported operation error.
    pub fn unsupported(plugin: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            plugin: plugin.into(),
            operation: operation.into(),
        }
    }

    /// Returns true if the error is raised before any process starts and
    /// can be fixed by the caller.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::ClusterNotDeployed { .. } | Error::Hints(_)
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ProcessFailed { .. } => 2,
            Error::Validation { .. } | Error::Hints(_) => 3,
            Error::ClusterNotDeployed { .. } => 4,
            Error::UnknownConfiguration { .. }
            | Error::TaskNotFound(_)
            | Error::ExecutionNotFound(_)
            | Error::ClusterNotFound(_)
            | Error::ServerNotFound(_)
            | Error::PluginNotFound(_) => 5,
            Error::ConfigLoad { .. } => 6,
            _ => 1,
        }
    }
}

/// Renders an error together with its whole `source()` chain.
///
/// This is the trace written into execution logs when a run fails.
pub fn render_trace(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = format!("Error: {err}\n");
    let mut source = err.source();
    if source.is_some() {
        out.push_str("\nCaused by:\n");
    }
    let mut depth = 0;
    while let Some(cause) = source {
        let _ = writeln!(out, "    {depth}: {cause}");
        depth += 1;
        source = cause.source();
    }
    out
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
