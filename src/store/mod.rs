//! Persistence contract used by the orchestration core.
//!
//! The core only needs find/save on a handful of record types plus an
//! append-only log sink per execution. [`MemoryStore`] backs tests and
//! embedding; [`FileStore`] keeps one JSON document per record on disk.

mod file;

pub use file::FileStore;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Cluster, Execution, PlaybookConfiguration, Server, Task};

/// Record storage.
pub trait Store: Send + Sync {
    fn find_cluster(&self, id: &str) -> Result<Option<Cluster>>;
    fn save_cluster(&self, cluster: &Cluster) -> Result<()>;

    fn find_server(&self, id: &str) -> Result<Option<Server>>;
    fn save_server(&self, server: &Server) -> Result<()>;

    fn find_task(&self, id: &str) -> Result<Option<Task>>;
    fn save_task(&self, task: &Task) -> Result<()>;

    fn find_execution(&self, id: &str) -> Result<Option<Execution>>;
    fn save_execution(&self, execution: &Execution) -> Result<()>;

    fn find_playbook_configuration(&self, id: &str) -> Result<Option<PlaybookConfiguration>>;
    fn save_playbook_configuration(&self, config: &PlaybookConfiguration) -> Result<()>;

    /// Opens the execution's log for appending, creating it on first use.
    fn open_execution_log(&self, execution: &Execution) -> Result<Box<dyn Write + Send>>;

    /// Full contents of the execution's log (empty if never written).
    fn read_execution_log(&self, execution_id: &str) -> Result<Vec<u8>>;

    /// Loads servers by id, failing on the first unknown one.
    fn find_servers(&self, ids: &[String]) -> Result<Vec<Server>> {
        ids.iter()
            .map(|id| {
                self.find_server(id)?
                    .ok_or_else(|| Error::ServerNotFound(id.clone()))
            })
            .collect()
    }
}

type LogBuffers = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    clusters: RwLock<HashMap<String, Cluster>>,
    servers: RwLock<HashMap<String, Server>>,
    tasks: RwLock<HashMap<String, Task>>,
    executions: RwLock<HashMap<String, Execution>>,
    playbook_configurations: RwLock<HashMap<String, PlaybookConfiguration>>,
    logs: LogBuffers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn find_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        Ok(self.clusters.read().get(id).cloned())
    }

    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.clusters
            .write()
            .insert(cluster.model_id.clone(), cluster.clone());
        Ok(())
    }

    fn find_server(&self, id: &str) -> Result<Option<Server>> {
        Ok(self.servers.read().get(id).cloned())
    }

    fn save_server(&self, server: &Server) -> Result<()> {
        self.servers
            .write()
            .insert(server.model_id.clone(), server.clone());
        Ok(())
    }

    fn find_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().get(id).cloned())
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        self.tasks.write().insert(task.model_id.clone(), task.clone());
        Ok(())
    }

    fn find_execution(&self, id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.read().get(id).cloned())
    }

    fn save_execution(&self, execution: &Execution) -> Result<()> {
        self.executions
            .write()
            .insert(execution.model_id.clone(), execution.clone());
        Ok(())
    }

    fn find_playbook_configuration(&self, id: &str) -> Result<Option<PlaybookConfiguration>> {
        Ok(self.playbook_configurations.read().get(id).cloned())
    }

    fn save_playbook_configuration(&self, config: &PlaybookConfiguration) -> Result<()> {
        self.playbook_configurations
            .write()
            .insert(config.model_id.clone(), config.clone());
        Ok(())
    }

    fn open_execution_log(&self, execution: &Execution) -> Result<Box<dyn Write + Send>> {
        self.logs
            .lock()
            .entry(execution.model_id.clone())
            .or_default();
        Ok(Box::new(MemoryLog {
            logs: Arc::clone(&self.logs),
            execution_id: execution.model_id.clone(),
        }))
    }

    fn read_execution_log(&self, execution_id: &str) -> Result<Vec<u8>> {
        Ok(self
            .logs
            .lock()
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

struct MemoryLog {
    logs: LogBuffers,
    execution_id: String,
}

impl Write for MemoryLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logs
            .lock()
            .entry(self.execution_id.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appends_across_opens() {
        let store = MemoryStore::new();
        let execution = Execution::new("e1");

        store
            .open_execution_log(&execution)
            .unwrap()
            .write_all(b"first\n")
            .unwrap();
        store
            .open_execution_log(&execution)
            .unwrap()
            .write_all(b"second\n")
            .unwrap();

        assert_eq!(store.read_execution_log("e1").unwrap(), b"first\nsecond\n");
    }

    #[test]
    fn test_find_servers_reports_missing() {
        let store = MemoryStore::new();
        store.save_server(&Server::new("s1")).unwrap();

        let found = store.find_servers(&["s1".to_string()]).unwrap();
        assert_eq!(found.len(), 1);

        let err = store
            .find_servers(&["s1".to_string(), "s2".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::ServerNotFound(id) if id == "s2"));
    }
}
