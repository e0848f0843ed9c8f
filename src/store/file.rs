//! File-backed store: one JSON document per record.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::Store;
use crate::error::{Error, ErrorContext, Result};
use crate::models::{Cluster, Execution, PlaybookConfiguration, Server, Task};

const CLUSTERS: &str = "clusters";
const SERVERS: &str = "servers";
const TASKS: &str = "tasks";
const EXECUTIONS: &str = "executions";
const PLAYBOOK_CONFIGURATIONS: &str = "playbook_configurations";
const LOGS: &str = "logs";

/// Stores records as `<root>/<kind>/<id>.json`; logs as `<root>/logs/<id>.log`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [
            CLUSTERS,
            SERVERS,
            TASKS,
            EXECUTIONS,
            PLAYBOOK_CONFIGURATIONS,
            LOGS,
        ] {
            fs::create_dir_all(root.join(kind))
                .with_context(|| format!("Cannot create store directory {}", root.display()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, kind: &str, id: &str, extension: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::Persistence(format!("invalid record id '{id}'")));
        }
        Ok(self.root.join(kind).join(format!("{id}.{extension}")))
    }

    fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>> {
        let path = self.path(kind, id, "json")?;
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_slice(&content)
            .with_context(|| format!("Corrupted record {}", path.display()))?;
        Ok(Some(record))
    }

    fn save<T: Serialize>(&self, kind: &str, id: &str, record: &T) -> Result<()> {
        let path = self.path(kind, id, "json")?;
        let dir = self.root.join(kind);

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, record)?;
        tmp.flush()?;
        tmp.persist(&path)
            .map_err(|e| Error::Persistence(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl Store for FileStore {
    fn find_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        self.load(CLUSTERS, id)
    }

    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.save(CLUSTERS, &cluster.model_id, cluster)
    }

    fn find_server(&self, id: &str) -> Result<Option<Server>> {
        self.load(SERVERS, id)
    }

    fn save_server(&self, server: &Server) -> Result<()> {
        self.save(SERVERS, &server.model_id, server)
    }

    fn find_task(&self, id: &str) -> Result<Option<Task>> {
        self.load(TASKS, id)
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        self.save(TASKS, &task.model_id, task)
    }

    fn find_execution(&self, id: &str) -> Result<Option<Execution>> {
        self.load(EXECUTIONS, id)
    }

    fn save_execution(&self, execution: &Execution) -> Result<()> {
        self.save(EXECUTIONS, &execution.model_id, execution)
    }

    fn find_playbook_configuration(&self, id: &str) -> Result<Option<PlaybookConfiguration>> {
        self.load(PLAYBOOK_CONFIGURATIONS, id)
    }

    fn save_playbook_configuration(&self, config: &PlaybookConfiguration) -> Result<()> {
        self.save(PLAYBOOK_CONFIGURATIONS, &config.model_id, config)
    }

    fn open_execution_log(&self, execution: &Execution) -> Result<Box<dyn Write + Send>> {
        let path = self.path(LOGS, &execution.model_id, "log")?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn read_execution_log(&self, execution_id: &str) -> Result<Vec<u8>> {
        let path = self.path(LOGS, execution_id, "log")?;
        match fs::read(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunConfiguration;
    use tempfile::TempDir;

    #[test]
    fn test_records_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .save_cluster(&Cluster::new("c1", "ceph").with_state(true))
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let cluster = reopened.find_cluster("c1").unwrap().unwrap();
        assert!(cluster.is_deployed());
        assert!(reopened.find_cluster("c2").unwrap().is_none());
    }

    #[test]
    fn test_playbook_configuration_keeps_var_order() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut configuration = RunConfiguration::default();
        configuration.global_vars.insert("zeta".into(), 1.into());
        configuration.global_vars.insert("alpha".into(), 2.into());
        let record = PlaybookConfiguration {
            model_id: "pc1".into(),
            name: "deploy".into(),
            playbook_id: "cluster_deploy".into(),
            cluster_id: "c1".into(),
            configuration,
        };
        store.save_playbook_configuration(&record).unwrap();

        let loaded = store.find_playbook_configuration("pc1").unwrap().unwrap();
        assert_eq!(
            loaded.configuration.global_vars.keys().collect::<Vec<_>>(),
            vec!["zeta", "alpha"]
        );
    }

    #[test]
    fn test_log_is_append_only() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let execution = Execution::new("e1");

        store
            .open_execution_log(&execution)
            .unwrap()
            .write_all(b"a")
            .unwrap();
        store
            .open_execution_log(&execution)
            .unwrap()
            .write_all(b"b")
            .unwrap();

        assert_eq!(store.read_execution_log("e1").unwrap(), b"ab");
        assert!(store.read_execution_log("e2").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.find_task("../etc/passwd").is_err());
    }
}
