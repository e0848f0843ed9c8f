//! Registry of parsed static plugin configuration.
//!
//! One registry is created at startup and shared by every plugin instance.
//! Each file is parsed at most once per canonical path; entries are never
//! replaced afterwards.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct ConfigRegistry {
    entries: RwLock<HashMap<PathBuf, Arc<serde_yaml::Value>>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed YAML at `path`, parsing it on first use.
    pub fn load(&self, path: &Path) -> Result<Arc<serde_yaml::Value>> {
        let key = std::fs::canonicalize(path).map_err(|e| {
            Error::config_load(path, "cannot resolve path", Some(Box::new(e)))
        })?;

        if let Some(config) = self.entries.read().get(&key) {
            return Ok(Arc::clone(config));
        }

        // Concurrent first loads may both parse; the first insert wins.
        let parsed = parse(&key)?;
        debug!("Loaded plugin configuration {}", key.display());
        let mut entries = self.entries.write();
        Ok(Arc::clone(
            entries.entry(key).or_insert_with(|| Arc::new(parsed)),
        ))
    }

    /// Returns true if `path` has already been loaded.
    pub fn contains(&self, path: &Path) -> bool {
        std::fs::canonicalize(path)
            .map(|key| self.entries.read().contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn parse(path: &Path) -> Result<serde_yaml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config_load(path, "cannot read file", Some(Box::new(e))))?;
    if content.trim().is_empty() {
        return Ok(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    }
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| Error::config_load(path, "invalid YAML", Some(Box::new(e))))?;
    if value.is_null() {
        return Ok(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    }
    Ok(value)
}
