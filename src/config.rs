//! Configuration module for CephLCM
//!
//! Handles loading and merging settings from multiple sources:
//! - Default values
//! - System configuration (/etc/cephlcm/config.yaml)
//! - User configuration (~/.cephlcm/config.yaml)
//! - Project configuration (./cephlcm.yaml)
//! - Environment variables
//!
//! Per-plugin static configuration lives next to each plugin's resources and
//! is loaded through [`crate::plugins::ConfigRegistry`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filesystem locations
    pub paths: PathsConfig,

    /// External Ansible programs
    pub ansible: AnsibleConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory holding one resource directory per plugin module
    pub plugins_dir: PathBuf,

    /// Shared resources (facts templates, ...)
    pub resources_dir: PathBuf,

    /// Directory of the file-backed store
    pub store_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from("/usr/share/cephlcm/plugins"),
            resources_dir: PathBuf::from("/usr/share/cephlcm/resources"),
            store_dir: PathBuf::from("/var/lib/cephlcm"),
        }
    }
}

/// Settings for the external Ansible programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsibleConfig {
    /// Program used for module invocations
    pub module_program: String,

    /// Program used for playbook runs
    pub playbook_program: String,

    /// Dynamic inventory executable handed to `--inventory-file`
    pub inventory_script: PathBuf,

    /// Extra environment for the child process
    pub environment: indexmap::IndexMap<String, String>,
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            module_program: "ansible".to_string(),
            playbook_program: "ansible-playbook".to_string(),
            inventory_script: PathBuf::from("/usr/bin/cephlcm-inventory"),
            environment: indexmap::IndexMap::new(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Load settings from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut settings = Settings::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                settings = settings.merge_from_file(&path)?;
            }
        }

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/cephlcm/config.yaml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cephlcm/config.yaml"));
        }

        paths.push(PathBuf::from("cephlcm.yaml"));

        if let Ok(env_config) = std::env::var("CEPHLCM_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Merge settings from a file; sections present in the file replace ours
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_value: serde_json::Value = match extension {
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        self.merge(file_value)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn merge(&self, overlay: serde_json::Value) -> Result<Self> {
        let mut base = serde_json::to_value(self)?;
        merge_values(&mut base, overlay);
        Ok(serde_json::from_value(base)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("CEPHLCM_PLUGINS_DIR") {
            self.paths.plugins_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("CEPHLCM_RESOURCES_DIR") {
            self.paths.resources_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("CEPHLCM_STORE_DIR") {
            self.paths.store_dir = PathBuf::from(dir);
        }

        if let Ok(program) = std::env::var("CEPHLCM_ANSIBLE") {
            self.ansible.module_program = program;
        }

        if let Ok(program) = std::env::var("CEPHLCM_ANSIBLE_PLAYBOOK") {
            self.ansible.playbook_program = program;
        }

        if let Ok(script) = std::env::var("CEPHLCM_INVENTORY_SCRIPT") {
            self.ansible.inventory_script = PathBuf::from(script);
        }

        if let Ok(format) = std::env::var("CEPHLCM_LOG_FORMAT") {
            match format.as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                _ => {}
            }
        }
    }

    /// Resource directory of a plugin module
    pub fn plugin_dir(&self, module: &str) -> PathBuf {
        self.paths.plugins_dir.join(module)
    }

    /// Path of a shared resource
    pub fn resource(&self, parts: &[&str]) -> PathBuf {
        parts
            .iter()
            .fold(self.paths.resources_dir.clone(), |path, part| path.join(part))
    }
}

fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.ansible.playbook_program, "ansible-playbook");
        assert_eq!(settings.ansible.module_program, "ansible");
        assert_eq!(settings.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cephlcm.yaml");
        std::fs::write(&path, "ansible:\n  playbook_program: /opt/bin/ansible-playbook\n").unwrap();

        let settings = Settings::default().merge_from_file(&path).unwrap();
        assert_eq!(
            settings.ansible.playbook_program,
            "/opt/bin/ansible-playbook"
        );
        assert_eq!(settings.ansible.module_program, "ansible");
        assert_eq!(settings.paths, PathsConfig::default());
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cephlcm.toml");
        std::fs::write(&path, "[logging]\nformat = \"json\"\n").unwrap();

        let settings = Settings::default().merge_from_file(&path).unwrap();
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("CEPHLCM_STORE_DIR", "/tmp/cephlcm-store");
        let mut settings = Settings::default();
        settings.apply_env_overrides();
        assert_eq!(settings.paths.store_dir, PathBuf::from("/tmp/cephlcm-store"));
        std::env::remove_var("CEPHLCM_STORE_DIR");
    }

    #[test]
    fn test_resource_path() {
        let settings = Settings::default();
        assert_eq!(
            settings.resource(&["facts", "ceph_facts_module.py.j2"]),
            PathBuf::from("/usr/share/cephlcm/resources/facts/ceph_facts_module.py.j2")
        );
    }
}
