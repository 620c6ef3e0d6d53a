//! CLI configuration management.

use anyhow::{Context, Result, anyhow, bail};
use cairn_cache::BuildCacheConfig;
use cairn_server::ServerConfig;
use cairn_trace::TracingConfig;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Everything `cairn` reads from its configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CairnConfig {
    #[serde(flatten)]
    pub cache: BuildCacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl CairnConfig {
    /// Load from `path`, or from the default location. A missing default
    /// file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };
        if !path.exists() && !explicit {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(path)
    }

    /// Get the default configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "cairn", "cairn")
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a dotted option such as `remote.push` or `local.max_size_bytes`.
    ///
    /// The value is parsed as a YAML scalar and the whole config is
    /// re-validated, so type errors and unknown keys are rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed: Value = serde_yaml::from_str(value).unwrap_or(Value::String(value.into()));
        let mut tree = serde_yaml::to_value(&*self)?;

        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            bail!("Invalid config key: {}", key);
        }
        insert_path(&mut tree, &parts, parsed.clone())?;

        let updated: CairnConfig = serde_yaml::from_value(tree)
            .with_context(|| format!("Invalid value for {}: {}", key, value))?;

        // Unknown keys deserialize silently; make sure the value landed.
        let check = serde_yaml::to_value(&updated)?;
        if lookup_path(&check, &parts) != Some(&parsed) {
            bail!("Unknown config key: {}", key);
        }
        *self = updated;
        Ok(())
    }
}

fn insert_path(tree: &mut Value, parts: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = parts.split_last() else {
        bail!("Empty config key");
    };
    let mut node = tree;
    for part in parents {
        let Value::Mapping(map) = node else {
            bail!("Config key {} is not a section", part);
        };
        let child = map
            .entry(Value::String((*part).to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if child.is_null() {
            *child = Value::Mapping(Mapping::new());
        }
        node = child;
    }
    match node {
        Value::Mapping(map) => {
            map.insert(Value::String((*last).to_string()), value);
            Ok(())
        }
        _ => bail!("Config key {} is not a section", parts.join(".")),
    }
}

fn lookup_path<'a>(tree: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    parts.iter().try_fold(tree, |node, part| node.get(*part))
}
