//! Concrete configuration sources.
//!
//! - [`DefaultConfig`]: nothing but the default table.
//! - [`DictConfig`]: an in-memory mapping built in code.
//! - [`FileConfig`]: a YAML file with one top-level mapping per section.
//!
//! ```yaml
//! # dectest.yaml
//! testing:
//!   testasrun: yes
//!   sideaffects: dectest.sideeffects.GlobalStateChange
//!   pretest: app.hooks.reset
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{default_store, ConfigSource, ConfigStore};
use crate::diagnostics::{DectestError, Result};
use crate::value::Value;

/// A source that only provides the default table.
#[derive(Debug, Clone)]
pub struct DefaultConfig {
    store: ConfigStore,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
        }
    }
}

impl ConfigSource for DefaultConfig {
    fn store(&self) -> &ConfigStore {
        &self.store
    }
}

/// Configuration supplied directly as a mapping.
#[derive(Debug, Clone, Default)]
pub struct DictConfig {
    store: ConfigStore,
}

impl DictConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Builder-style `section.item = value`.
    pub fn with(mut self, section: &str, item: &str, value: impl Into<Value>) -> Self {
        self.set(section, item, value);
        self
    }

    pub fn set(&mut self, section: &str, item: &str, value: impl Into<Value>) {
        self.store
            .entry(section.to_string())
            .or_default()
            .insert(item.to_string(), value.into());
    }
}

impl ConfigSource for DictConfig {
    fn store(&self) -> &ConfigStore {
        &self.store
    }
}

/// Configuration loaded from a YAML file.
///
/// Top-level keys are sections and their mappings are items. Keys starting with `_` and
/// top-level values that are not mappings are ignored. If the file cannot be read or parsed the
/// store falls back to the default table and a warning is logged.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
    store: ConfigStore,
}

impl FileConfig {
    /// Loads `path`. Failure is not fatal: the defaults are used and a warning is logged.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            path: path.into(),
            store: ConfigStore::new(),
        };
        if let Err(err) = config.reload() {
            debug!(target: "dectest", error = %err, "configuration file unavailable at startup");
        }
        config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfig {
    fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn reload(&mut self) -> Result<()> {
        match read_store(&self.path) {
            Ok(store) => {
                debug!(target: "dectest", path = %self.path.display(), sections = store.len(), "configuration loaded");
                self.store = store;
                Ok(())
            }
            Err(err) => {
                warn!(
                    target: "dectest",
                    path = %self.path.display(),
                    error = %err,
                    "Could not load configuration file, using defaults"
                );
                self.store = default_store();
                Err(err)
            }
        }
    }
}

fn read_store(path: &Path) -> Result<ConfigStore> {
    let content = fs::read_to_string(path).map_err(|source| DectestError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(ConfigStore::new());
    }

    let parse_error = |source| DectestError::ConfigParse {
        path: path.to_path_buf(),
        source,
    };
    let document: serde_yaml::Mapping = serde_yaml::from_str(&content).map_err(parse_error)?;

    let mut store = ConfigStore::new();
    for (name, section) in document {
        let Some(name) = name.as_str() else { continue };
        if name.starts_with('_') || !section.is_mapping() {
            continue;
        }
        let items: HashMap<String, Value> = serde_yaml::from_value(section).map_err(parse_error)?;
        store.insert(name.to_string(), items);
    }
    Ok(store)
}
