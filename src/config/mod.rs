//! # Dectest configuration
//!
//! Configuration is a two-level mapping, section name to item name to [`Value`], backed by a
//! compiled-in default table for the `testing` section. A [`ConfigSource`] only has to supply the
//! raw store; the [`Config`] resolver layers defaults, typed accessors and dotted-path object
//! lookup on top.
//!
//! ## Recognised settings
//!
//! | item                  | default | effect                                                    |
//! |-----------------------|---------|-----------------------------------------------------------|
//! | `testing.testasrun`   | `true`  | run a function's cases on its first real call             |
//! | `testing.sideaffects` | `[]`    | dotted paths of verifier kinds to activate                |
//! | `testing.runtests`    | `true`  | global kill switch for batch and lazy runs                |
//! | `testing.pretest`     | nil     | dotted path of a hook run before every case               |
//! | `testing.posttest`    | nil     | dotted path of a hook run after every case                |
//!
//! ## Failure policy
//!
//! Accessors never fail. Anything missing or malformed is logged as a `tracing` warning and
//! reported as `None`, so callers always have a usable fallback.

use std::collections::HashMap;

use tracing::warn;

use crate::diagnostics::Result;
use crate::value::Value;

mod path;
mod registry;
pub mod sources;

pub(crate) use path::DottedPath;
pub use registry::{Hook, Namespace, Object, ObjectRegistry, BUILTIN_MODULE};
pub use sources::{DefaultConfig, DictConfig, FileConfig};

/// Section name to item name to value.
pub type ConfigStore = HashMap<String, HashMap<String, Value>>;

/// Names of the recognised settings.
pub mod keys {
    pub const TESTING: &str = "testing";
    pub const TEST_AS_RUN: &str = "testasrun";
    pub const SIDE_EFFECTS: &str = "sideaffects";
    pub const RUN_TESTS: &str = "runtests";
    pub const PRE_TEST: &str = "pretest";
    pub const POST_TEST: &str = "posttest";
}

thread_local! {
    static DEFAULTS: ConfigStore = build_defaults();
}

fn build_defaults() -> ConfigStore {
    let testing: HashMap<String, Value> = [
        (keys::TEST_AS_RUN, Value::Bool(true)),
        (keys::SIDE_EFFECTS, Value::List(Vec::new())),
        (keys::RUN_TESTS, Value::Bool(true)),
        (keys::PRE_TEST, Value::Nil),
        (keys::POST_TEST, Value::Nil),
    ]
    .into_iter()
    .map(|(item, value)| (item.to_string(), value))
    .collect();

    let mut store = ConfigStore::new();
    store.insert(keys::TESTING.to_string(), testing);
    store
}

/// A copy of the compiled-in default table.
pub fn default_store() -> ConfigStore {
    DEFAULTS.with(Clone::clone)
}

/// The default for `section.item`, if the default table has one.
pub fn default_value(section: &str, item: &str) -> Option<Value> {
    DEFAULTS.with(|defaults| defaults.get(section)?.get(item).cloned())
}

// ============================================================================
// SOURCES
// ============================================================================

/// A provider of raw configuration.
pub trait ConfigSource {
    /// The current section/item mapping.
    fn store(&self) -> &ConfigStore;

    /// Re-reads the configuration from its origin. Sources without an origin do nothing.
    ///
    /// # Errors
    /// Implementations report load failures here after falling back to a usable store.
    fn reload(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Typed, fault-tolerant access to a [`ConfigSource`].
pub struct Config {
    source: Box<dyn ConfigSource>,
    objects: ObjectRegistry,
}

impl Config {
    /// Wraps `source`, with the built-in verifiers available for dotted-path lookup.
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            objects: ObjectRegistry::with_builtins(),
        }
    }

    /// Replaces the object registry used by [`Config::get_object`].
    pub fn with_objects(mut self, objects: ObjectRegistry) -> Self {
        self.objects = objects;
        self
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.objects
    }

    /// Returns the configured value, falling back to the default table.
    pub fn get(&self, section: &str, item: &str) -> Option<Value> {
        let configured = self
            .source
            .store()
            .get(section)
            .and_then(|items| items.get(item))
            .cloned();
        if configured.is_some() {
            return configured;
        }

        let default = DEFAULTS.with(|defaults| {
            defaults
                .get(section)
                .map(|items| items.get(item).cloned())
        });
        match default {
            Some(Some(value)) => Some(value),
            Some(None) => {
                warn!(target: "dectest", section, item, "Config value does not exist in config or as a default");
                None
            }
            None => {
                if !self.source.store().contains_key(section) {
                    warn!(target: "dectest", section, "Config section does not exist in config or as default");
                } else {
                    warn!(target: "dectest", section, item, "Config value does not exist in config or as a default");
                }
                None
            }
        }
    }

    /// The compiled-in default, ignoring the source.
    pub fn get_default(&self, section: &str, item: &str) -> Option<Value> {
        default_value(section, item)
    }

    /// Interprets the value as a boolean.
    ///
    /// Strings `yes`/`true`/`y` and `no`/`false`/`n` are accepted case-insensitively; booleans
    /// pass through; anything else is `None`.
    pub fn get_bool(&self, section: &str, item: &str) -> Option<bool> {
        match self.get(section, item)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => parse_bool(&s),
            _ => None,
        }
    }

    /// Interprets the value as a list.
    ///
    /// Strings are split on commas (pieces trimmed, empty pieces dropped), lists pass through,
    /// maps yield their keys. An empty result is `None`.
    pub fn get_list(&self, section: &str, item: &str) -> Option<Vec<Value>> {
        let list = match self.get(section, item)? {
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(Value::from)
                .collect(),
            Value::List(items) => items,
            Value::Map(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys.into_iter().map(Value::String).collect()
            }
            _ => return None,
        };
        (!list.is_empty()).then_some(list)
    }

    /// Resolves a configured reference to an object.
    ///
    /// Strings are dotted paths looked up in the object registry; any other value is taken to be
    /// already resolved and is returned as [`Object::Value`].
    pub fn get_object(&self, reference: &Value) -> Option<Object> {
        match reference {
            Value::String(path) => self.objects.resolve(path),
            other => Some(Object::Value(other.clone())),
        }
    }

    /// Shorthand view over one section: `config.section("testing").get_bool("runtests")`.
    pub fn section<'a>(&'a self, name: &'a str) -> Section<'a> {
        Section { config: self, name }
    }

    /// Re-reads the underlying source.
    ///
    /// # Errors
    /// Propagates the source's load failure; the source has already fallen back to defaults.
    pub fn reload(&mut self) -> Result<()> {
        self.source.reload()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DefaultConfig::default())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "yes" | "true" | "y" => Some(true),
        "no" | "false" | "n" => Some(false),
        _ => None,
    }
}

/// A borrowed view of one configuration section.
pub struct Section<'a> {
    config: &'a Config,
    name: &'a str,
}

impl Section<'_> {
    pub fn get(&self, item: &str) -> Option<Value> {
        self.config.get(self.name, item)
    }

    pub fn get_bool(&self, item: &str) -> Option<bool> {
        self.config.get_bool(self.name, item)
    }

    pub fn get_list(&self, item: &str) -> Option<Vec<Value>> {
        self.config.get_list(self.name, item)
    }
}
