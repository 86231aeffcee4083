//! Explicit registry of named objects that configuration can refer to by dotted path.
//!
//! Configuration names hooks and verifiers as strings such as
//! `"dectest.sideeffects.GlobalStateChange"`. Instead of reflecting over loaded code, the host
//! application registers every object it wants to make addressable, grouped into *modules*
//! (namespaces keyed by a dotted module path).
//!
//! ## Resolution
//!
//! A path is split into a module prefix and an attribute suffix. The longest registered module
//! prefix wins: resolution starts with everything but the last segment as the module, and moves
//! segments from the module into the attribute path until a module is found. The remaining
//! attribute path is then walked through nested namespaces.
//!
//! ```rust
//! use dectest::config::{Namespace, Object, ObjectRegistry};
//! use dectest::value::Value;
//!
//! let mut registry = ObjectRegistry::new();
//! registry.register_module(
//!     "app.settings",
//!     Namespace::new().with("Limits", Object::Namespace(Namespace::new().with("max", Object::Value(Value::Int(3))))),
//! );
//! assert!(registry.resolve("app.settings.Limits.max").is_some());
//! assert!(registry.resolve("app.settings.Limits.min").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::sideeffects::{builtin_verifiers, VerifierKind};
use crate::config::DottedPath;
use crate::value::Value;

/// Module path under which the built-in verifiers are registered.
pub const BUILTIN_MODULE: &str = "dectest.sideeffects";

// ============================================================================
// OBJECTS
// ============================================================================

/// A zero-argument callable, used for the pre-test and post-test hooks.
#[derive(Clone)]
pub struct Hook(Rc<dyn Fn()>);

impl Hook {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// Anything a dotted path can resolve to.
#[derive(Clone, Debug)]
pub enum Object {
    Namespace(Namespace),
    Hook(Hook),
    Verifier(VerifierKind),
    Value(Value),
}

impl Object {
    pub fn as_verifier(&self) -> Option<VerifierKind> {
        match self {
            Object::Verifier(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// A named collection of objects: a module, or a class-like container inside one.
#[derive(Clone, Debug, Default)]
pub struct Namespace(HashMap<String, Object>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, object: Object) -> Self {
        self.insert(name, object);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, object: Object) {
        self.0.insert(name.into(), object);
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct ObjectRegistry {
    modules: HashMap<String, Namespace>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in verifiers under [`BUILTIN_MODULE`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            &format!("{BUILTIN_MODULE}.GlobalStateChange"),
            Object::Verifier(builtin_verifiers()[0]),
        );
        registry.register(
            &format!("{BUILTIN_MODULE}.InstanceStateChange"),
            Object::Verifier(builtin_verifiers()[1]),
        );
        registry
    }

    /// Registers `object` at `path`; the last segment is the attribute name inside the module
    /// named by the rest. Returns false (and logs) for single-segment paths.
    pub fn register(&mut self, path: &str, object: Object) -> bool {
        let dotted = DottedPath::parse(path);
        let Some((module, attribute)) = dotted.split_last().filter(|(m, _)| !m.is_empty()) else {
            warn!(target: "dectest", path, "Cannot register object at a path without a module");
            return false;
        };
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(attribute, object);
        true
    }

    pub fn register_hook(&mut self, path: &str, hook: impl Fn() + 'static) -> bool {
        self.register(path, Object::Hook(Hook::new(hook)))
    }

    pub fn register_verifier(&mut self, path: &str, kind: VerifierKind) -> bool {
        self.register(path, Object::Verifier(kind))
    }

    /// Registers (or replaces) a whole module.
    pub fn register_module(&mut self, path: &str, namespace: Namespace) {
        self.modules.insert(path.to_string(), namespace);
    }

    /// Resolves a dotted path to a registered object. Every failure is a warning and `None`.
    pub fn resolve(&self, name: &str) -> Option<Object> {
        let path = DottedPath::parse(name);
        if path.len() < 2 {
            warn!(target: "dectest", path = name, "Invalid dotted path");
            return None;
        }

        let mut module_path = path.0.clone();
        let mut attribute_path = Vec::new();
        if let Some(last) = module_path.pop() {
            attribute_path.push(last);
        }

        let namespace = loop {
            if module_path.is_empty() {
                warn!(target: "dectest", path = name, "Could not find module for dotted path");
                return None;
            }
            if let Some(namespace) = self.modules.get(&module_path.join(".")) {
                break namespace;
            }
            if let Some(segment) = module_path.pop() {
                attribute_path.insert(0, segment);
            }
        };

        let mut attributes = attribute_path.iter();
        let mut current = attributes.next().and_then(|first| namespace.get(first));
        for attribute in attributes {
            current = match current {
                Some(Object::Namespace(inner)) => inner.get(attribute),
                _ => None,
            };
        }

        if current.is_none() {
            warn!(target: "dectest", path = name, "Could not find attribute for dotted path");
        }
        current.cloned()
    }
}
