//! Observable state: the global store and receiver instances that side-effect verifiers inspect.
//!
//! ## Handles
//!
//! - [`Globals`] plays the role of process-wide global variables. A suite owns one handle;
//!   functions under test clone it and mutate it.
//! - [`Instance`] is a receiver object for method test cases: a class name plus named
//!   attributes. Two instances are equal only if they are the same object.
//!
//! Names are flat: `"stats.calls"` is one name, not a path into a `stats` map.
//!
//! Both are cheap `Rc` handles. The harness is single-threaded, so interior mutability is
//! `RefCell`; no borrow is ever held across a call into user code.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use im::HashMap;

use crate::value::Value;

/// Values by name. Clones share structure, so a verifier's before-snapshot is cheap.
pub type Observables = HashMap<String, Value>;

/// Minimal lookup interface shared by every scope a verifier can observe.
pub trait StateContext {
    /// Returns a copy of the observable called `name`, if present.
    fn lookup(&self, name: &str) -> Option<Value>;

    fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Human-readable scope name used in warnings.
    fn describe(&self) -> String;
}

// ============================================================================
// GLOBALS
// ============================================================================

/// Shared handle to the global variable store.
#[derive(Clone, Default)]
pub struct Globals(Rc<RefCell<Observables>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.0.borrow_mut().insert(name.to_string(), value.into());
    }

    pub fn del(&self, name: &str) {
        self.0.borrow_mut().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Applies `f` to the current value (nil if absent) and stores the result.
    pub fn update(&self, name: &str, f: impl FnOnce(Value) -> Value) {
        let current = self.get(name).unwrap_or_default();
        let next = f(current);
        self.set(name, next);
    }

    /// True if both handles refer to the same store.
    pub fn same_store(&self, other: &Globals) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl StateContext for Globals {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name)
    }

    fn describe(&self) -> String {
        "globals".to_string()
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Globals").field(&sorted_names(&self.0.borrow())).finish()
    }
}

// ============================================================================
// INSTANCES
// ============================================================================

struct InstanceData {
    class_name: String,
    attributes: Observables,
}

/// Shared handle to a receiver object.
#[derive(Clone)]
pub struct Instance(Rc<RefCell<InstanceData>>);

impl Instance {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(InstanceData {
            class_name: class_name.into(),
            attributes: Observables::new(),
        })))
    }

    /// Builder-style attribute initialisation.
    pub fn with_attr(self, name: &str, value: impl Into<Value>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn class_name(&self) -> String {
        self.0.borrow().class_name.clone()
    }

    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: impl Into<Value>) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.into());
    }

    pub fn del_attr(&self, name: &str) {
        self.0.borrow_mut().attributes.remove(name);
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.0.borrow().attributes.contains_key(name)
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl StateContext for Instance {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get_attr(name)
    }

    fn describe(&self) -> String {
        format!("{} instance", self.class_name())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Instance")
            .field("class_name", &data.class_name)
            .field("attributes", &sorted_names(&data.attributes))
            .finish()
    }
}

fn sorted_names(observables: &Observables) -> Vec<String> {
    let mut names: Vec<String> = observables.keys().cloned().collect();
    names.sort_unstable();
    names
}
