//! # Side-effect verifiers
//!
//! A side-effect verifier inspects observable state before and after a call, independently of
//! the function's return value. Verifiers follow a small protocol:
//!
//! 1. **Unbound**: freshly constructed by a [`VerifierKind`].
//! 2. **Armed**: [`SideEffectVerifier::arm`] stored the expectations declared on the test case.
//! 3. **Captured**: [`SideEffectVerifier::pre_check`] snapshotted every expected observable.
//! 4. **Evaluated**: [`SideEffectVerifier::check`] compared the post-call state.
//!
//! Arming happens once, when the verifier is attached to a case; capture and evaluation happen
//! on every run of that case. Calling `check` without a fresh capture is rejected.
//!
//! ## Expectations
//!
//! Each expectation maps an observable name to either a literal value (the post-call state must
//! equal it) or a predicate over `(before, after)`.
//!
//! ```rust
//! use dectest::sideeffects::Expectations;
//! use dectest::value::Value;
//!
//! let exp = Expectations::new()
//!     .equals("x", 5)
//!     .satisfies("calls", |before, after| {
//!         after.as_int() == before.as_int().map(|n| n + 1)
//!     });
//! assert_eq!(exp.names(), vec!["x", "calls"]);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::diagnostics::Result;
use crate::state::{Globals, Instance};
use crate::value::Value;

pub mod state_change;

pub use state_change::{
    GlobalScope, GlobalStateChange, InstanceStateChange, ObservedScope, ReceiverScope,
    StateChange, GLOBAL_STATE_CHANGE, INSTANCE_STATE_CHANGE,
};

/// Predicate over the observed value before and after the call.
pub type Predicate = Rc<dyn Fn(&Value, &Value) -> bool>;

// ============================================================================
// EXPECTATIONS
// ============================================================================

/// What a verifier expects of one observable after the call.
#[derive(Clone)]
pub enum Expectation {
    Equals(Value),
    Predicate(Predicate),
}

impl Expectation {
    /// Evaluates this expectation against the captured `before` and observed `after` values.
    pub fn holds(&self, before: &Value, after: &Value) -> bool {
        match self {
            Expectation::Equals(expected) => expected == after,
            Expectation::Predicate(predicate) => predicate(before, after),
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            Expectation::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Ordered mapping from observable names to expectations.
#[derive(Clone, Debug, Default)]
pub struct Expectations(Vec<(String, Expectation)>);

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `name` to equal `value` after the call.
    pub fn equals(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(name, Expectation::Equals(value.into()))
    }

    /// Expect `predicate(before, after)` to hold for `name`.
    pub fn satisfies<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        self.with(name, Expectation::Predicate(Rc::new(predicate)))
    }

    /// Adds or replaces the expectation for `name`, keeping declaration order.
    pub fn with(mut self, name: impl Into<String>, expectation: Expectation) -> Self {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = expectation,
            None => self.0.push((name, expectation)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expectation)> {
        self.0.iter().map(|(name, exp)| (name.as_str(), exp))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// VERIFIER PROTOCOL
// ============================================================================

/// The state a verifier can observe during one run of a test case.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub globals: &'a Globals,
    /// The captured receiver; `None` for plain function cases.
    pub receiver: Option<&'a Instance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierPhase {
    Unbound,
    Armed,
    Captured,
    Evaluated,
}

/// Pluggable check of a call's side effects.
pub trait SideEffectVerifier {
    /// The name the verifier is attached under.
    fn name(&self) -> &str;

    fn phase(&self) -> VerifierPhase;

    /// Stores the expectations declared on the test case.
    fn arm(&mut self, expectations: Expectations);

    /// Snapshots the observables before the call. A missing observable is recorded as a
    /// failed precondition, not an error.
    ///
    /// # Errors
    /// Returns [`DectestError::NotArmed`](crate::DectestError::NotArmed) if no expectations
    /// were ever stored.
    fn pre_check(&mut self, scope: &Scope<'_>) -> Result<()>;

    /// Compares the post-call state with the expectations.
    ///
    /// # Errors
    /// Returns [`DectestError::NotCaptured`](crate::DectestError::NotCaptured) unless a
    /// `pre_check` immediately preceded this call.
    fn check(&mut self, scope: &Scope<'_>) -> Result<bool>;
}

/// Factory for one verifier type. Its name is the key used to attach it to a test case.
#[derive(Clone, Copy)]
pub struct VerifierKind {
    name: &'static str,
    construct: fn() -> Box<dyn SideEffectVerifier>,
}

impl VerifierKind {
    pub const fn new(name: &'static str, construct: fn() -> Box<dyn SideEffectVerifier>) -> Self {
        Self { name, construct }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Constructs a fresh, unbound verifier.
    pub fn instantiate(&self) -> Box<dyn SideEffectVerifier> {
        (self.construct)()
    }

    /// Constructs a fresh verifier and arms it.
    pub fn armed(&self, expectations: Expectations) -> Box<dyn SideEffectVerifier> {
        let mut verifier = self.instantiate();
        verifier.arm(expectations);
        verifier
    }
}

impl fmt::Debug for VerifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifierKind").field(&self.name).finish()
    }
}

impl PartialEq for VerifierKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// The verifiers shipped with the crate.
pub fn builtin_verifiers() -> [VerifierKind; 2] {
    [GLOBAL_STATE_CHANGE, INSTANCE_STATE_CHANGE]
}
