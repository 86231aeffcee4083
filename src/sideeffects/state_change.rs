//! State-change verifiers for globals and receiver attributes.
//!
//! Both variants share one implementation, [`StateChange`], parameterised by the scope it
//! observes. An observable that is absent before the call fails the verifier outright, even if
//! the call would have created it.

use std::collections::HashMap;
use std::marker::PhantomData;

use tracing::debug;

use crate::diagnostics::{DectestError, Result};
use crate::sideeffects::{Expectations, Scope, SideEffectVerifier, VerifierKind, VerifierPhase};
use crate::state::StateContext;
use crate::value::Value;

/// Selects which part of a [`Scope`] a [`StateChange`] observes.
pub trait ObservedScope {
    /// Attachment name of the verifier observing this scope.
    const NAME: &'static str;

    fn select<'a>(scope: &Scope<'a>) -> Option<&'a dyn StateContext>;
}

/// Observes the global store.
pub struct GlobalScope;

impl ObservedScope for GlobalScope {
    const NAME: &'static str = "globalstatechange";

    fn select<'a>(scope: &Scope<'a>) -> Option<&'a dyn StateContext> {
        Some(scope.globals)
    }
}

/// Observes the attributes of the captured receiver.
pub struct ReceiverScope;

impl ObservedScope for ReceiverScope {
    const NAME: &'static str = "instancestatechange";

    fn select<'a>(scope: &Scope<'a>) -> Option<&'a dyn StateContext> {
        scope.receiver.map(|receiver| receiver as &dyn StateContext)
    }
}

pub type GlobalStateChange = StateChange<GlobalScope>;
pub type InstanceStateChange = StateChange<ReceiverScope>;

pub const GLOBAL_STATE_CHANGE: VerifierKind =
    VerifierKind::new(GlobalScope::NAME, GlobalStateChange::boxed);
pub const INSTANCE_STATE_CHANGE: VerifierKind =
    VerifierKind::new(ReceiverScope::NAME, InstanceStateChange::boxed);

/// Verifies that named observables changed as expected across a call.
pub struct StateChange<O> {
    expectations: Option<Expectations>,
    before: HashMap<String, Value>,
    failed_precondition: bool,
    phase: VerifierPhase,
    _scope: PhantomData<fn() -> O>,
}

impl<O: ObservedScope + 'static> StateChange<O> {
    pub fn new() -> Self {
        Self {
            expectations: None,
            before: HashMap::new(),
            failed_precondition: false,
            phase: VerifierPhase::Unbound,
            _scope: PhantomData,
        }
    }

    fn boxed() -> Box<dyn SideEffectVerifier> {
        Box::new(Self::new())
    }

    /// True if an expected observable was missing at the last capture.
    pub fn failed_precondition(&self) -> bool {
        self.failed_precondition
    }

    /// The value captured for `name` at the last `pre_check`.
    pub fn captured(&self, name: &str) -> Option<&Value> {
        self.before.get(name)
    }
}

impl<O: ObservedScope + 'static> Default for StateChange<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ObservedScope + 'static> SideEffectVerifier for StateChange<O> {
    fn name(&self) -> &str {
        O::NAME
    }

    fn phase(&self) -> VerifierPhase {
        self.phase
    }

    fn arm(&mut self, expectations: Expectations) {
        self.expectations = Some(expectations);
        self.phase = VerifierPhase::Armed;
    }

    fn pre_check(&mut self, scope: &Scope<'_>) -> Result<()> {
        let Some(expectations) = self.expectations.as_ref() else {
            return Err(DectestError::NotArmed {
                verifier: O::NAME.to_string(),
            });
        };

        self.before.clear();
        self.failed_precondition = false;

        match O::select(scope) {
            None => {
                debug!(target: "dectest", verifier = O::NAME, "no receiver captured; precondition failed");
                self.failed_precondition = true;
            }
            Some(context) => {
                for (name, _) in expectations.iter() {
                    match context.lookup(name) {
                        Some(value) => {
                            self.before.insert(name.to_string(), value);
                        }
                        None => {
                            debug!(
                                target: "dectest",
                                verifier = O::NAME,
                                observable = name,
                                scope = %context.describe(),
                                "observable missing before call; precondition failed"
                            );
                            self.failed_precondition = true;
                        }
                    }
                }
            }
        }

        self.phase = VerifierPhase::Captured;
        Ok(())
    }

    fn check(&mut self, scope: &Scope<'_>) -> Result<bool> {
        if self.phase != VerifierPhase::Captured {
            return Err(DectestError::NotCaptured {
                verifier: O::NAME.to_string(),
            });
        }
        self.phase = VerifierPhase::Evaluated;

        if self.failed_precondition {
            return Ok(false);
        }
        let (Some(expectations), Some(context)) = (self.expectations.as_ref(), O::select(scope))
        else {
            return Ok(false);
        };

        for (name, expectation) in expectations.iter() {
            let Some(after) = context.lookup(name) else {
                debug!(target: "dectest", verifier = O::NAME, observable = name, "observable vanished during call");
                return Ok(false);
            };
            let before = self.before.get(name).cloned().unwrap_or_default();
            if !expectation.holds(&before, &after) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
