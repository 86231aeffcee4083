//! Test cases and the handles used to configure them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::diagnostics::{DectestError, Result};
use crate::sideeffects::{Expectations, SideEffectVerifier, VerifierKind};
use crate::state::Instance;
use crate::suite::tested::Original;
use crate::value::{Args, Value};

/// Active verifier kinds of a suite, keyed by attachment name.
pub(crate) type ActiveVerifiers = Rc<RefCell<HashMap<String, VerifierKind>>>;

/// Whether a case targets a free function or a method.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseKind {
    Function,
    /// The receiver is captured from the first real call, or set explicitly.
    Method { receiver: Option<Instance> },
}

/// One registered test: a name, a bound target, an expected input/output pair and any
/// attached side-effect verifiers.
pub struct TestCase {
    name: String,
    kind: CaseKind,
    target: Option<Rc<Original>>,
    input: Args,
    output: Value,
    verifiers: Vec<Box<dyn SideEffectVerifier>>,
    has_run: bool,
}

impl TestCase {
    pub(crate) fn new(name: &str, kind: CaseKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: None,
            input: Args::new(),
            output: Value::Nil,
            verifiers: Vec::new(),
            has_run: false,
        }
    }
}

/// Everything needed to run a case once, taken out of the case so that no borrow is held while
/// the target runs.
pub(crate) struct Prepared {
    pub target: Rc<Original>,
    pub args: Args,
    pub expected: Value,
    pub receiver: Option<Instance>,
    pub verifiers: Vec<Box<dyn SideEffectVerifier>>,
}

/// Why a case could not be prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unprepared {
    Unbound,
    MissingReceiver,
}

/// Shared handle to a registered [`TestCase`].
///
/// ```rust
/// use dectest::{args, TestSuite, Value};
///
/// let suite = TestSuite::new("doc");
/// let _double = suite.register("doubles").apply(|args| {
///     Ok(Value::Int(args.get(0).and_then(Value::as_int).unwrap_or(0) * 2))
/// });
/// suite.case("doubles").unwrap().input(args![4]).out(8);
/// assert!(suite.case("halves").is_err());
/// ```
#[derive(Clone)]
pub struct CaseRef {
    case: Rc<RefCell<TestCase>>,
    active: ActiveVerifiers,
}

impl CaseRef {
    pub(crate) fn new(case: TestCase, active: ActiveVerifiers) -> Self {
        Self {
            case: Rc::new(RefCell::new(case)),
            active,
        }
    }

    pub fn name(&self) -> String {
        self.case.borrow().name.clone()
    }

    /// Sets the arguments the case calls its target with.
    pub fn input(&self, args: Args) -> &Self {
        self.case.borrow_mut().input = args;
        self
    }

    /// Sets the return value the case expects.
    pub fn out(&self, expected: impl Into<Value>) -> &Self {
        self.case.borrow_mut().output = expected.into();
        self
    }

    /// Attaches a side-effect verifier by its attachment name.
    ///
    /// # Errors
    /// [`DectestError::UnknownVerifier`] if no verifier of that name is active in the suite.
    pub fn attach(&self, verifier: &str, expectations: Expectations) -> Result<&Self> {
        let kind = self.active.borrow().get(verifier).copied();
        let Some(kind) = kind else {
            return Err(DectestError::UnknownVerifier {
                case: self.name(),
                verifier: verifier.to_string(),
            });
        };
        self.case.borrow_mut().verifiers.push(kind.armed(expectations));
        Ok(self)
    }

    /// Supplies the receiver for a method case explicitly, so it can run in batch mode before
    /// any real call. Ignored for function cases.
    pub fn with_receiver(&self, receiver: Instance) -> &Self {
        if let CaseKind::Method { receiver: slot } = &mut self.case.borrow_mut().kind {
            *slot = Some(receiver);
        }
        self
    }

    pub fn expected_input(&self) -> Args {
        self.case.borrow().input.clone()
    }

    pub fn expected_output(&self) -> Value {
        self.case.borrow().output.clone()
    }

    pub fn kind(&self) -> CaseKind {
        self.case.borrow().kind.clone()
    }

    pub fn receiver(&self) -> Option<Instance> {
        match &self.case.borrow().kind {
            CaseKind::Method { receiver } => receiver.clone(),
            CaseKind::Function => None,
        }
    }

    pub fn verifier_names(&self) -> Vec<String> {
        self.case
            .borrow()
            .verifiers
            .iter()
            .map(|v| v.name().to_string())
            .collect()
    }

    pub fn is_bound(&self) -> bool {
        self.case.borrow().target.is_some()
    }

    /// True once the case has been triggered by a real call.
    pub fn has_run(&self) -> bool {
        self.case.borrow().has_run
    }

    pub(crate) fn bind(&self, target: Rc<Original>) {
        self.case.borrow_mut().target = Some(target);
    }

    pub(crate) fn mark_run(&self) {
        self.case.borrow_mut().has_run = true;
    }

    pub(crate) fn is_method(&self) -> bool {
        matches!(self.case.borrow().kind, CaseKind::Method { .. })
    }

    /// True for a method case that has neither captured nor been given a receiver.
    pub(crate) fn lacks_receiver(&self) -> bool {
        matches!(
            self.case.borrow().kind,
            CaseKind::Method { receiver: None }
        )
    }

    /// Records the receiver of the first observed call. An earlier receiver is kept.
    pub(crate) fn capture_receiver(&self, receiver: &Instance) {
        if let CaseKind::Method { receiver: slot } = &mut self.case.borrow_mut().kind {
            slot.get_or_insert_with(|| receiver.clone());
        }
    }

    /// Takes out what a run needs. The verifiers must be handed back with [`CaseRef::restore`].
    pub(crate) fn prepare(&self) -> std::result::Result<Prepared, Unprepared> {
        let mut case = self.case.borrow_mut();
        let target = case.target.clone().ok_or(Unprepared::Unbound)?;
        let (args, receiver) = match &case.kind {
            CaseKind::Function => (case.input.clone(), None),
            CaseKind::Method { receiver: None } => return Err(Unprepared::MissingReceiver),
            CaseKind::Method {
                receiver: Some(receiver),
            } => (
                case.input.prepended(Value::Object(receiver.clone())),
                Some(receiver.clone()),
            ),
        };
        Ok(Prepared {
            target,
            args,
            expected: case.output.clone(),
            receiver,
            verifiers: mem::take(&mut case.verifiers),
        })
    }

    pub(crate) fn restore(&self, verifiers: Vec<Box<dyn SideEffectVerifier>>) {
        self.case.borrow_mut().verifiers = verifiers;
    }
}

impl fmt::Debug for CaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let case = self.case.borrow();
        f.debug_struct("CaseRef")
            .field("name", &case.name)
            .field("kind", &case.kind)
            .field("input", &case.input)
            .field("output", &case.output)
            .field("verifiers", &case.verifiers.len())
            .field("bound", &case.target.is_some())
            .finish()
    }
}
