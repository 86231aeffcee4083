//! # Test suites
//!
//! A [`TestSuite`] holds named test cases, each bound to a function through a [`Decorator`].
//! Cases run in two ways:
//!
//! - **Batch**: [`TestSuite::test`] runs every case in registration order and reports a summary.
//! - **Lazy**: when `testing.testasrun` is on, the first real call of a decorated function runs
//!   that function's cases before the call proceeds.
//!
//! `testing.runtests = false` turns both off.
//!
//! ## Running one case
//!
//! 1. the `testing.pretest` hook, if configured;
//! 2. `pre_check` on every attached verifier;
//! 3. the undecorated function, called with the case's input (the receiver first, for methods);
//! 4. the return value compared with the expected output;
//! 5. `check` on every attached verifier;
//! 6. the `testing.posttest` hook, if configured.
//!
//! The case passes when the output matched and every verifier passed. Errors from the function
//! abort the run and propagate to the caller.
//!
//! ```rust
//! use dectest::{args, BufferReporter, TestSuite, Value};
//!
//! let out = BufferReporter::new();
//! let suite = TestSuite::builder("arith").reporter(out.clone()).build();
//! let add = suite.register("adds").apply(|args| {
//!     let a = args.get(0).and_then(Value::as_int).unwrap_or(0);
//!     let b = args.get(1).and_then(Value::as_int).unwrap_or(0);
//!     Ok(Value::Int(a + b))
//! });
//! suite.case("adds").unwrap().input(args![1, 2]).out(3);
//!
//! let report = suite.test().unwrap();
//! assert!(report.all_passed());
//! assert!(out.contents().ends_with("All tests passed successfully\n"));
//! assert_eq!(add.call(args![2, 2]).unwrap(), Value::Int(4));
//! ```

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{keys, Config, Object};
use crate::diagnostics::{DectestError, Result};
use crate::output::{ConsoleReporter, Reporter, RunMode, SharedReporter};
use crate::sideeffects::{Scope, SideEffectVerifier, VerifierKind};
use crate::state::Globals;
use crate::value::{Args, Value};

pub mod case;
pub mod tested;

pub use case::{CaseKind, CaseRef, TestCase};
pub use tested::{Decorator, FunctionId, TargetFn, TestedFn};

use case::{ActiveVerifiers, Prepared, Unprepared};
use tested::Original;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
}

/// Results of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub outcomes: Vec<CaseOutcome>,
    pub passed: usize,
    pub failed: usize,
}

impl SuiteReport {
    fn new(suite: &str) -> Self {
        Self {
            suite: suite.to_string(),
            outcomes: Vec::new(),
            passed: 0,
            failed: 0,
        }
    }

    fn record(&mut self, name: String, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(CaseOutcome { name, passed });
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Number of cases that ran.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, name: &str) -> Option<bool> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.name == name)
            .map(|outcome| outcome.passed)
    }
}

// ============================================================================
// SUITE
// ============================================================================

#[derive(Default)]
struct Binding {
    cases: Vec<CaseRef>,
    has_run: bool,
}

struct SuiteInner {
    name: String,
    config: RefCell<Config>,
    globals: Globals,
    reporter: SharedReporter,
    active: ActiveVerifiers,
    cases: RefCell<Vec<CaseRef>>,
    index: RefCell<HashMap<String, CaseRef>>,
    bindings: RefCell<HashMap<FunctionId, Binding>>,
    run_tests: Cell<bool>,
    test_as_run: Cell<bool>,
}

/// Shared handle to a named collection of test cases.
#[derive(Clone)]
pub struct TestSuite {
    inner: Rc<SuiteInner>,
}

/// Builder for [`TestSuite`].
pub struct SuiteBuilder {
    name: String,
    config: Option<Config>,
    globals: Option<Globals>,
    reporter: Option<SharedReporter>,
}

impl SuiteBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// The global store that `globalstatechange` observes and hosts mutate.
    pub fn globals(mut self, globals: Globals) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Some(SharedReporter::new(reporter));
        self
    }

    pub fn shared_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> TestSuite {
        let suite = TestSuite {
            inner: Rc::new(SuiteInner {
                name: self.name,
                config: RefCell::new(self.config.unwrap_or_default()),
                globals: self.globals.unwrap_or_default(),
                reporter: self
                    .reporter
                    .unwrap_or_else(|| SharedReporter::new(ConsoleReporter::new())),
                active: ActiveVerifiers::default(),
                cases: RefCell::new(Vec::new()),
                index: RefCell::new(HashMap::new()),
                bindings: RefCell::new(HashMap::new()),
                run_tests: Cell::new(true),
                test_as_run: Cell::new(true),
            }),
        };
        suite.apply_config();
        suite
    }
}

impl TestSuite {
    /// A suite with the default configuration, a fresh global store and console output.
    pub fn new(name: &str) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: &str) -> SuiteBuilder {
        SuiteBuilder {
            name: name.to_string(),
            config: None,
            globals: None,
            reporter: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn globals(&self) -> &Globals {
        &self.inner.globals
    }

    pub fn config(&self) -> Ref<'_, Config> {
        self.inner.config.borrow()
    }

    /// False when `testing.runtests` turned the suite off.
    pub fn runs_tests(&self) -> bool {
        self.inner.run_tests.get()
    }

    /// Makes a verifier kind attachable to this suite's cases under its name.
    pub fn activate_verifier(&self, kind: VerifierKind) {
        debug!(target: "dectest", suite = %self.inner.name, verifier = kind.name(), "verifier activated");
        self.inner
            .active
            .borrow_mut()
            .insert(kind.name().to_string(), kind);
    }

    pub fn active_verifiers(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .inner
            .active
            .borrow()
            .values()
            .map(VerifierKind::name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Re-reads the configuration source and applies it again. Verifiers activated earlier stay
    /// active.
    ///
    /// # Errors
    /// The source's load failure. The configuration is applied even then, using whatever the
    /// source fell back to.
    pub fn reload_config(&self) -> Result<()> {
        let reloaded = self.inner.config.borrow_mut().reload();
        self.apply_config();
        reloaded
    }

    fn apply_config(&self) {
        let (kinds, run_tests, test_as_run) = {
            let config = self.inner.config.borrow();
            let testing = config.section(keys::TESTING);
            let mut kinds = Vec::new();
            for reference in testing.get_list(keys::SIDE_EFFECTS).unwrap_or_default() {
                match config.get_object(&reference) {
                    Some(Object::Verifier(kind)) => kinds.push(kind),
                    _ => warn!(
                        target: "dectest",
                        suite = %self.inner.name,
                        verifier = %reference,
                        "Could not find side effect verifier"
                    ),
                }
            }
            (
                kinds,
                testing.get_bool(keys::RUN_TESTS).unwrap_or(true),
                testing.get_bool(keys::TEST_AS_RUN).unwrap_or(true),
            )
        };

        for kind in kinds {
            self.activate_verifier(kind);
        }
        self.inner.run_tests.set(run_tests);
        self.inner.test_as_run.set(test_as_run);
    }

    /// False when `testing.testasrun` turned lazy runs off.
    pub fn tests_as_run(&self) -> bool {
        self.inner.test_as_run.get()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Registers a test case for a free function.
    pub fn register(&self, name: &str) -> Decorator {
        self.register_case(name, CaseKind::Function)
    }

    /// Registers a test case for a method. The receiver is captured from the first positional
    /// argument of the first real call.
    pub fn register_method(&self, name: &str) -> Decorator {
        self.register_case(name, CaseKind::Method { receiver: None })
    }

    fn register_case(&self, name: &str, kind: CaseKind) -> Decorator {
        if self.inner.index.borrow().contains_key(name) {
            warn!(target: "dectest", suite = %self.inner.name, case = name, "Cannot register the same test case twice");
            return Decorator::pass_through();
        }

        let case = CaseRef::new(TestCase::new(name, kind), Rc::clone(&self.inner.active));
        self.inner.cases.borrow_mut().push(case.clone());
        self.inner
            .index
            .borrow_mut()
            .insert(name.to_string(), case.clone());
        Decorator::binding(self.clone(), case)
    }

    pub(crate) fn bind(&self, case: &CaseRef, original: &Rc<Original>) {
        case.bind(Rc::clone(original));
        self.inner
            .bindings
            .borrow_mut()
            .entry(original.id())
            .or_default()
            .cases
            .push(case.clone());
    }

    /// Looks up a registered case.
    ///
    /// # Errors
    /// [`DectestError::UnknownTestCase`] if no case of that name was registered.
    pub fn case(&self, name: &str) -> Result<CaseRef> {
        self.inner
            .index
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| DectestError::UnknownTestCase {
                name: name.to_string(),
            })
    }

    /// Case names in registration order.
    pub fn case_names(&self) -> Vec<String> {
        self.inner.cases.borrow().iter().map(CaseRef::name).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.cases.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cases.borrow().is_empty()
    }

    /// True once `function`'s cases have been triggered by a real call.
    pub fn has_run(&self, function: &TestedFn) -> bool {
        self.inner
            .bindings
            .borrow()
            .get(&function.id())
            .is_some_and(|binding| binding.has_run)
    }

    // ------------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------------

    /// Runs every case in registration order and reports the results.
    ///
    /// Returns an empty report, and reports nothing, when the suite is turned off. Cases never
    /// bound to a function count as failures.
    ///
    /// # Errors
    /// The first error raised by a function under test, or by a verifier protocol violation.
    pub fn test(&self) -> Result<SuiteReport> {
        let mut report = SuiteReport::new(&self.inner.name);
        if !self.runs_tests() {
            debug!(target: "dectest", suite = %self.inner.name, "runtests is off; batch run skipped");
            return Ok(report);
        }

        self.inner.reporter.suite_started(&self.inner.name);
        let cases = self.inner.cases.borrow().clone();
        for case in cases {
            let name = case.name();
            let passed = self.run_case(&case)?;
            self.inner.reporter.case_finished(&name, passed, RunMode::Batch);
            report.record(name, passed);
        }
        self.inner
            .reporter
            .suite_finished(report.passed, report.failed);
        Ok(report)
    }

    /// Call hook of a decorated function: runs its cases on the first qualifying call.
    pub(crate) fn on_call(&self, original: &Original, args: &Args) -> Result<()> {
        let cases = {
            let mut bindings = self.inner.bindings.borrow_mut();
            let Some(binding) = bindings.get_mut(&original.id()) else {
                return Ok(());
            };
            if binding.has_run || !self.runs_tests() || !self.tests_as_run() {
                return Ok(());
            }
            match args.receiver() {
                Some(receiver) => {
                    for case in binding.cases.iter().filter(|case| case.is_method()) {
                        case.capture_receiver(receiver);
                    }
                }
                None if binding.cases.iter().any(CaseRef::lacks_receiver) => {
                    warn!(
                        target: "dectest",
                        suite = %self.inner.name,
                        function = original.label(),
                        "Method called without a receiver; its test cases are deferred"
                    );
                    return Ok(());
                }
                None => {}
            }
            // Latched before running so calls made by the cases themselves do not re-trigger.
            binding.has_run = true;
            binding.cases.clone()
        };

        for case in cases {
            let name = case.name();
            let passed = self.run_case(&case)?;
            case.mark_run();
            self.inner.reporter.case_finished(&name, passed, RunMode::Lazy);
        }
        Ok(())
    }

    fn run_case(&self, case: &CaseRef) -> Result<bool> {
        let name = case.name();
        let Prepared {
            target,
            args,
            expected,
            receiver,
            mut verifiers,
        } = match case.prepare() {
            Ok(prepared) => prepared,
            Err(Unprepared::Unbound) => {
                warn!(target: "dectest", suite = %self.inner.name, case = %name, "Test case was never bound to a function");
                return Ok(false);
            }
            Err(Unprepared::MissingReceiver) => {
                warn!(target: "dectest", suite = %self.inner.name, case = %name, "Method test case has no receiver yet");
                return Ok(false);
            }
        };

        self.run_hook(keys::PRE_TEST, "Pre-test callback was not callable");
        let scope = Scope {
            globals: &self.inner.globals,
            receiver: receiver.as_ref(),
        };
        let outcome = exercise(&name, &target, &args, &expected, &scope, &mut verifiers);
        case.restore(verifiers);
        let passed = outcome?;
        self.run_hook(keys::POST_TEST, "Post-test callback was not callable");

        debug!(target: "dectest", suite = %self.inner.name, case = %name, passed, "test case finished");
        Ok(passed)
    }

    fn run_hook(&self, item: &str, not_callable: &str) {
        let hook = {
            let config = self.inner.config.borrow();
            let Some(reference) = config
                .get(keys::TESTING, item)
                .filter(Value::is_truthy)
            else {
                return;
            };
            let object = config.get_object(&reference);
            match object {
                Some(Object::Hook(hook)) => hook,
                _ => {
                    warn!(target: "dectest", suite = %self.inner.name, hook = %reference, "{}", not_callable);
                    return;
                }
            }
        };
        hook.call();
    }
}

/// Calls the target between the verifier captures and evaluations.
fn exercise(
    name: &str,
    target: &Original,
    args: &Args,
    expected: &Value,
    scope: &Scope<'_>,
    verifiers: &mut [Box<dyn SideEffectVerifier>],
) -> Result<bool> {
    for verifier in verifiers.iter_mut() {
        verifier.pre_check(scope)?;
    }

    let actual = target
        .invoke(args)
        .map_err(|source| DectestError::target(name, source))?;
    let mut passed = actual == *expected;
    if !passed {
        debug!(target: "dectest", case = name, %expected, %actual, "return value mismatch");
    }

    for verifier in verifiers.iter_mut() {
        passed &= verifier.check(scope)?;
    }
    Ok(passed)
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuite")
            .field("name", &self.inner.name)
            .field("cases", &self.case_names())
            .field("verifiers", &self.active_verifiers())
            .field("runtests", &self.runs_tests())
            .finish()
    }
}
