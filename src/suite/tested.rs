//! Decorated functions.
//!
//! A [`Decorator`] binds a function to a test case and returns a [`TestedFn`]: a callable that
//! behaves exactly like the function, except that its first real call may run the function's
//! test cases first. Decorating an already decorated function binds the underlying function, so
//! stacked registrations all test the same code while every layer still gets its call hook.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diagnostics::{BoxError, DectestError, Result};
use crate::suite::case::CaseRef;
use crate::suite::TestSuite;
use crate::value::{Args, Value};

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Signature of a function under test.
pub type TargetFn = dyn Fn(&Args) -> Result<Value, BoxError>;

/// Identity of an undecorated function, shared by every layer wrapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u64);

impl FunctionId {
    fn next() -> Self {
        FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The undecorated function.
pub(crate) struct Original {
    id: FunctionId,
    label: String,
    func: Box<TargetFn>,
}

impl Original {
    pub(crate) fn id(&self) -> FunctionId {
        self.id
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn invoke(&self, args: &Args) -> Result<Value, BoxError> {
        (self.func)(args)
    }
}

#[derive(Clone)]
enum Layer {
    Original,
    Wrapped(Box<TestedFn>),
}

/// A function wrapped by one or more test suites.
#[derive(Clone)]
pub struct TestedFn {
    original: Rc<Original>,
    layer: Layer,
    suite: Option<TestSuite>,
}

impl TestedFn {
    /// Wraps `func` without registering it with any suite.
    pub fn new<F>(label: &str, func: F) -> Self
    where
        F: Fn(&Args) -> Result<Value, BoxError> + 'static,
    {
        Self {
            original: Rc::new(Original {
                id: FunctionId::next(),
                label: label.to_string(),
                func: Box::new(func),
            }),
            layer: Layer::Original,
            suite: None,
        }
    }

    pub fn id(&self) -> FunctionId {
        self.original.id()
    }

    /// Name used when the function's own errors are reported.
    pub fn label(&self) -> &str {
        self.original.label()
    }

    /// Calls the function.
    ///
    /// The first call may run the function's test cases before the real call; their results go
    /// to the suite's reporter and never change what this call returns.
    ///
    /// # Errors
    /// [`DectestError::Target`] if the function, or the function while under test, fails.
    pub fn call(&self, args: Args) -> Result<Value> {
        if let Some(suite) = &self.suite {
            suite.on_call(&self.original, &args)?;
        }
        match &self.layer {
            Layer::Original => self
                .original
                .invoke(&args)
                .map_err(|source| DectestError::target(self.original.label(), source)),
            Layer::Wrapped(inner) => inner.call(args),
        }
    }

    /// Number of suites wrapping the function.
    pub fn depth(&self) -> usize {
        let own = usize::from(self.suite.is_some());
        match &self.layer {
            Layer::Original => own,
            Layer::Wrapped(inner) => own + inner.depth(),
        }
    }
}

impl fmt::Debug for TestedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestedFn")
            .field("label", &self.original.label)
            .field("id", &self.original.id)
            .field("depth", &self.depth())
            .finish()
    }
}

/// Returned by [`TestSuite::register`]; binds a function to the registered case.
///
/// A rejected duplicate registration yields a pass-through decorator that hands back what it
/// is given.
#[must_use = "a decorator does nothing until applied"]
pub struct Decorator {
    binding: Option<(TestSuite, CaseRef)>,
}

impl Decorator {
    pub(crate) fn binding(suite: TestSuite, case: CaseRef) -> Self {
        Self {
            binding: Some((suite, case)),
        }
    }

    pub(crate) fn pass_through() -> Self {
        Self { binding: None }
    }

    pub fn is_pass_through(&self) -> bool {
        self.binding.is_none()
    }

    /// Decorates a plain function.
    pub fn apply<F>(self, func: F) -> TestedFn
    where
        F: Fn(&Args) -> Result<Value, BoxError> + 'static,
    {
        let label = match &self.binding {
            Some((_, case)) => case.name(),
            None => "anonymous".to_string(),
        };
        self.decorate(TestedFn::new(&label, func))
    }

    /// Decorates an already wrapped function. The case is bound to the undecorated function.
    pub fn decorate(self, tested: TestedFn) -> TestedFn {
        let Some((suite, case)) = self.binding else {
            return tested;
        };
        let original = Rc::clone(&tested.original);
        suite.bind(&case, &original);

        let bare = tested.suite.is_none() && matches!(tested.layer, Layer::Original);
        let layer = if bare {
            Layer::Original
        } else {
            Layer::Wrapped(Box::new(tested))
        };
        TestedFn {
            original,
            layer,
            suite: Some(suite),
        }
    }
}
