//! Decorator-style unit testing: cases are declared on the functions they test and run either
//! in a batch pass or the first time each function is really called.
//!
//! See [`suite`] for the execution model, [`sideeffects`] for verifiers and [`config`] for the
//! settings that control both.

pub use crate::config::Config;
pub use crate::diagnostics::{BoxError, DectestError, Result};
pub use crate::output::{BufferReporter, ConsoleReporter, JsonReporter, NullReporter, Reporter};
pub use crate::sideeffects::Expectations;
pub use crate::state::{Globals, Instance};
pub use crate::suite::{CaseRef, SuiteReport, TestSuite, TestedFn};
pub use crate::value::{Args, Value};

pub mod config;
pub mod diagnostics;
pub mod output;
pub mod sideeffects;
pub mod state;
pub mod suite;
pub mod value;
