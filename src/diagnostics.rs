//! Dectest error handling.
//!
//! # Overview
//!
//! Every failure the harness itself can produce is a [`DectestError`]. The taxonomy is narrow on
//! purpose: most problems in this crate are *warnings* (missing config, unresolvable hooks,
//! duplicate registrations) and never surface as errors at all. What remains are:
//!
//! - **Lookup failures** for unknown test cases or verifiers accessed through a suite. These are
//!   always programmer errors (a typo or a missing `sideaffects` entry) and must surface at once.
//! - **Protocol violations** on a side-effect verifier (`check` before `pre_check`, or running an
//!   unarmed verifier).
//! - **Target failures**: the function under test returned an error. The harness never converts
//!   these into a failed test; they propagate to whoever triggered the run.
//! - **Config source failures** reported by `FileConfig::reload` after it has already fallen
//!   back to the default table.
//!
//! All variants carry a `miette` diagnostic code so hosts can render them with `miette`'s fancy
//! reporter.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type returned by functions under test.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T, E = DectestError> = std::result::Result<T, E>;

/// Unified error type for all harness failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum DectestError {
    #[error("No test case named '{name}'")]
    #[diagnostic(
        code(dectest::unknown_case),
        help("register the case with `TestSuite::register` before configuring it")
    )]
    UnknownTestCase { name: String },

    #[error("Test case '{case}' has no side-effect verifier named '{verifier}'")]
    #[diagnostic(
        code(dectest::unknown_verifier),
        help("activate the verifier through `testing.sideaffects` or `TestSuite::activate_verifier`")
    )]
    UnknownVerifier { case: String, verifier: String },

    #[error("Verifier '{verifier}' was checked before its pre-call snapshot was taken")]
    #[diagnostic(code(dectest::not_captured))]
    NotCaptured { verifier: String },

    #[error("Verifier '{verifier}' was run without expectations")]
    #[diagnostic(code(dectest::not_armed))]
    NotArmed { verifier: String },

    #[error("Function under test '{name}' failed: {source}")]
    #[diagnostic(code(dectest::target))]
    Target {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Could not read configuration file {}", path.display())]
    #[diagnostic(code(dectest::config_read))]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse configuration file {}", path.display())]
    #[diagnostic(
        code(dectest::config_parse),
        help("the file must be a mapping of section names to mappings of items")
    )]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DectestError {
    /// Wraps an error produced by a function under test.
    pub fn target(name: impl Into<String>, source: BoxError) -> Self {
        DectestError::Target {
            name: name.into(),
            source,
        }
    }

    /// Returns true if this error originated in the function under test rather than the harness.
    pub fn is_target(&self) -> bool {
        matches!(self, DectestError::Target { .. })
    }
}
