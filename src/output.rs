//! Handles all result reporting for test suites.
//!
//! Results travel on their own channel, separate from the `tracing` warnings: a suite emits
//! structured [`Reporter`] events and the sink decides how to render them. The console format
//! is:
//!
//! ```text
//! Test Suite 'arith'
//! ================================================================================
//! ..f
//! ================================================================================
//! 1 test failed
//! ```
//!
//! for a batch run, and one `Test case <name> passed|failed` line per case for a lazy run.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::warn;

/// Width of the `=` rules around a batch run.
pub const RULE_WIDTH: usize = 80;

/// How a case came to be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Explicit `TestSuite::test` pass over every registered case.
    Batch,
    /// Triggered by the first real call of a decorated function.
    Lazy,
}

/// Sink for suite results.
pub trait Reporter {
    /// A batch run is starting.
    fn suite_started(&mut self, suite: &str);
    fn case_finished(&mut self, case: &str, passed: bool, mode: RunMode);
    /// A batch run finished.
    fn suite_finished(&mut self, passed: usize, failed: usize);
}

// ============================================================================
// TEXT RENDERING
// ============================================================================

pub fn banner(suite: &str) -> String {
    format!("Test Suite '{}'", suite)
}

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn case_marker(passed: bool) -> &'static str {
    if passed {
        "."
    } else {
        "f"
    }
}

pub fn case_line(case: &str, passed: bool) -> String {
    format!(
        "Test case {} {}",
        case,
        if passed { "passed" } else { "failed" }
    )
}

pub fn summary(failed: usize) -> String {
    match failed {
        0 => "All tests passed successfully".to_string(),
        1 => "1 test failed".to_string(),
        n => format!("{} tests failed", n),
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Ergonomic wrapper for a shared, mutable reporter.
#[derive(Clone)]
pub struct SharedReporter(pub Rc<RefCell<dyn Reporter>>);

impl SharedReporter {
    pub fn new<T: Reporter + 'static>(sink: T) -> Self {
        SharedReporter(Rc::new(RefCell::new(sink)))
    }

    pub fn suite_started(&self, suite: &str) {
        self.0.borrow_mut().suite_started(suite);
    }

    pub fn case_finished(&self, case: &str, passed: bool, mode: RunMode) {
        self.0.borrow_mut().case_finished(case, passed, mode);
    }

    pub fn suite_finished(&self, passed: usize, failed: usize) {
        self.0.borrow_mut().suite_finished(passed, failed);
    }
}

impl<T: Reporter + 'static> From<Rc<RefCell<T>>> for SharedReporter {
    fn from(sink: Rc<RefCell<T>>) -> Self {
        SharedReporter(sink)
    }
}

/// Discards everything.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn suite_started(&mut self, _suite: &str) {}
    fn case_finished(&mut self, _case: &str, _passed: bool, _mode: RunMode) {}
    fn suite_finished(&mut self, _passed: usize, _failed: usize) {}
}

/// Writes the console format to stdout, colouring markers when stdout is a terminal.
pub struct ConsoleReporter {
    stdout: StandardStream,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    fn colored(&mut self, text: &str, color: Color) {
        let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(color)));
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn suite_started(&mut self, suite: &str) {
        let _ = writeln!(self.stdout, "{}", banner(suite));
        let _ = writeln!(self.stdout, "{}", rule());
    }

    fn case_finished(&mut self, case: &str, passed: bool, mode: RunMode) {
        let color = if passed { Color::Green } else { Color::Red };
        match mode {
            RunMode::Batch => {
                self.colored(case_marker(passed), color);
                let _ = self.stdout.flush();
            }
            RunMode::Lazy => {
                let _ = write!(self.stdout, "Test case {} ", case);
                self.colored(if passed { "passed" } else { "failed" }, color);
                let _ = writeln!(self.stdout);
            }
        }
    }

    fn suite_finished(&mut self, _passed: usize, failed: usize) {
        let _ = writeln!(self.stdout);
        let _ = writeln!(self.stdout, "{}", rule());
        let _ = writeln!(self.stdout, "{}", summary(failed));
    }
}

/// Collects the console format into a string, for tests or programmatic capture.
///
/// Clones share the same buffer, so a suite can own one clone while the caller reads another.
#[derive(Clone, Default)]
pub struct BufferReporter(Rc<RefCell<String>>);

impl BufferReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().lines().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, text: &str) {
        self.0.borrow_mut().push_str(text);
    }
}

impl Reporter for BufferReporter {
    fn suite_started(&mut self, suite: &str) {
        self.push(&format!("{}\n{}\n", banner(suite), rule()));
    }

    fn case_finished(&mut self, case: &str, passed: bool, mode: RunMode) {
        match mode {
            RunMode::Batch => self.push(case_marker(passed)),
            RunMode::Lazy => self.push(&format!("{}\n", case_line(case, passed))),
        }
    }

    fn suite_finished(&mut self, _passed: usize, failed: usize) {
        self.push(&format!("\n{}\n{}\n", rule(), summary(failed)));
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ReportEvent<'a> {
    SuiteStarted {
        suite: &'a str,
    },
    CaseFinished {
        case: &'a str,
        passed: bool,
        mode: RunMode,
    },
    SuiteFinished {
        passed: usize,
        failed: usize,
    },
}

/// Writes one JSON object per event, newline separated.
pub struct JsonReporter<W: Write> {
    writer: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, event: &ReportEvent<'_>) {
        let written = serde_json::to_writer(&mut self.writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.writer));
        if let Err(err) = written {
            warn!(target: "dectest", error = %err, "Could not write report event");
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn suite_started(&mut self, suite: &str) {
        self.emit(&ReportEvent::SuiteStarted { suite });
    }

    fn case_finished(&mut self, case: &str, passed: bool, mode: RunMode) {
        self.emit(&ReportEvent::CaseFinished { case, passed, mode });
    }

    fn suite_finished(&mut self, passed: usize, failed: usize) {
        self.emit(&ReportEvent::SuiteFinished { passed, failed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_wording() {
        assert_eq!(summary(0), "All tests passed successfully");
        assert_eq!(summary(1), "1 test failed");
        assert_eq!(summary(3), "3 tests failed");
    }

    #[test]
    fn test_buffer_renders_batch_format() {
        let buffer = BufferReporter::new();
        let mut sink = buffer.clone();
        sink.suite_started("arith");
        sink.case_finished("a", true, RunMode::Batch);
        sink.case_finished("b", false, RunMode::Batch);
        sink.suite_finished(1, 1);
        assert_eq!(
            buffer.lines(),
            vec![
                "Test Suite 'arith'".to_string(),
                rule(),
                ".f".to_string(),
                rule(),
                "1 test failed".to_string(),
            ]
        );
    }

    #[test]
    fn test_buffer_renders_lazy_lines() {
        let buffer = BufferReporter::new();
        let mut sink = buffer.clone();
        sink.case_finished("adds", true, RunMode::Lazy);
        assert_eq!(buffer.contents(), "Test case adds passed\n");
    }

    #[test]
    fn test_json_reporter_emits_tagged_events() {
        let mut sink = JsonReporter::new(Vec::new());
        sink.case_finished("adds", false, RunMode::Lazy);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let event: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(event["event"], "case_finished");
        assert_eq!(event["case"], "adds");
        assert_eq!(event["passed"], false);
        assert_eq!(event["mode"], "lazy");
    }
}
