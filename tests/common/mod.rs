//! Shared helpers for the dectest integration suites.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use dectest::config::DictConfig;
use dectest::{Args, BufferReporter, Config, TestSuite, TestedFn, Value};

/// A suite writing to a buffer, with the given configuration.
pub fn buffered(name: &str, config: Config) -> (TestSuite, BufferReporter) {
    let out = BufferReporter::new();
    let suite = TestSuite::builder(name)
        .config(config)
        .reporter(out.clone())
        .build();
    (suite, out)
}

/// A suite writing to a buffer, with default configuration.
pub fn default_suite(name: &str) -> (TestSuite, BufferReporter) {
    buffered(name, Config::default())
}

/// Configuration with `testing.<item> = value` set for each pair.
pub fn testing_config(items: &[(&str, Value)]) -> Config {
    let mut source = DictConfig::new();
    for (item, value) in items {
        source.set("testing", item, value.clone());
    }
    Config::new(source)
}

pub fn int_arg(args: &Args, index: usize) -> i64 {
    args.get(index).and_then(Value::as_int).unwrap_or(0)
}

/// Registers `add(a, b) -> a + b` under `name`, counting real invocations of the body.
pub fn register_add(suite: &TestSuite, name: &str, calls: &Rc<Cell<usize>>) -> TestedFn {
    let calls = Rc::clone(calls);
    suite.register(name).apply(move |args| {
        calls.set(calls.get() + 1);
        Ok(Value::Int(int_arg(args, 0) + int_arg(args, 1)))
    })
}

/// Lines of the buffer that report a lazy result.
pub fn lazy_lines(out: &BufferReporter) -> Vec<String> {
    out.lines()
        .into_iter()
        .filter(|line| line.starts_with("Test case "))
        .collect()
}

/// The `.`/`f` marker line of a batch run.
pub fn marker_line(out: &BufferReporter) -> String {
    out.lines().get(2).cloned().unwrap_or_default()
}
