//! Report sinks driven by real suite runs.

mod common;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use common::*;
use dectest::output::{JsonReporter, SharedReporter};
use dectest::{args, TestSuite, Value};

/// A writer whose bytes stay readable after the reporter is handed to a suite.
#[derive(Clone, Default)]
struct SharedBytes(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBytes {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn events(bytes: &SharedBytes) -> Vec<serde_json::Value> {
    let text = String::from_utf8(bytes.0.borrow().clone()).unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[cfg(test)]
mod json_tests {
    use super::*;

    #[test]
    fn test_batch_run_emits_one_event_per_step() {
        let bytes = SharedBytes::default();
        let suite = TestSuite::builder("json")
            .reporter(JsonReporter::new(bytes.clone()))
            .build();
        let _ok = suite.register("ok").apply(|_| Ok(Value::Int(1)));
        let _bad = suite.register("bad").apply(|_| Ok(Value::Int(2)));
        suite.case("ok").unwrap().out(1);
        suite.case("bad").unwrap().out(3);

        suite.test().unwrap();
        let events = events(&bytes);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["event"], "suite_started");
        assert_eq!(events[0]["suite"], "json");
        assert_eq!(events[1]["case"], "ok");
        assert_eq!(events[1]["mode"], "batch");
        assert_eq!(events[2]["passed"], false);
        assert_eq!(events[3]["event"], "suite_finished");
        assert_eq!(events[3]["failed"], 1);
    }

    #[test]
    fn test_lazy_run_emits_case_events_only() {
        let bytes = SharedBytes::default();
        let suite = TestSuite::builder("json")
            .shared_reporter(SharedReporter::new(JsonReporter::new(bytes.clone())))
            .build();
        let double = suite
            .register("doubles")
            .apply(|args| Ok(Value::Int(int_arg(args, 0) * 2)));
        suite.case("doubles").unwrap().input(args![2]).out(4);

        double.call(args![5]).unwrap();
        let events = events(&bytes);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "case_finished");
        assert_eq!(events[0]["mode"], "lazy");
    }

    #[test]
    fn test_suite_report_serializes() {
        let (suite, _out) = default_suite("report");
        let _f = suite.register("f").apply(|_| Ok(Value::Nil));
        let report = suite.test().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["suite"], "report");
        assert_eq!(json["passed"], 1);
        assert_eq!(json["outcomes"][0]["name"], "f");
    }
}

#[cfg(test)]
mod shared_sink_tests {
    use super::*;

    #[test]
    fn test_two_suites_share_one_buffer() {
        let out = dectest::BufferReporter::new();
        let sink = SharedReporter::new(out.clone());
        let first = TestSuite::builder("first").shared_reporter(sink.clone()).build();
        let second = TestSuite::builder("second").shared_reporter(sink).build();

        first.test().unwrap();
        second.test().unwrap();
        let banners: Vec<String> = out
            .lines()
            .into_iter()
            .filter(|line| line.starts_with("Test Suite"))
            .collect();
        assert_eq!(banners, vec!["Test Suite 'first'", "Test Suite 'second'"]);
    }
}
