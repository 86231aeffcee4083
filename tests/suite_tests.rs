//! Batch execution, registration and configuration of test suites.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use dectest::config::{DictConfig, FileConfig, ObjectRegistry};
use dectest::output::rule;
use dectest::{args, Config, DectestError, TestSuite, Value};

#[cfg(test)]
mod batch_tests {
    use super::*;

    #[test]
    fn test_add_round_trip_passes() {
        let (suite, out) = default_suite("arith");
        let calls = Rc::new(Cell::new(0));
        let _add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);

        let report = suite.test().unwrap();
        assert!(report.all_passed());
        assert_eq!(
            out.lines(),
            vec![
                "Test Suite 'arith'".to_string(),
                rule(),
                ".".to_string(),
                rule(),
                "All tests passed successfully".to_string(),
            ]
        );
    }

    #[test]
    fn test_wrong_expectation_fails_without_changing_real_result() {
        let (suite, out) = default_suite("arith");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(4);

        let report = suite.test().unwrap();
        assert_eq!(report.failed, 1);
        assert!(out.contents().ends_with("1 test failed\n"));
        assert_eq!(add.call(args![1, 2]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_every_entry_reports_one_marker() {
        let (suite, out) = default_suite("many");
        let calls = Rc::new(Cell::new(0));
        let _a = register_add(&suite, "one", &calls);
        let _b = register_add(&suite, "two", &calls);
        let _c = register_add(&suite, "three", &calls);
        suite.case("one").unwrap().input(args![1, 1]).out(2);
        suite.case("two").unwrap().input(args![2, 2]).out(5);
        suite.case("three").unwrap().input(args![3, 3]).out(7);

        let report = suite.test().unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(marker_line(&out), ".ff");
        assert!(out.contents().ends_with("2 tests failed\n"));
    }

    #[test]
    fn test_cases_run_in_registration_order() {
        let (suite, _out) = default_suite("order");
        let seen = Rc::new(RefCell::new(Vec::new()));
        for name in ["c", "a", "b"] {
            let seen = Rc::clone(&seen);
            let label = name.to_string();
            let _f = suite.register(name).apply(move |_| {
                seen.borrow_mut().push(label.clone());
                Ok(Value::Nil)
            });
        }
        suite.test().unwrap();
        assert_eq!(*seen.borrow(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_keyword_arguments_reach_the_target() {
        let (suite, _out) = default_suite("kw");
        let _greet = suite.register("greets").apply(|args| {
            let name = args
                .get_kwarg("name")
                .and_then(Value::as_str)
                .unwrap_or("nobody");
            Ok(Value::from(format!("hello {name}")))
        });
        suite
            .case("greets")
            .unwrap()
            .input(args![].kwarg("name", "ada"))
            .out("hello ada");
        assert!(suite.test().unwrap().all_passed());
    }

    #[test]
    fn test_target_error_propagates() {
        let (suite, out) = default_suite("errors");
        let _f = suite
            .register("explodes")
            .apply(|_| Err("division by zero".into()));

        let err = suite.test().unwrap_err();
        assert!(err.is_target());
        assert!(matches!(err, DectestError::Target { ref name, .. } if name == "explodes"));
        assert!(!out.contents().contains("tests failed"));
    }

    #[test]
    fn test_empty_suite_reports_success() {
        let (suite, out) = default_suite("empty");
        let report = suite.test().unwrap();
        assert!(report.is_empty());
        assert!(out.contents().ends_with("All tests passed successfully\n"));
    }
}

#[cfg(test)]
mod registration_tests {
    use super::*;

    #[test]
    fn test_duplicate_name_keeps_first_entry() {
        let (suite, _out) = default_suite("dup");
        let calls = Rc::new(Cell::new(0));
        let _first = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);

        let second = suite
            .register("adds")
            .apply(|_| Ok(Value::from("replacement")));
        assert_eq!(second.call(args![]).unwrap(), Value::from("replacement"));

        let case = suite.case("adds").unwrap();
        assert_eq!(case.expected_input(), args![1, 2]);
        assert_eq!(case.expected_output(), Value::Int(3));
        assert_eq!(suite.len(), 1);
        assert!(suite.test().unwrap().all_passed());
    }

    #[test]
    fn test_unknown_case_lookup_fails() {
        let (suite, _out) = default_suite("lookup");
        let err = suite.case("nope").unwrap_err();
        assert_eq!(err.to_string(), "No test case named 'nope'");
    }

    #[test]
    fn test_never_bound_case_fails_batch() {
        let (suite, out) = default_suite("unbound");
        let _ = suite.register("forgotten");
        let report = suite.test().unwrap();
        assert_eq!(report.outcome("forgotten"), Some(false));
        assert_eq!(marker_line(&out), "f");
    }

    #[test]
    fn test_one_function_several_cases() {
        let (suite, _out) = default_suite("multi");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "small", &calls);
        let add = suite.register("large").decorate(add);
        suite.case("small").unwrap().input(args![1, 1]).out(2);
        suite.case("large").unwrap().input(args![100, 1]).out(101);

        assert!(suite.test().unwrap().all_passed());
        assert_eq!(add.depth(), 2);
    }
}

#[cfg(test)]
mod config_driven_tests {
    use super::*;

    #[test]
    fn test_runtests_off_silences_batch_and_lazy() {
        let config = testing_config(&[("runtests", Value::from("no"))]);
        let (suite, out) = buffered("off", config);
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(4);

        assert!(suite.test().unwrap().is_empty());
        assert_eq!(add.call(args![5, 6]).unwrap(), Value::Int(11));
        assert!(out.is_empty());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_hooks_wrap_every_case() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut objects = ObjectRegistry::with_builtins();
        let before = Rc::clone(&events);
        objects.register_hook("fixtures.setup", move || before.borrow_mut().push("pre"));
        let after = Rc::clone(&events);
        objects.register_hook("fixtures.teardown", move || after.borrow_mut().push("post"));

        let config = testing_config(&[
            ("pretest", Value::from("fixtures.setup")),
            ("posttest", Value::from("fixtures.teardown")),
        ])
        .with_objects(objects);
        let (suite, _out) = buffered("hooks", config);
        let body = Rc::clone(&events);
        let _f = suite.register("runs").apply(move |_| {
            body.borrow_mut().push("body");
            Ok(Value::Nil)
        });

        suite.test().unwrap();
        assert_eq!(*events.borrow(), vec!["pre", "body", "post"]);
    }

    #[test]
    fn test_unresolvable_hook_is_skipped() {
        let config = testing_config(&[("pretest", Value::from("fixtures.missing"))]);
        let (suite, _out) = buffered("hooks", config);
        let _f = suite.register("runs").apply(|_| Ok(Value::Nil));
        assert!(suite.test().unwrap().all_passed());
    }

    #[test]
    fn test_file_config_and_reload() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "testing:\n  runtests: no\n").unwrap();

        let (suite, _out) = buffered("file", Config::new(FileConfig::open(file.path())));
        assert!(!suite.runs_tests());
        assert!(suite.active_verifiers().is_empty());

        std::fs::write(
            file.path(),
            "testing:\n  runtests: yes\n  sideaffects: dectest.sideeffects.GlobalStateChange\n",
        )
        .unwrap();
        suite.reload_config().unwrap();
        assert!(suite.runs_tests());
        assert_eq!(suite.active_verifiers(), vec!["globalstatechange"]);
    }

    #[test]
    fn test_suites_built_from_dict_config() {
        let config = Config::new(
            DictConfig::new()
                .with("testing", "testasrun", false)
                .with("testing", "sideaffects", vec!["dectest.sideeffects.InstanceStateChange"]),
        );
        let suite = TestSuite::builder("dict").config(config).build();
        assert_eq!(suite.active_verifiers(), vec!["instancestatechange"]);
        assert_eq!(suite.config().get_bool("testing", "testasrun"), Some(false));
    }
}
