//! Test-as-you-run: cases triggered by the first real call of a decorated function.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use dectest::config::{ConfigSource, ConfigStore};
use dectest::{args, Config, Instance, TestSuite, TestedFn, Value};

fn increment_method(suite: &TestSuite, name: &str) -> TestedFn {
    suite.register_method(name).apply(|args| {
        let Some(receiver) = args.receiver() else {
            return Err("missing receiver".into());
        };
        let count = receiver.get_attr("count").and_then(|v| v.as_int()).unwrap_or(0);
        receiver.set_attr("count", count + int_arg(args, 1));
        Ok(Value::Int(count + int_arg(args, 1)))
    })
}

/// A configuration source that counts how often its store is read.
struct CountingSource {
    store: ConfigStore,
    reads: Rc<Cell<usize>>,
}

impl ConfigSource for CountingSource {
    fn store(&self) -> &ConfigStore {
        self.reads.set(self.reads.get() + 1);
        &self.store
    }
}

#[cfg(test)]
mod trigger_tests {
    use super::*;

    #[test]
    fn test_first_call_runs_cases_once() {
        let (suite, out) = default_suite("lazy");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);

        for _ in 0..3 {
            assert_eq!(add.call(args![10, 5]).unwrap(), Value::Int(15));
        }
        assert_eq!(lazy_lines(&out), vec!["Test case adds passed".to_string()]);
        assert_eq!(calls.get(), 4);
        assert!(suite.has_run(&add));
        assert!(suite.case("adds").unwrap().has_run());
    }

    #[test]
    fn test_failing_case_does_not_change_real_result() {
        let (suite, out) = default_suite("lazy");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(4);

        assert_eq!(add.call(args![1, 2]).unwrap(), Value::Int(3));
        assert_eq!(lazy_lines(&out), vec!["Test case adds failed".to_string()]);
    }

    #[test]
    fn test_only_cases_of_the_called_function_run() {
        let (suite, out) = default_suite("lazy");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        let _other = register_add(&suite, "untouched", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);
        suite.case("untouched").unwrap().input(args![1, 2]).out(3);

        add.call(args![0, 0]).unwrap();
        assert_eq!(lazy_lines(&out), vec!["Test case adds passed".to_string()]);
    }

    #[test]
    fn test_all_cases_of_a_function_run_together() {
        let (suite, out) = default_suite("lazy");
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "small", &calls);
        let add = suite.register("large").decorate(add);
        suite.case("small").unwrap().input(args![1, 1]).out(2);
        suite.case("large").unwrap().input(args![50, 50]).out(100);

        add.call(args![0, 0]).unwrap();
        assert_eq!(
            lazy_lines(&out),
            vec![
                "Test case small passed".to_string(),
                "Test case large passed".to_string(),
            ]
        );
    }

    #[test]
    fn test_testasrun_off_is_pass_through() {
        let config = testing_config(&[("testasrun", Value::Bool(false))]);
        let (suite, out) = buffered("lazy", config);
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);

        assert_eq!(add.call(args![2, 2]).unwrap(), Value::Int(4));
        assert!(out.is_empty());
        assert!(!suite.has_run(&add));
        assert!(suite.test().unwrap().all_passed());
    }

    #[test]
    fn test_calls_after_the_run_read_no_configuration() {
        let reads = Rc::new(Cell::new(0));
        let source = CountingSource {
            store: ConfigStore::new(),
            reads: Rc::clone(&reads),
        };
        let (suite, out) = buffered("lazy", Config::new(source));
        let calls = Rc::new(Cell::new(0));
        let add = register_add(&suite, "adds", &calls);
        suite.case("adds").unwrap().input(args![1, 2]).out(3);

        add.call(args![1, 1]).unwrap();
        assert_eq!(lazy_lines(&out), vec!["Test case adds passed".to_string()]);
        let after_first = reads.get();
        for _ in 0..1000 {
            add.call(args![1, 1]).unwrap();
        }
        assert_eq!(reads.get(), after_first);
        assert_eq!(calls.get(), 1002);
    }

    #[test]
    fn test_recursive_call_during_own_run_passes_through() {
        let (suite, out) = default_suite("lazy");
        let slot: Rc<RefCell<Option<TestedFn>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&slot);
        let factorial = suite.register("factorial").apply(move |args| {
            let n = int_arg(args, 0);
            if n <= 1 {
                return Ok(Value::Int(1));
            }
            let recurse = inner.borrow().clone().ok_or("not wired")?;
            let rest = recurse.call(args![n - 1])?;
            Ok(Value::Int(n * rest.as_int().unwrap_or(0)))
        });
        *slot.borrow_mut() = Some(factorial.clone());
        suite.case("factorial").unwrap().input(args![4]).out(24);

        assert_eq!(factorial.call(args![5]).unwrap(), Value::Int(120));
        assert_eq!(lazy_lines(&out), vec!["Test case factorial passed".to_string()]);
        slot.borrow_mut().take();
    }

    #[test]
    fn test_error_during_lazy_run_aborts_the_call() {
        let (suite, _out) = default_suite("lazy");
        let divide = suite.register("divides").apply(|args| {
            let divisor = int_arg(args, 1);
            if divisor == 0 {
                return Err("division by zero".into());
            }
            Ok(Value::Int(int_arg(args, 0) / divisor))
        });
        suite.case("divides").unwrap().input(args![1, 0]).out(0);

        let err = divide.call(args![6, 3]).unwrap_err();
        assert!(err.is_target());
        assert_eq!(divide.call(args![6, 3]).unwrap(), Value::Int(2));
    }
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn test_receiver_captured_from_first_call() {
        let (suite, out) = default_suite("methods");
        let increment = increment_method(&suite, "increments");
        suite.case("increments").unwrap().input(args![2]).out(3);

        let counter = Instance::new("Counter").with_attr("count", 1);
        let result = increment.call(args![counter.clone(), 5]).unwrap();

        // The case ran first against the same receiver: 1 + 2 = 3, then the real call 3 + 5.
        assert_eq!(lazy_lines(&out), vec!["Test case increments passed".to_string()]);
        assert_eq!(result, Value::Int(8));
        assert_eq!(counter.get_attr("count"), Some(Value::Int(8)));
        assert!(suite
            .case("increments")
            .unwrap()
            .receiver()
            .is_some_and(|r| r.ptr_eq(&counter)));
    }

    #[test]
    fn test_call_without_receiver_defers_the_run() {
        let (suite, out) = default_suite("methods");
        let increment = increment_method(&suite, "increments");
        suite.case("increments").unwrap().input(args![1]).out(1);

        assert!(increment.call(args![1, 1]).is_err());
        assert!(out.is_empty());
        assert!(!suite.has_run(&increment));

        let counter = Instance::new("Counter").with_attr("count", 0);
        increment.call(args![counter, 1]).unwrap();
        assert_eq!(lazy_lines(&out), vec!["Test case increments passed".to_string()]);
    }

    #[test]
    fn test_supplied_receiver_lets_any_call_trigger() {
        let (suite, out) = default_suite("methods");
        let increment = increment_method(&suite, "increments");
        let counter = Instance::new("Counter").with_attr("count", 0);
        suite
            .case("increments")
            .unwrap()
            .with_receiver(counter.clone())
            .input(args![1])
            .out(1);

        assert!(increment.call(args![1]).is_err());
        assert!(suite.has_run(&increment));
        assert_eq!(lazy_lines(&out), vec!["Test case increments passed".to_string()]);
        assert_eq!(counter.get_attr("count"), Some(Value::Int(1)));
    }

    #[test]
    fn test_batch_needs_a_receiver() {
        let (suite, out) = default_suite("methods");
        let _increment = increment_method(&suite, "increments");
        let case = suite.case("increments").unwrap();
        case.input(args![2]).out(2);

        assert_eq!(suite.test().unwrap().failed, 1);

        out.clear();
        case.with_receiver(Instance::new("Counter").with_attr("count", 0));
        assert!(suite.test().unwrap().all_passed());
        assert_eq!(marker_line(&out), ".");
    }
}
