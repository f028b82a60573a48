//! Integration tests for the VM embedding API
//!
//! Tests evaluation, the value stack, host objects, and the heap.

use stylescript_language::{HostContext, NoHost, Value, Vm, VmConfig};

fn eval(source: &str) -> Value {
    Vm::new().eval(source, &mut NoHost).expect("eval failed")
}

/// Host answering reads of object 1 from a fixed list.
struct FixedHost(&'static [(&'static str, f64)]);

impl HostContext for FixedHost {
    fn get(&mut self, object: u32, key: &str) -> Value {
        if object != 1 {
            return Value::Undefined;
        }
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(Value::Undefined, |(_, v)| Value::Number(*v))
    }

    fn has(&mut self, object: u32, key: &str) -> bool {
        object == 1 && self.0.iter().any(|(k, _)| *k == key)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

#[test]
fn eval_returns_last_expression() {
    assert_eq!(eval("var x = 2; x * 21"), Value::Number(42.0));
    assert_eq!(eval("var x = 2"), Value::Undefined);
}

#[test]
fn eval_style_expressions() {
    assert_eq!(eval("Math.max(1, 4) + Math.floor(2.7)"), Value::Number(6.0));
    assert_eq!(eval("'Main Street'.toUpperCase()"), Value::from("MAIN STREET"));
    assert_eq!(eval("[1, 2, 3].join('-')"), Value::from("1-2-3"));
    assert_eq!(eval("typeof undeclared"), Value::from("undefined"));
    assert_eq!(eval("(12.345).toFixed(1)"), Value::from("12.3"));
    assert_eq!(eval("parseInt('42px')"), Value::Number(42.0));
}

#[test]
fn eval_closures_and_recursion() {
    let source = "
        function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2) }
        var counter = (function() { var n = 0; return function() { return ++n } })();
        counter(); counter();
        fib(10) + counter()
    ";
    assert_eq!(eval(source), Value::Number(58.0));
}

#[test]
fn eval_errors_carry_names() {
    let mut vm = Vm::new();
    let err = vm.eval("null.x", &mut NoHost).expect_err("type error");
    assert_eq!(err.name(), "TypeError");
    let err = vm.eval("missing + 1", &mut NoHost).expect_err("reference error");
    assert_eq!(err.name(), "ReferenceError");
    let err = vm.eval("throw 'nope'", &mut NoHost).expect_err("thrown");
    assert_eq!(err.to_string(), "nope");
}

#[test]
fn call_depth_is_bounded() {
    let mut vm = Vm::with_config(VmConfig::default().with_max_call_depth(32));
    let err = vm
        .eval("function f() { return f() } f()", &mut NoHost)
        .expect_err("too deep");
    assert_eq!(err.name(), "RangeError");
    assert_eq!(vm.stack_len(), 0);
}

// =============================================================================
// Embedding API
// =============================================================================

#[test]
fn compiled_functions_take_arguments() {
    let mut vm = Vm::new();
    let func = vm
        .compile_function("function(feature, $zoom) { return feature.width * $zoom }")
        .expect("compile");
    let feature = vm.new_host_object(1);
    let mut host = FixedHost(&[("width", 3.0)]);
    let result = vm
        .call_value(func, &[feature, Value::from(4)], &mut host)
        .expect("call");
    assert_eq!(result, Value::Number(12.0));
}

#[test]
fn call_failure_restores_stack() {
    let mut vm = Vm::new();
    vm.push(Value::from("keep"));
    let func = vm
        .compile_function("function() { return undefined.x }")
        .expect("compile");
    vm.push(func);
    assert!(vm.call(0, &mut NoHost).is_err());
    assert_eq!(vm.stack_len(), 1);
    assert_eq!(vm.top(), Some(&Value::from("keep")));
}

#[test]
fn host_objects_answer_in() {
    let mut vm = Vm::new();
    let feature = vm.new_host_object(1);
    vm.set_global("feature", feature);
    let mut host = FixedHost(&[("lanes", 2.0)]);
    assert_eq!(
        vm.eval("('lanes' in feature) && !('name' in feature)", &mut host)
            .expect("eval"),
        Value::Bool(true)
    );
}

#[test]
fn stash_is_invisible_to_scripts() {
    let mut vm = Vm::new();
    vm.stash_put("functions", Value::from(1));
    assert!(vm.eval("functions", &mut NoHost).is_err());
    assert!(vm.stash_get("functions").is_some());
}

#[test]
fn garbage_collection_keeps_stashed_values() {
    let mut vm = Vm::new();
    let anchored = vm.new_array(Vec::new());
    vm.stash_put("anchor", anchored);
    vm.eval("var a = {}; a.self = a; a = null", &mut NoHost)
        .expect("eval");
    vm.collect_garbage();
    assert!(vm.stash_get("anchor").is_some());
    assert!(vm.heap_stats().collections >= 1);
}
