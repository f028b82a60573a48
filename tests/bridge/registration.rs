//! Function registration contracts

use stylescript_bridge::{ContextConfig, ContextFlags, ScriptContext};
use stylescript_foundation::ErrorKind;

#[test]
fn failed_reregistration_invalidates_previous_function() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(3, "function() { return 1 }"));
    assert!(!ctx.set_function(3, "function() { return 1 +"));

    assert!(!ctx.evaluate_function(3));
    assert!(ctx.function_result(3).is_none());
    assert!(matches!(
        ctx.registry().get(3).map_err(|e| e.kind),
        Err(ErrorKind::FunctionNotSet { index: 3 })
    ));
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn failures_leave_other_indices_callable() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return 'zero' }"));
    assert!(ctx.set_function(1, "function() { return 'one' }"));
    assert!(!ctx.set_function(2, "function() { return"));
    assert!(!ctx.set_function(7, "var notAFunction = 1"));
    assert!(!ctx.set_function(1, "function( {"));

    let zero = ctx.function_result(0).expect("zero");
    assert_eq!(zero.to_string(&ctx), "zero");
    ctx.pop();
    assert!(!ctx.evaluate_function(1));
    assert_eq!(ctx.registry().len(), 8);
}

#[test]
fn evaluating_past_registry_fails_cleanly() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(1, "function() { return true }"));
    let size = ctx.registry().len();

    for index in [size, size + 10, usize::MAX] {
        assert!(!ctx.evaluate_function(index));
        assert!(!ctx.evaluate_boolean_function(index));
    }
    assert!(!ctx.evaluate_function(0));
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn registry_bound_rejects_large_indices() {
    let mut ctx = ScriptContext::with_config(ContextConfig::new().with_max_functions(8));
    assert!(!ctx.set_function(8, "function() { return 1 }"));
    assert!(ctx.set_function(7, "function() { return 1 }"));
    assert_eq!(ctx.registry().len(), 8);
}

#[test]
fn flags_follow_substring_scan() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return $zoom }"));
    assert!(ctx.set_function(1, "function() { /* feature */ return 'global' }"));
    assert!(ctx.set_function(2, "function() { return 1 }"));

    let flags = |ctx: &ScriptContext, i| ctx.registry().get(i).map(|f| f.flags).ok();
    assert_eq!(flags(&ctx, 0), Some(ContextFlags::ZOOM));
    assert_eq!(flags(&ctx, 1), Some(ContextFlags::GLOBAL | ContextFlags::FEATURE));
    assert_eq!(flags(&ctx, 2), Some(ContextFlags::empty()));
}

#[test]
fn spliced_source_is_recorded() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return feature.kind + $geometry }"));
    let source = ctx.registry().get(0).map(|f| f.source.clone()).ok();
    assert_eq!(
        source.as_deref(),
        Some("function(feature,$geometry) { return feature.kind + $geometry }")
    );
}

#[test]
fn registered_function_without_context_arguments() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return Math.PI > 3 }"));
    assert!(ctx.evaluate_boolean_function(0));
}
