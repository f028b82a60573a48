//! Stack discipline across evaluations

use stylescript_bridge::{ContextConfig, ScriptContext};
use stylescript_foundation::{Feature, FilterKey};
use stylescript_language::Value;

fn road(i: u64) -> Feature {
    Feature::new(i)
        .with_prop("kind", if i % 3 == 0 { "motorway" } else { "residential" })
        .with_prop("lanes", i32::try_from(i % 5).unwrap_or_default())
        .with_prop("name", format!("street {i}"))
}

#[test]
fn stack_depth_is_invariant_over_mixed_evaluations() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return feature.kind == 'motorway' }"));
    assert!(ctx.set_function(1, "function() { return feature.lanes * $zoom }"));
    assert!(ctx.set_function(2, "function() { return feature.name.toUpperCase() }"));
    assert!(ctx.set_function(3, "function() { return feature.nothing.at.all }"));
    assert!(ctx.set_function(4, "function() { throw 'style error' }"));
    assert!(!ctx.set_function(5, "function() {"));
    ctx.set_filter_key(FilterKey::Zoom, 14);

    let features: Vec<Feature> = (0..50).map(road).collect();
    let before = ctx.stack_depth();

    for n in 0..10_000usize {
        let feature = &features[n % features.len()];
        let mut scope = ctx.set_current_feature(feature);
        match n % 7 {
            0 => {
                let _ = scope.evaluate_boolean_function(0);
            }
            1 | 2 => {
                if scope.evaluate_function(n % 7) {
                    scope.pop();
                }
            }
            3 => assert!(!scope.evaluate_function(3)),
            4 => assert!(!scope.evaluate_boolean_function(4)),
            5 => assert!(!scope.evaluate_function(5)),
            _ => assert!(!scope.evaluate_function(100 + n)),
        }
        assert_eq!(scope.stack_depth(), before, "evaluation {n}");
    }
}

#[test]
fn scope_marker_rolls_back_temporaries() {
    let mut ctx = ScriptContext::new();
    let marker = ctx.get_scope_marker();
    for i in 0..100 {
        let _ = ctx.new_number(f64::from(i));
        let _ = ctx.new_string("temp");
    }
    assert_eq!(ctx.stack_depth(), marker.depth() + 200);
    ctx.reset_to_scope_marker(marker);
    assert_eq!(ctx.stack_depth(), marker.depth());
}

#[test]
fn results_stack_until_popped() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return 1 }"));
    assert!(ctx.set_function(1, "function() { return 2 }"));

    let first = ctx.function_result(0).expect("first");
    let second = ctx.function_result(1).expect("second");
    assert_eq!(ctx.stack_depth(), 2);
    assert_eq!(first.to_int(&ctx), 1);
    assert_eq!(second.to_int(&ctx), 2);
    assert_eq!(ctx.get_stack_top_value(), Some(second));
    assert_eq!(ctx.pop(), Some(Value::Number(2.0)));
    assert_eq!(ctx.pop(), Some(Value::Number(1.0)));
    assert_eq!(ctx.pop(), None);
}

#[test]
fn garbage_collection_preserves_registered_functions() {
    let mut ctx = ScriptContext::with_config(ContextConfig::new().with_gc_threshold(16));
    assert!(ctx.set_function(
        0,
        "function() { var o = { kind: feature.kind }; o.me = o; return [o.kind, o.me.kind].join('=') }"
    ));
    let feature = Feature::new(1).with_prop("kind", "rail");
    let mut scope = ctx.set_current_feature(&feature);
    for _ in 0..500 {
        let result = scope.function_result(0).expect("evaluates");
        assert_eq!(result.to_string(&scope), "rail=rail");
        scope.pop();
    }
    assert!(scope.vm().heap_stats().collections > 0);
}

#[test]
fn deep_recursion_fails_without_leaking() {
    let mut ctx = ScriptContext::with_config(ContextConfig::new().with_max_call_depth(64));
    ctx.eval("function down(n) { return down(n + 1) }").expect("defines");
    assert!(ctx.set_function(0, "function() { return down(0) }"));
    assert!(!ctx.evaluate_function(0));
    assert_eq!(ctx.stack_depth(), 0);
    assert!(ctx.set_function(1, "function() { return 'alive' }"));
    assert!(ctx.evaluate_function(1));
}
