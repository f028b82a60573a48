//! End-to-end style function scenarios

use stylescript_bridge::ScriptContext;
use stylescript_foundation::{Feature, FilterKey, GeometryType};

#[test]
fn filter_follows_active_feature() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return feature.name == 'park' }"));

    let park = Feature::new(1).with_prop("name", "park");
    let road = Feature::new(2).with_prop("name", "road");

    let mut scope = ctx.set_current_feature(&park);
    assert!(scope.evaluate_boolean_function(0));
    scope.set_current_feature(&road);
    assert!(!scope.evaluate_boolean_function(0));
}

#[test]
fn zoom_converts_to_integer() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(1, "function() { return $zoom }"));
    ctx.set_filter_key(FilterKey::Zoom, 12);

    let result = ctx.function_result(1).expect("evaluates");
    assert_eq!(result.to_int(&ctx), 12);
}

#[test]
fn missing_property_is_undefined_and_false() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(2, "function() { return feature.missing }"));
    let feature = Feature::new(3).with_prop("name", "lake");

    let mut scope = ctx.set_current_feature(&feature);
    let result = scope.function_result(2).expect("evaluates");
    assert!(result.is_undefined(&scope));
    scope.pop();
    assert!(!scope.evaluate_boolean_function(2));
}

#[test]
fn second_registration_wins() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(4, "function() { return 'first' }"));
    assert!(ctx.set_function(4, "function() { return 'second' }"));

    let result = ctx.function_result(4).expect("evaluates");
    assert_eq!(result.to_string(&ctx), "second");
}

#[test]
fn width_function_uses_every_argument() {
    let mut ctx = ScriptContext::new();
    let global = ctx.new_object();
    let base = ctx.new_number(1.5);
    assert!(global.set_value_for_property(&mut ctx, "base", base));
    assert!(ctx.set_global_value("global", global));

    assert!(ctx.set_function(
        0,
        "function() {
            var w = feature.lanes * global.base;
            if ($geometry != line) { return 0 }
            return $zoom >= 15 ? w * 2 : w;
        }"
    ));
    ctx.set_filter_key(FilterKey::Geometry, GeometryType::Lines.code());

    let road = Feature::new(1).with_prop("lanes", 2);
    for (zoom, expected) in [(12, 3.0), (16, 6.0)] {
        let mut scope = ctx.set_current_feature(&road);
        scope.set_filter_key(FilterKey::Zoom, zoom);
        let result = scope.function_result(0).expect("evaluates");
        assert!((result.to_double(&scope) - expected).abs() < f64::EPSILON);
        scope.pop();
    }

    ctx.set_filter_key(FilterKey::Geometry, GeometryType::Polygons.code());
    let result = ctx.function_result(0).expect("evaluates");
    assert_eq!(result.to_int(&ctx), 0);
}

#[test]
fn helpers_defined_by_eval_are_callable() {
    let mut ctx = ScriptContext::new();
    ctx.eval("function label(f) { return f.name + ' (' + f.kind + ')' }")
        .expect("defines helper");
    assert!(ctx.set_function(0, "function() { return label(feature) }"));

    let feature = Feature::new(9).with_prop("name", "Elm").with_prop("kind", "park");
    let mut scope = ctx.set_current_feature(&feature);
    let result = scope.function_result(0).expect("evaluates");
    assert_eq!(result.to_string(&scope), "Elm (park)");
}
