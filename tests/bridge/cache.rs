//! Property cache behavior through the context and directly

use proptest::prelude::*;
use stylescript_bridge::{CACHE_CAPACITY, PropertyCache, ScriptContext};
use stylescript_foundation::{Feature, Properties};

#[test]
fn many_keys_read_correctly_after_overflow() {
    let keys = CACHE_CAPACITY * 2 + 3;
    let feature = (0..keys).fold(Feature::new(1), |f, i| {
        f.with_prop(format!("p{i}"), i32::try_from(i).unwrap_or_default())
    });
    let reads: Vec<String> = (0..keys).chain(0..keys).map(|i| format!("feature.p{i}")).collect();
    let source = format!("function() {{ return {} }}", reads.join(" + "));

    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, &source));
    let mut scope = ctx.set_current_feature(&feature);
    let result = scope.function_result(0).expect("evaluates");
    let expected: usize = (0..keys).sum::<usize>() * 2;
    assert_eq!(result.to_int(&scope), i32::try_from(expected).unwrap_or_default());
}

#[test]
fn switching_features_isolates_values() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return feature.name + '/' + feature.lanes }"));
    let features = [
        Feature::new(1).with_prop("name", "a").with_prop("lanes", 1),
        Feature::new(2).with_prop("name", "b"),
        Feature::new(3).with_prop("lanes", 3),
    ];
    let expected = ["a/1", "b/undefined", "undefined/3"];

    for _ in 0..3 {
        for (feature, want) in features.iter().zip(expected) {
            let mut scope = ctx.set_current_feature(feature);
            let result = scope.function_result(0).expect("evaluates");
            assert_eq!(result.to_string(&scope), want);
        }
    }
}

#[test]
fn in_reads_share_the_cache() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(
        0,
        "function() { return ('kind' in feature) && feature.kind == 'water' }"
    ));
    let feature = Feature::new(5).with_prop("kind", "water");
    let mut scope = ctx.set_current_feature(&feature);
    assert!(scope.evaluate_boolean_function(0));
    let stats = scope.cache_stats();
    assert_eq!(stats.gets, 2);
    assert_eq!(stats.reused, 1);
}

#[test]
fn stats_accumulate_across_features() {
    let mut ctx = ScriptContext::new();
    assert!(ctx.set_function(0, "function() { return feature.w + feature.w }"));
    for id in 0..10 {
        let feature = Feature::new(id).with_prop("w", 1);
        let mut scope = ctx.set_current_feature(&feature);
        assert!(scope.evaluate_function(0));
        scope.pop();
    }
    let stats = ctx.cache_stats();
    assert_eq!(stats.gets, 20);
    assert_eq!(stats.reused, 10);
    assert!((stats.reuse_percent() - 50.0).abs() < f64::EPSILON);
}

proptest! {
    #[test]
    fn cached_lookups_match_direct_lookups(
        entries in prop::collection::vec(("[a-z]{1,3}", -50i32..50), 0..40),
        queries in prop::collection::vec("[a-z]{1,3}", 1..200),
    ) {
        let props: Properties = entries.into_iter().collect();
        let mut cache = PropertyCache::new();
        for key in &queries {
            prop_assert_eq!(cache.lookup(&props, key), props.get(key));
            prop_assert!(cache.len() <= CACHE_CAPACITY);
        }
        prop_assert_eq!(cache.stats().gets, queries.len() as u64);
    }
}
