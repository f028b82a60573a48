//! Integration tests for the feature data model
//!
//! Tests property lookup, geometry kinds, and filter keys.

use proptest::prelude::*;
use stylescript_foundation::{Feature, FilterKey, GeometryType, PropValue, Properties};

// =============================================================================
// Properties
// =============================================================================

#[test]
fn feature_builder_sets_fields() {
    let feature = Feature::new(42)
        .with_geometry(GeometryType::Lines)
        .with_prop("kind", "road")
        .with_prop("lanes", 3);
    assert_eq!(feature.id, 42);
    assert_eq!(feature.geometry, GeometryType::Lines);
    assert_eq!(feature.props.get("kind").as_str(), Some("road"));
    assert_eq!(feature.props.get("lanes").as_number(), Some(3.0));
}

#[test]
fn missing_property_is_none() {
    let feature = Feature::new(1).with_prop("kind", "road");
    assert!(feature.props.get("name").is_none());
    assert!(!feature.props.contains("name"));
    assert_eq!(feature.props.index_of("name"), None);
}

#[test]
fn index_of_agrees_with_get() {
    let props: Properties = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
    for key in ["a", "b", "c"] {
        let index = props.index_of(key).expect("present");
        assert_eq!(props.value_at(index), props.get(key));
    }
}

#[test]
fn set_replaces_and_remove_clears() {
    let mut props = Properties::new();
    props.set("width", 2);
    props.set("width", 4.5);
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("width"), &PropValue::Number(4.5));
    assert_eq!(props.remove("width"), Some(PropValue::Number(4.5)));
    assert!(props.is_empty());
}

#[test]
fn prop_value_display() {
    assert_eq!(PropValue::from("x").to_string(), "\"x\"");
    assert_eq!(PropValue::from(2.5).to_string(), "2.5");
    assert_eq!(PropValue::None.to_string(), "<none>");
}

// =============================================================================
// Geometry and Filter Keys
// =============================================================================

#[test]
fn geometry_names_round_trip() {
    for kind in GeometryType::NAMED {
        assert_eq!(kind.to_string().parse::<GeometryType>().ok(), Some(kind));
    }
    assert_eq!("polygons".parse::<GeometryType>().ok(), Some(GeometryType::Polygons));
    assert_eq!(GeometryType::default().code(), 0);
}

#[test]
fn filter_keys_have_distinct_slots() {
    let slots = [FilterKey::Other, FilterKey::Zoom, FilterKey::Geometry].map(FilterKey::index);
    assert_eq!(slots, [0, 1, 2]);
    assert_eq!(FilterKey::COUNT, slots.len());
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn lookup_matches_last_write(
        entries in prop::collection::vec(("[a-e]{1,2}", -1000i32..1000), 0..32),
    ) {
        let mut props = Properties::new();
        for (key, value) in &entries {
            props.set(key.clone(), *value);
        }
        for (key, _) in &entries {
            let expected = entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| f64::from(*v));
            prop_assert_eq!(props.get(key).as_number(), expected);
        }
        let keys: Vec<_> = props.iter().map(|(k, _)| k.to_string()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(keys, sorted);
    }
}
