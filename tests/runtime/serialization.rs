//! Feature-set files

use stylescript_foundation::{ErrorKind, Feature, GeometryType};
use stylescript_runtime::{FeatureSet, Session, serialize};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("stylescript-{name}-{}.mpk", std::process::id()))
}

#[test]
fn saved_features_evaluate_after_loading() {
    let set: FeatureSet = [
        Feature::new(10).with_geometry(GeometryType::Points).with_prop("name", "cafe"),
        Feature::new(11).with_geometry(GeometryType::Lines).with_prop("name", "trail"),
    ]
    .into_iter()
    .collect();
    let path = temp_path("roundtrip");
    serialize::save_to_file(&set, &path).expect("save");

    let mut session = Session::new();
    session.set_features(serialize::load_from_file(&path).expect("load"));
    let _ = std::fs::remove_file(&path);

    assert!(session.register_function(0, "function() { return feature.name + ':' + $geometry }"));
    assert_eq!(session.evaluate(0).map(|v| v.to_js_string().to_string()).as_deref(), Some("cafe:1"));
    session.select_feature(1);
    assert_eq!(session.evaluate(0).map(|v| v.to_js_string().to_string()).as_deref(), Some("trail:2"));
}

#[test]
fn empty_set_round_trips() {
    let bytes = serialize::to_bytes(&FeatureSet::new()).expect("serialize");
    assert!(serialize::from_bytes(&bytes).expect("deserialize").is_empty());
}

#[test]
fn truncated_bytes_fail() {
    let set: FeatureSet = std::iter::once(Feature::new(1).with_prop("k", "v")).collect();
    let bytes = serialize::to_bytes(&set).expect("serialize");
    let err = serialize::from_bytes(&bytes[..bytes.len() / 2]).expect_err("truncated");
    assert!(matches!(err.kind, ErrorKind::SerializationError(_)));
}
