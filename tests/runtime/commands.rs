//! REPL command execution through a session

use stylescript_foundation::{ErrorKind, GeometryType, PropValue};
use stylescript_language::Value;
use stylescript_runtime::{
    Command, FeatureSet, LineEditor, Outcome, ReadResult, Repl, Session, format_value,
};

/// Editor that never yields input.
struct NoInput;

impl LineEditor for NoInput {
    fn read_line(&mut self, _prompt: &str) -> stylescript_foundation::Result<ReadResult> {
        Ok(ReadResult::Eof)
    }

    fn read_continuation(&mut self, _prompt: &str) -> stylescript_foundation::Result<ReadResult> {
        Ok(ReadResult::Eof)
    }

    fn add_history(&mut self, _line: &str) {}

    fn set_keywords(&mut self, _keywords: Vec<String>) {}
}

fn repl() -> Repl<NoInput> {
    Repl::with_editor(NoInput).without_banner()
}

#[test]
fn commands_parse_from_text() {
    assert_eq!(
        Command::parse(":geometry line").ok(),
        Some(Command::Geometry(GeometryType::Lines))
    );
    assert_eq!(
        Command::parse(":prop lanes 3").ok(),
        Some(Command::Prop {
            key: "lanes".into(),
            value: PropValue::Number(3.0),
        })
    );
    let err = Command::parse(":nope").expect_err("unknown");
    assert!(matches!(err.kind, ErrorKind::InvalidCommand(_)));
}

#[test]
fn session_style_workflow() {
    let mut repl = repl();
    for line in [
        ":fn 0 function() { return feature.kind == 'water' && $geometry == polygon }",
        ":fn 1 function() { return feature.area / ($zoom * 10) }",
        ":prop kind water",
        ":prop area 3000",
        ":geometry polygon",
        ":zoom 10",
    ] {
        repl.execute(line).expect(line);
    }
    assert_eq!(repl.execute(":bool 0").ok(), Some(Outcome::Output("true".into())));
    assert_eq!(repl.execute(":eval 1").ok(), Some(Outcome::Output("30".into())));
}

#[test]
fn evaluation_walks_feature_set() {
    let features: FeatureSet = (0..4)
        .map(|i| {
            stylescript_foundation::Feature::new(i)
                .with_prop("lanes", i32::try_from(i).unwrap_or_default())
        })
        .collect();
    let mut session = Session::new();
    session.set_features(features);
    assert!(session.register_function(0, "function() { return feature.lanes > 1 }"));

    let mut hits = Vec::new();
    for i in 0..session.features().len() {
        session.select_feature(i);
        if session.evaluate_boolean(0) {
            hits.push(i);
        }
    }
    assert_eq!(hits, vec![2, 3]);
}

#[test]
fn program_text_sees_active_feature() {
    let mut repl = repl();
    repl.execute(":prop name 'Harbour Road'").expect("prop");
    let outcome = repl.execute("feature.name.split(' ')").expect("eval");
    assert_eq!(outcome, Outcome::Output("[\"Harbour\", \"Road\"]".into()));
}

#[test]
fn quit_is_reported() {
    let mut repl = repl();
    assert_eq!(repl.execute(":quit").ok(), Some(Outcome::Quit));
    assert_eq!(repl.execute("   ").ok(), Some(Outcome::Silent));
}

#[test]
fn format_value_quotes_strings() {
    assert_eq!(format_value(&Value::from("a\"b")), "\"a\\\"b\"");
    assert_eq!(format_value(&Value::Number(1.5)), "1.5");
    assert_eq!(format_value(&Value::Null), "null");
    assert_eq!(format_value(&Value::Undefined), "undefined");
}
