//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use stylescript_foundation::{Error, ErrorContext, ErrorKind};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_syntax() {
    let err = Error::syntax("unexpected token", 3, 14);
    assert!(err.is_syntax());
    let msg = format!("{err}");
    assert!(msg.contains("unexpected token"));
    assert!(msg.contains("line 3"));
}

#[test]
fn error_function_not_set() {
    let err = Error::new(ErrorKind::FunctionNotSet { index: 7 });
    assert!(!err.is_syntax());
    assert!(format!("{err}").contains('7'));
    assert_eq!(err.kind.name(), "IndexError");
}

#[test]
fn error_index_out_of_range() {
    let err = Error::new(ErrorKind::FunctionIndexOutOfRange { index: 12, len: 4 });
    let msg = format!("{err}");
    assert!(msg.contains("12"));
    assert!(msg.contains('4'));
    assert_eq!(err.name(), "IndexError");
}

#[test]
fn error_thrown_displays_raw_message() {
    let err = Error::thrown("bad style");
    assert_eq!(format!("{err}"), "bad style");
    assert_eq!(err.name(), "Error");
}

#[test]
fn error_invalid_command() {
    let err = Error::new(ErrorKind::InvalidCommand(":frob".to_string()));
    assert!(format!("{err}").contains(":frob"));
    assert_eq!(err.kind.name(), "CommandError");
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn error_with_context() {
    let err = Error::type_error("x is not a function").with_context(
        ErrorContext::new()
            .with_source("style.js")
            .with_position(2, 5)
            .with_frame("width"),
    );
    let context = err.context.as_ref().expect("context attached");
    let rendered = format!("{context}");
    assert!(rendered.contains("style.js"));
    assert!(rendered.contains("width"));
}

#[test]
fn error_names_match_script_names() {
    assert_eq!(Error::type_error("x").name(), "TypeError");
    assert_eq!(Error::reference("x").name(), "ReferenceError");
    assert_eq!(Error::range("x").name(), "RangeError");
    assert_eq!(Error::internal("x").name(), "InternalError");
}
