//! Integration tests for the parser

use stylescript_language::ast::{DeclKind, Expr, Stmt};
use stylescript_language::parser::MAX_NESTING_DEPTH;
use stylescript_language::{parse_function, parse_program};

#[test]
fn parse_spliced_style_function() {
    let node = parse_function("function(global,feature,$zoom) { return $zoom > global.min }")
        .expect("parse");
    assert_eq!(node.params, vec!["global", "feature", "$zoom"]);
    assert_eq!(node.body.len(), 1);
    assert!(matches!(node.body[0], Stmt::Return(Some(_), _)));
}

#[test]
fn parse_function_rejects_non_functions() {
    for source in ["", "1 + 2", "var x = 1", "function() {} + 1", "function() {}; x"] {
        assert!(parse_function(source).is_err(), "{source:?}");
    }
}

#[test]
fn parse_function_reports_position() {
    let err = parse_function("function() {\n  return )\n}").expect_err("bad");
    assert!(err.is_syntax());
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn parse_program_statements() {
    let program = parse_program(
        "var a = 1, b; const c = 2; function f(x) { return x } if (a) { b = a } else b = c;",
    )
    .expect("parse");
    assert_eq!(program.body.len(), 4);
    assert!(matches!(program.body[0], Stmt::Var(DeclKind::Var, ref decls, _) if decls.len() == 2));
    assert!(matches!(program.body[1], Stmt::Var(DeclKind::Const, _, _)));
    assert!(matches!(program.body[2], Stmt::Function(_)));
}

#[test]
fn parse_automatic_semicolons() {
    let program = parse_program("a = 1\nb = 2\n").expect("parse");
    assert_eq!(program.body.len(), 2);
}

#[test]
fn parse_member_and_call_chains() {
    let program = parse_program("feature.name.toUpperCase()").expect("parse");
    let Stmt::Expr(Expr::Call(callee, args, _), _) = &program.body[0] else {
        panic!("expected call statement");
    };
    assert!(args.is_empty());
    assert!(matches!(**callee, Expr::Member(_, ref name, _) if name == "toUpperCase"));
}

#[test]
fn parse_nesting_limit() {
    let shallow = format!("{}1{}", "[".repeat(10), "]".repeat(10));
    assert!(parse_program(&shallow).is_ok());
    let deep = format!(
        "{}1{}",
        "(".repeat(MAX_NESTING_DEPTH * 2),
        ")".repeat(MAX_NESTING_DEPTH * 2)
    );
    assert!(parse_program(&deep).is_err());
}
