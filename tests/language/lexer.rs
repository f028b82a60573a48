//! Integration tests for the lexer

use stylescript_language::{Lexer, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::tokenize_all(source)
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !k.is_trivia())
        .collect()
}

#[test]
fn lex_context_identifiers() {
    assert_eq!(
        kinds("feature $zoom $geometry"),
        vec![
            TokenKind::Identifier("feature".into()),
            TokenKind::Identifier("$zoom".into()),
            TokenKind::Identifier("$geometry".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lex_numbers() {
    assert_eq!(
        kinds("1 2.5 1e3 0x1F"),
        vec![
            TokenKind::Number(1.0),
            TokenKind::Number(2.5),
            TokenKind::Number(1000.0),
            TokenKind::Number(31.0),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lex_strings_with_escapes() {
    assert_eq!(
        kinds(r#"'it\'s' "a\nb""#),
        vec![
            TokenKind::String("it's".into()),
            TokenKind::String("a\nb".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lex_keywords_and_punctuators() {
    assert_eq!(
        kinds("function() { return x in y }"),
        vec![
            TokenKind::Function,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Return,
            TokenKind::Identifier("x".into()),
            TokenKind::In,
            TokenKind::Identifier("y".into()),
            TokenKind::RBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lex_comments_are_tokens() {
    let tokens = Lexer::tokenize_all("a // line\n/* block */ b");
    assert_eq!(tokens.iter().filter(|t| t.kind.is_trivia()).count(), 2);
}

#[test]
fn lex_records_newlines() {
    let tokens: Vec<_> = Lexer::tokenize_all("a\nb c")
        .into_iter()
        .filter(|t| !t.kind.is_trivia())
        .collect();
    assert!(!tokens[0].newline_before);
    assert!(tokens[1].newline_before);
    assert!(!tokens[2].newline_before);
}

#[test]
fn lex_spans_track_lines() {
    let tokens = Lexer::tokenize_all("x\n  y");
    assert_eq!(tokens[1].span.line, 2);
    assert_eq!(tokens[1].span.column, 3);
}

#[test]
fn lex_unexpected_character_is_error_token() {
    assert!(kinds("a # b").iter().any(|k| matches!(k, TokenKind::Error(_))));
}
