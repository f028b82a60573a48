//! Lexer for the stylescript JavaScript subset.
//!
//! The lexer converts source text into a stream of tokens. It never fails:
//! malformed input produces [`TokenKind::Error`] tokens that the parser
//! reports as syntax errors.

use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Lexer for stylescript source code.
pub struct Lexer<'src> {
    /// The complete source text.
    source: &'src str,
    /// Remaining source text.
    rest: &'src str,
    /// Current byte offset in source.
    position: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
    /// A line terminator was crossed since the last significant token.
    pending_newline: bool,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            position: 0,
            line: 1,
            column: 1,
            pending_newline: false,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        if self.skip_whitespace() {
            self.pending_newline = true;
        }
        let newline_before = self.pending_newline;

        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let Some(c) = self.peek_char() else {
            return Token::new(
                TokenKind::Eof,
                Span::new(start, start, start_line, start_column),
                newline_before,
            );
        };

        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '?' => self.single(TokenKind::Question),
            ':' => self.single(TokenKind::Colon),
            '~' => self.single(TokenKind::Tilde),
            '^' => self.single(TokenKind::Caret),
            '.' => {
                if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number()
                } else {
                    self.single(TokenKind::Dot)
                }
            }
            '+' => self.scan_operator(&[
                ("++", TokenKind::PlusPlus),
                ("+=", TokenKind::PlusAssign),
                ("+", TokenKind::Plus),
            ]),
            '-' => self.scan_operator(&[
                ("--", TokenKind::MinusMinus),
                ("-=", TokenKind::MinusAssign),
                ("-", TokenKind::Minus),
            ]),
            '*' => self.scan_operator(&[("*=", TokenKind::StarAssign), ("*", TokenKind::Star)]),
            '%' => self.scan_operator(&[
                ("%=", TokenKind::PercentAssign),
                ("%", TokenKind::Percent),
            ]),
            '/' => match self.peek_char_n(1) {
                Some('/') => {
                    let kind = self.scan_line_comment(start);
                    return Token::new(
                        kind,
                        Span::new(start, self.position, start_line, start_column),
                        newline_before,
                    );
                }
                Some('*') => {
                    let kind = self.scan_block_comment(start);
                    return Token::new(
                        kind,
                        Span::new(start, self.position, start_line, start_column),
                        newline_before,
                    );
                }
                _ => self.scan_operator(&[("/=", TokenKind::SlashAssign), ("/", TokenKind::Slash)]),
            },
            '=' => self.scan_operator(&[
                ("===", TokenKind::EqEqEq),
                ("==", TokenKind::EqEq),
                ("=", TokenKind::Assign),
            ]),
            '!' => self.scan_operator(&[
                ("!==", TokenKind::BangEqEq),
                ("!=", TokenKind::BangEq),
                ("!", TokenKind::Bang),
            ]),
            '<' => self.scan_operator(&[
                ("<<", TokenKind::Shl),
                ("<=", TokenKind::Le),
                ("<", TokenKind::Lt),
            ]),
            '>' => self.scan_operator(&[
                (">>>", TokenKind::UShr),
                (">>", TokenKind::Shr),
                (">=", TokenKind::Ge),
                (">", TokenKind::Gt),
            ]),
            '&' => self.scan_operator(&[("&&", TokenKind::AmpAmp), ("&", TokenKind::Amp)]),
            '|' => self.scan_operator(&[("||", TokenKind::PipePipe), ("|", TokenKind::Pipe)]),
            '"' | '\'' => self.scan_string(c),
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_identifier_start(c) => self.scan_identifier(),
            c => {
                self.advance();
                TokenKind::Error(format!("unexpected character {c:?}"))
            }
        };

        self.pending_newline = false;
        Token::new(
            kind,
            Span::new(start, self.position, start_line, start_column),
            newline_before,
        )
    }

    /// Tokenizes all source and returns a vector of tokens.
    ///
    /// Comments are included in the output; the final token is always `Eof`.
    #[must_use]
    pub fn tokenize_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Matches the first operator spelling in `candidates` (longest first).
    fn scan_operator(&mut self, candidates: &[(&str, TokenKind)]) -> TokenKind {
        for (spelling, kind) in candidates {
            if self.rest.starts_with(spelling) {
                for _ in 0..spelling.len() {
                    self.advance();
                }
                return kind.clone();
            }
        }
        self.advance();
        TokenKind::Error("unexpected operator".to_string())
    }

    /// Skips whitespace, returning true if a line terminator was crossed.
    fn skip_whitespace(&mut self) -> bool {
        let mut newline = false;
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            newline |= is_line_terminator(c);
            self.advance();
        }
        newline
    }

    fn scan_line_comment(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek_char() {
            if is_line_terminator(c) {
                break;
            }
            self.advance();
        }
        TokenKind::Comment(self.slice_from(start).to_string())
    }

    fn scan_block_comment(&mut self, start: usize) -> TokenKind {
        // Skip the opening `/*`.
        self.advance();
        self.advance();
        loop {
            match self.peek_char() {
                None => return TokenKind::Error("unterminated block comment".to_string()),
                Some('*') if self.peek_char_n(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    let text = self.slice_from(start);
                    // A multi-line block comment separates statements like a newline.
                    if text.chars().any(is_line_terminator) {
                        self.pending_newline = true;
                    }
                    return TokenKind::Comment(text.to_string());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance();
        let mut value = String::new();
        loop {
            let Some(c) = self.peek_char() else {
                return TokenKind::Error("unterminated string literal".to_string());
            };
            if c == quote {
                self.advance();
                return TokenKind::String(value);
            }
            if is_line_terminator(c) {
                return TokenKind::Error("unterminated string literal".to_string());
            }
            self.advance();
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some(escaped) = self.peek_char() else {
                return TokenKind::Error("unterminated string literal".to_string());
            };
            self.advance();
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'v' => value.push('\u{b}'),
                '0' => value.push('\0'),
                'x' => match self.scan_hex_escape(2) {
                    Some(ch) => value.push(ch),
                    None => return TokenKind::Error("invalid \\x escape".to_string()),
                },
                'u' => match self.scan_unicode_escape() {
                    Some(ch) => value.push(ch),
                    None => return TokenKind::Error("invalid \\u escape".to_string()),
                },
                // Line continuation.
                '\n' => {}
                other => value.push(other),
            }
        }
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<char> {
        let digits = self.rest.get(..count)?;
        let code = u32::from_str_radix(digits, 16).ok()?;
        for _ in 0..count {
            self.advance();
        }
        char::from_u32(code)
    }

    fn scan_unicode_escape(&mut self) -> Option<char> {
        if self.peek_char() != Some('{') {
            return self.scan_hex_escape(4);
        }
        let close = self.rest.find('}')?;
        let code = u32::from_str_radix(&self.rest[1..close], 16).ok()?;
        for _ in 0..=close {
            self.advance();
        }
        char::from_u32(code)
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.position;

        if self.rest.starts_with("0x") || self.rest.starts_with("0X") {
            self.advance();
            self.advance();
            let digits_start = self.position;
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = self.slice_from(digits_start);
            return match u64::from_str_radix(digits, 16) {
                #[allow(clippy::cast_precision_loss)]
                Ok(n) => TokenKind::Number(n as f64),
                Err(_) => TokenKind::Error(format!("invalid hex literal 0x{digits}")),
            };
        }

        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let digit_at = if matches!(self.peek_char_n(1), Some('+' | '-')) {
                2
            } else {
                1
            };
            if self.peek_char_n(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = self.slice_from(start);
        if self.peek_char().is_some_and(is_identifier_start) {
            return TokenKind::Error(format!("identifier directly after number {text}"));
        }
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number {text}")),
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.position;
        while self.peek_char().is_some_and(is_identifier_part) {
            self.advance();
        }
        let word = self.slice_from(start);
        TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()))
    }

    fn slice_from(&self, start: usize) -> &'src str {
        &self.source[start..self.position]
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize_all(source)
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn lex_function_header() {
        assert_eq!(
            kinds("function(feature, $zoom) { return feature.kind }"),
            vec![
                TokenKind::Function,
                TokenKind::LParen,
                TokenKind::Identifier("feature".into()),
                TokenKind::Comma,
                TokenKind::Identifier("$zoom".into()),
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::Identifier("feature".into()),
                TokenKind::Dot,
                TokenKind::Identifier("kind".into()),
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_numbers() {
        assert_eq!(
            kinds("42 0.5 .25 1e3 2.5E-1 0xff"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(0.5),
                TokenKind::Number(0.25),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.25),
                TokenKind::Number(255.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb" "\x41B\u{43}""#),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String("a\tb".into()),
                TokenKind::String("ABC".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_longest_operator_wins() {
        assert_eq!(
            kinds("a === b !== c >>> 1 >= 2"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::EqEqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::BangEqEq,
                TokenKind::Identifier("c".into()),
                TokenKind::UShr,
                TokenKind::Number(1.0),
                TokenKind::Ge,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_tracks_newlines() {
        let tokens = Lexer::tokenize_all("a\nb /* x\n */ c // tail\nd");
        let flags: Vec<_> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.newline_before)
            .collect();
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn lex_positions() {
        let tokens = Lexer::tokenize_all("x\n  y");
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
    }

    #[test]
    fn lex_errors_are_tokens() {
        assert!(matches!(kinds("'open")[0], TokenKind::Error(_)));
        assert!(matches!(kinds("#")[0], TokenKind::Error(_)));
        assert!(matches!(kinds("/* never closed")[0], TokenKind::Error(_)));
        assert!(matches!(kinds("3px")[0], TokenKind::Error(_)));
    }
}
