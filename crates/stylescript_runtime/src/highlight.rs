//! Syntax highlighting for the REPL.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

const RESET: &str = "\x1b[0m";

/// Highlighter for script text and REPL commands.
pub struct ScriptHighlighter {}

impl ScriptHighlighter {
    /// Creates a new highlighter.
    pub const fn new() -> Self {
        Self {}
    }

    /// Highlight a line of input.
    #[allow(clippy::unused_self)]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut chars = line.chars().peekable();

        // Leading REPL command
        if line.starts_with(':') {
            result.push_str("\x1b[1;36m");
            take_while(&mut chars, &mut result, |c| !c.is_whitespace());
            result.push_str(RESET);
        }

        while let Some(c) = chars.next() {
            match c {
                // Line comments
                '/' if chars.peek() == Some(&'/') => {
                    result.push_str("\x1b[2;3m");
                    result.push(c);
                    result.extend(chars.by_ref());
                    result.push_str(RESET);
                }

                // Strings
                '\'' | '"' => {
                    result.push_str("\x1b[33m");
                    result.push(c);
                    let mut escaped = false;
                    for next in chars.by_ref() {
                        result.push(next);
                        if escaped {
                            escaped = false;
                        } else if next == '\\' {
                            escaped = true;
                        } else if next == c {
                            break;
                        }
                    }
                    result.push_str(RESET);
                }

                // Numbers
                c if c.is_ascii_digit() => {
                    result.push_str("\x1b[35m");
                    result.push(c);
                    take_while(&mut chars, &mut result, |n| {
                        n.is_ascii_alphanumeric() || n == '.'
                    });
                    result.push_str(RESET);
                }

                // Delimiters
                '(' | ')' | '[' | ']' | '{' | '}' => {
                    result.push_str("\x1b[1m");
                    result.push(c);
                    result.push_str(RESET);
                }

                // Identifiers and keywords
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let mut word = String::from(c);
                    take_while(&mut chars, &mut word, |n| {
                        n.is_alphanumeric() || n == '_' || n == '$'
                    });
                    push_word(&mut result, &word);
                }

                _ => result.push(c),
            }
        }

        Cow::Owned(result)
    }
}

impl Default for ScriptHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

fn take_while(chars: &mut Peekable<Chars<'_>>, out: &mut String, pred: impl Fn(char) -> bool) {
    while let Some(next) = chars.next_if(|&n| pred(n)) {
        out.push(next);
    }
}

fn push_word(result: &mut String, word: &str) {
    let color = match word {
        "function" | "return" | "var" | "let" | "const" | "if" | "else" | "while" | "for"
        | "do" | "break" | "continue" | "throw" | "typeof" | "void" | "in" => "\x1b[32m",

        "true" | "false" | "null" | "undefined" | "NaN" | "Infinity" => "\x1b[34m",

        // Context arguments and geometry constants
        "feature" | "global" | "$zoom" | "$geometry" | "point" | "line" | "polygon" => {
            "\x1b[1;34m"
        }

        _ => "",
    };

    if color.is_empty() {
        result.push_str(word);
    } else {
        result.push_str(color);
        result.push_str(word);
        result.push_str(RESET);
    }
}
