//! REPL command parsing.
//!
//! Lines starting with `:` are commands; everything else is program text.

use std::str::FromStr;

use stylescript_foundation::{Error, ErrorKind, GeometryType, PropValue, Result};

/// A parsed REPL command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `:fn <index> <source>` registers a style function.
    Function {
        /// Registry index.
        index: usize,
        /// Function-literal source text.
        source: String,
    },
    /// `:eval <index>` evaluates a function and prints its result.
    Eval(usize),
    /// `:bool <index>` evaluates a function as a filter.
    Bool(usize),
    /// `:prop <key> [value]` sets or, without a value, removes a property.
    Prop {
        /// Property name.
        key: String,
        /// New value; [`PropValue::None`] removes the property.
        value: PropValue,
    },
    /// `:feature [index]` selects a feature, or shows the active one.
    Feature(Option<usize>),
    /// `:zoom <n>` sets the ambient zoom.
    Zoom(i32),
    /// `:geometry <kind>` sets the ambient geometry.
    Geometry(GeometryType),
    /// `:load <file>` loads a feature set.
    Load(String),
    /// `:save <file>` saves the feature set.
    Save(String),
    /// `:help` lists the commands.
    Help,
    /// `:quit` leaves the REPL.
    Quit,
}

/// Usage lines shown by `:help`.
pub const USAGE: &[(&str, &str)] = &[
    (":fn <i> <source>", "register a style function at index i"),
    (":eval <i>", "evaluate function i against the active feature"),
    (":bool <i>", "evaluate function i as a filter"),
    (":prop <key> [value]", "set a property of the active feature"),
    (":feature [n]", "select feature n, or show the active feature"),
    (":zoom <n>", "set $zoom"),
    (":geometry <kind>", "set $geometry to point, line or polygon"),
    (":load <file.mpk>", "load a feature set"),
    (":save <file.mpk>", "save the feature set"),
    (":help", "show this help"),
    (":quit", "exit"),
];

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidCommand(message.into()))
}

fn parse_arg<T: FromStr>(command: &str, arg: &str) -> Result<T> {
    arg.parse()
        .map_err(|_| invalid(format!(":{command} expects a number, got '{arg}'")))
}

fn required<'a>(command: &str, arg: &'a str, what: &str) -> Result<&'a str> {
    if arg.is_empty() {
        Err(invalid(format!(":{command} requires {what}")))
    } else {
        Ok(arg)
    }
}

/// Parses a property value: quoted text is a string, numeric text a number,
/// anything else a string, and nothing at all removes the property.
#[must_use]
pub fn parse_prop_value(text: &str) -> PropValue {
    let text = text.trim();
    if text.is_empty() {
        return PropValue::None;
    }
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return PropValue::String(text[1..text.len() - 1].to_string());
        }
    }
    text.parse::<f64>()
        .map_or_else(|_| PropValue::String(text.to_string()), PropValue::Number)
}

impl Command {
    /// Parses a command line, with or without its leading `:`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCommand` for unknown commands and malformed arguments.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let line = line.strip_prefix(':').unwrap_or(line);
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, rest)| (name, rest.trim()));

        match name {
            "fn" => {
                let rest = required(name, rest, "an index and a function")?;
                let (index, source) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| invalid(":fn requires function source after the index"))?;
                Ok(Self::Function {
                    index: parse_arg(name, index)?,
                    source: source.trim().to_string(),
                })
            }
            "eval" => Ok(Self::Eval(parse_arg(name, required(name, rest, "an index")?)?)),
            "bool" => Ok(Self::Bool(parse_arg(name, required(name, rest, "an index")?)?)),
            "prop" => {
                let rest = required(name, rest, "a property name")?;
                let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(Self::Prop {
                    key: key.to_string(),
                    value: parse_prop_value(value),
                })
            }
            "feature" if rest.is_empty() => Ok(Self::Feature(None)),
            "feature" => Ok(Self::Feature(Some(parse_arg(name, rest)?))),
            "zoom" => Ok(Self::Zoom(parse_arg(name, required(name, rest, "a level")?)?)),
            "geometry" => {
                let kind = required(name, rest, "point, line or polygon")?;
                Ok(Self::Geometry(kind.parse()?))
            }
            "load" => Ok(Self::Load(required(name, rest, "a file")?.to_string())),
            "save" => Ok(Self::Save(required(name, rest, "a file")?.to_string())),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(invalid(format!("unknown command ':{other}' (try :help)"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keeps_source_verbatim() {
        let cmd = Command::parse(":fn 3 function() { return feature.kind == 'a b' }");
        assert_eq!(
            cmd.ok(),
            Some(Command::Function {
                index: 3,
                source: "function() { return feature.kind == 'a b' }".to_string(),
            })
        );
    }

    #[test]
    fn index_commands_require_numbers() {
        assert_eq!(Command::parse(":eval 2").ok(), Some(Command::Eval(2)));
        assert_eq!(Command::parse(":bool 0").ok(), Some(Command::Bool(0)));
        for bad in [":eval", ":eval x", ":bool -1", ":fn 1", ":fn x function() {}"] {
            let err = Command::parse(bad).expect_err(bad);
            assert!(matches!(err.kind, ErrorKind::InvalidCommand(_)), "{bad}");
        }
    }

    #[test]
    fn prop_values_are_typed() {
        assert_eq!(parse_prop_value("12.5"), PropValue::Number(12.5));
        assert_eq!(parse_prop_value("road"), PropValue::String("road".into()));
        assert_eq!(parse_prop_value("'12'"), PropValue::String("12".into()));
        assert_eq!(parse_prop_value("\"Main St\""), PropValue::String("Main St".into()));
        assert_eq!(parse_prop_value(""), PropValue::None);
        assert_eq!(
            Command::parse(":prop name Main Street").ok(),
            Some(Command::Prop {
                key: "name".into(),
                value: PropValue::String("Main Street".into()),
            })
        );
    }

    #[test]
    fn feature_and_geometry() {
        assert_eq!(Command::parse(":feature").ok(), Some(Command::Feature(None)));
        assert_eq!(Command::parse(":feature 4").ok(), Some(Command::Feature(Some(4))));
        assert_eq!(
            Command::parse(":geometry polygon").ok(),
            Some(Command::Geometry(GeometryType::Polygons))
        );
        assert!(Command::parse(":geometry hexagon").is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = Command::parse(":frobnicate").expect_err("unknown");
        assert!(err.to_string().contains(":frobnicate"));
        assert_eq!(Command::parse(":q").ok(), Some(Command::Quit));
    }
}
