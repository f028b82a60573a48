//! The main REPL implementation.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use stylescript_foundation::{Error, ErrorKind, Feature, Result};
use stylescript_language::{ObjectKind, Value};
use tracing::debug;

use crate::command::{Command, USAGE};
use crate::editor::{LineEditor, ReadResult, RustylineEditor, open_depth};
use crate::serialize;
use crate::session::Session;

/// Nesting depth beyond which composite values print as `...`.
const MAX_DISPLAY_DEPTH: usize = 4;

/// What a REPL input produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Text to print.
    Output(String),
    /// Nothing to print.
    Silent,
    /// The user asked to leave.
    Quit,
}

/// The interactive REPL.
pub struct Repl<E: LineEditor = RustylineEditor> {
    /// The line editor for input.
    editor: E,

    /// Session state (context, features).
    session: Session,

    /// Whether to show the welcome banner.
    show_banner: bool,

    /// Primary prompt.
    prompt: String,

    /// Continuation prompt (for multi-line input).
    continuation_prompt: String,
}

impl Repl<RustylineEditor> {
    /// Creates a new REPL with the default rustyline editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails to initialize.
    pub fn new() -> Result<Self> {
        let editor = RustylineEditor::new()?;
        Ok(Self::with_editor(editor))
    }
}

impl<E: LineEditor> Repl<E> {
    /// Creates a new REPL with the given editor.
    pub fn with_editor(editor: E) -> Self {
        Self {
            editor,
            session: Session::new(),
            show_banner: true,
            prompt: "style> ".to_string(),
            continuation_prompt: "  ... ".to_string(),
        }
    }

    /// Sets the session for this REPL.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Disables the welcome banner.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns a reference to the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns a mutable reference to the session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Runs the REPL loop.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input fails fatally.
    pub fn run(&mut self) -> Result<()> {
        if self.show_banner {
            self.print_banner();
        }

        loop {
            match self.read_eval_print() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => self.print_error(&e),
            }
        }

        println!("\nGoodbye!");
        Ok(())
    }

    /// Executes one read-eval-print iteration.
    ///
    /// Returns `Ok(true)` to continue, `Ok(false)` to exit.
    fn read_eval_print(&mut self) -> Result<bool> {
        let Some(input) = self.read_input()? else {
            return Ok(false);
        };

        if input.trim().is_empty() {
            return Ok(true);
        }

        self.editor.add_history(&input);

        match self.execute(&input) {
            Ok(Outcome::Output(text)) => println!("{text}"),
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Quit) => return Ok(false),
            Err(e) => self.print_error(&e),
        }

        Ok(true)
    }

    /// Reads a potentially multi-line input.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let mut first_line = true;

        loop {
            let result = if first_line {
                self.editor.read_line(&self.prompt)?
            } else {
                self.editor.read_continuation(&self.continuation_prompt)?
            };

            match result {
                ReadResult::Line(line) => {
                    if !first_line {
                        input.push('\n');
                    }
                    input.push_str(&line);

                    if Self::is_complete(&input) {
                        return Ok(Some(input));
                    }
                    first_line = false;
                }
                ReadResult::Interrupted => {
                    if !first_line {
                        println!("\nInput cancelled.");
                    }
                    return Ok(Some(String::new()));
                }
                ReadResult::Eof => {
                    if first_line {
                        return Ok(None);
                    }
                    return Err(Error::new(ErrorKind::IoError(
                        "unexpected EOF in multi-line input".to_string(),
                    )));
                }
            }
        }
    }

    /// Checks if input has no unclosed brackets.
    fn is_complete(input: &str) -> bool {
        open_depth(input) <= 0
    }

    /// Executes one complete input: a `:` command or program text.
    ///
    /// # Errors
    ///
    /// Returns malformed-command errors, file errors, and the errors raised by
    /// evaluated program text.
    pub fn execute(&mut self, input: &str) -> Result<Outcome> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Outcome::Silent);
        }
        if input.starts_with(':') {
            let command = Command::parse(input)?;
            return self.run_command(command);
        }
        let value = self.eval(input)?;
        Ok(Outcome::Output(format_value(&value)))
    }

    /// Evaluates program text against the active feature.
    ///
    /// # Errors
    ///
    /// Returns the syntax or runtime error raised by the program.
    pub fn eval(&mut self, input: &str) -> Result<Value> {
        self.session.eval(input)
    }

    fn run_command(&mut self, command: Command) -> Result<Outcome> {
        debug!(?command, "repl command");
        let output = match command {
            Command::Function { index, source } => {
                if self.session.register_function(index, &source) {
                    format!("function {index} registered")
                } else {
                    format!("function {index} failed to compile and is now unset")
                }
            }
            Command::Eval(index) => match self.session.evaluate(index) {
                Some(value) => format_value(&value),
                None => format!("function {index} failed"),
            },
            Command::Bool(index) => self.session.evaluate_boolean(index).to_string(),
            Command::Prop { key, value } => {
                self.session.set_property(&key, value);
                return Ok(Outcome::Silent);
            }
            Command::Feature(Some(index)) => format_feature(self.session.select_feature(index)),
            Command::Feature(None) => match self.session.current_feature() {
                Some(feature) => format_feature(feature),
                None => "no active feature".to_string(),
            },
            Command::Zoom(zoom) => {
                self.session.set_zoom(zoom);
                return Ok(Outcome::Silent);
            }
            Command::Geometry(geometry) => {
                self.session.set_geometry(geometry);
                return Ok(Outcome::Silent);
            }
            Command::Load(file) => {
                let path = self.session.resolve_path(&file);
                let features = serialize::load_from_file(&path)?;
                let count = features.len();
                self.session.set_features(features);
                format!("loaded {count} features from {}", path.display())
            }
            Command::Save(file) => {
                let path = self.session.resolve_path(&file);
                serialize::save_to_file(self.session.features(), &path)?;
                format!(
                    "saved {} features to {}",
                    self.session.features().len(),
                    path.display()
                )
            }
            Command::Help => help_text(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Output(output))
    }

    /// Runs every input of a script, printing outputs and errors as it goes.
    ///
    /// Inputs are split the way the interactive loop splits them: a line
    /// ends an input once its brackets are balanced. Returns false if the
    /// script asked to quit.
    pub fn run_script(&mut self, source: &str) -> bool {
        let mut input = String::new();
        for line in source.lines() {
            if !input.is_empty() {
                input.push('\n');
            }
            input.push_str(line);
            if !Self::is_complete(&input) {
                continue;
            }
            let complete = std::mem::take(&mut input);
            match self.execute(&complete) {
                Ok(Outcome::Output(text)) => println!("{text}"),
                Ok(Outcome::Silent) => {}
                Ok(Outcome::Quit) => return false,
                Err(e) => self.print_error(&e),
            }
        }
        if !input.trim().is_empty() {
            self.print_error(&Error::new(ErrorKind::InvalidCommand(
                "unexpected end of script in multi-line input".to_string(),
            )));
        }
        true
    }

    /// Runs a script file without changing the load path (for CLI batch mode).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn eval_file(&mut self, path: &Path) -> Result<bool> {
        let source = fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        })?;
        Ok(self.run_script(&source))
    }

    /// Prints an error to stderr.
    #[allow(clippy::unused_self)]
    fn print_error(&self, error: &Error) {
        eprintln!("\x1b[31m{}: {error}\x1b[0m", error.kind.name());
    }

    /// Prints the welcome banner.
    #[allow(clippy::unused_self)]
    fn print_banner(&self) {
        println!("\x1b[1;36mstylescript v{}\x1b[0m", env!("CARGO_PKG_VERSION"));
        println!("Type :help for commands. Use Ctrl+D to exit.\n");
        let _ = io::stdout().flush();
    }
}

/// Formats a value for display, quoting strings.
#[must_use]
pub fn format_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    let Value::Object(obj) = value else {
        match value {
            Value::String(s) => {
                let _ = write!(out, "{s:?}");
            }
            other => out.push_str(&other.to_js_string()),
        }
        return;
    };
    if depth >= MAX_DISPLAY_DEPTH {
        out.push_str("...");
        return;
    }

    let object = obj.borrow();
    match &object.kind {
        ObjectKind::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, depth + 1);
            }
            out.push(']');
        }
        ObjectKind::Function(_) | ObjectKind::Native(_) => out.push_str("[function]"),
        ObjectKind::Host(_) => out.push_str("[feature]"),
        ObjectKind::Ordinary => {
            out.push('{');
            for (i, (key, item)) in object.properties.iter().enumerate() {
                out.push_str(if i > 0 { ", " } else { " " });
                let _ = write!(out, "{key}: ");
                write_value(out, item, depth + 1);
            }
            out.push_str(if object.properties.is_empty() { "}" } else { " }" });
        }
    }
}

fn format_feature(feature: &Feature) -> String {
    let mut out = format!("feature {} ({})", feature.id, feature.geometry);
    for (key, value) in feature.props.iter() {
        let _ = write!(out, "\n  {key} = {value}");
    }
    out
}

fn help_text() -> String {
    let width = USAGE.iter().map(|(cmd, _)| cmd.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:");
    for (cmd, text) in USAGE {
        let _ = write!(out, "\n  {cmd:<width$}  {text}");
    }
    out.push_str("\nAnything else is evaluated as program text.");
    out
}
