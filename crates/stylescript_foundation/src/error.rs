//! Error types for stylescript.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Script-level failures (syntax, type, reference and range errors, thrown
//! values) share one [`Error`] type with the bridge-level failures so that
//! every layer can propagate with `?`.

use std::fmt;

use thiserror::Error;

/// The main error type for stylescript operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a syntax error at the given position.
    #[must_use]
    pub fn syntax(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::new(ErrorKind::SyntaxError {
            message: message.into(),
            line,
            column,
        })
    }

    /// Creates a type error.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError(message.into()))
    }

    /// Creates a reference error.
    #[must_use]
    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError(message.into()))
    }

    /// Creates a range error.
    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError(message.into()))
    }

    /// Creates an error for a value raised with `throw`.
    #[must_use]
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Thrown(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns the script-visible error name (`TypeError`, `SyntaxError`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Returns true if this error was raised while compiling source text.
    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self.kind, ErrorKind::SyntaxError { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Malformed source text.
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    SyntaxError {
        /// Description of the problem.
        message: String,
        /// Line number (1-indexed).
        line: u32,
        /// Column number (1-indexed).
        column: u32,
    },

    /// Operation applied to a value of the wrong type.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Read of an undeclared variable.
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Numeric or resource bound exceeded (call depth, stack size).
    #[error("RangeError: {0}")]
    RangeError(String),

    /// A value raised by a script `throw` statement, already converted to text.
    #[error("{0}")]
    Thrown(String),

    /// Evaluation requested for a registry slot without a compiled function.
    #[error("function not set at index {index}")]
    FunctionNotSet {
        /// The requested registry index.
        index: usize,
    },

    /// Evaluation requested past the end of the function registry.
    #[error("function index {index} out of range (registry size {len})")]
    FunctionIndexOutOfRange {
        /// The requested registry index.
        index: usize,
        /// The current registry size.
        len: usize,
    },

    /// The heap object limit was reached.
    #[error("heap exhausted: more than {limit} live objects")]
    HeapExhausted {
        /// The configured limit.
        limit: usize,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File or terminal I/O failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A REPL command or CLI argument was malformed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns the script-visible error name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyntaxError { .. } => "SyntaxError",
            Self::TypeError(_) => "TypeError",
            Self::ReferenceError(_) => "ReferenceError",
            Self::RangeError(_) => "RangeError",
            Self::Thrown(_) => "Error",
            Self::FunctionNotSet { .. } | Self::FunctionIndexOutOfRange { .. } => "IndexError",
            Self::HeapExhausted { .. } => "AllocationError",
            Self::SerializationError(_) => "SerializationError",
            Self::IoError(_) => "IoError",
            Self::InvalidCommand(_) => "CommandError",
            Self::Internal(_) => "InternalError",
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Source text or function name.
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<u32>,
    /// Column number in source.
    pub column: Option<u32>,
    /// Script call frames, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source description.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line.
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, ":{line}:{col}")?,
            (Some(line), None) => write!(f, ":{line}")?,
            _ => {}
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}

/// Result type alias for stylescript operations.
pub type Result<T> = std::result::Result<T, Error>;
