//! REPL, CLI, and feature-set serialization for stylescript.
//!
//! This crate provides:
//! - [`Repl`] - Interactive read-eval-print loop over a [`Session`]
//! - [`Command`] - The `:` commands the REPL understands
//! - [`FeatureSet`] - `MessagePack` feature fixtures (see [`serialize`])
//! - [`init_tracing`] - Subscriber setup for the `stylescript` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod command;
mod editor;
mod highlight;
mod logging;
mod repl;
pub mod serialize;
mod session;

pub use command::{Command, USAGE, parse_prop_value};
pub use editor::{LineEditor, ReadResult, RustylineEditor};
pub use highlight::ScriptHighlighter;
pub use logging::init_tracing;
pub use repl::{Outcome, Repl, format_value};
pub use serialize::FeatureSet;
pub use session::Session;
