//! Integration tests for Layer 3: Runtime
//!
//! Tests for sessions, REPL commands, and feature-set files.

mod commands;
mod serialization;
