//! Integration tests for Layer 1: Language
//!
//! Tests for the lexer, parser, and VM embedding API.

mod lexer;
mod parser;
mod vm;
