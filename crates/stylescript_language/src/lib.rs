//! Lexer, parser, compiler, and bytecode VM for the stylescript language.
//!
//! stylescript is the JavaScript subset used by map style functions.
//! This crate provides:
//! - [`Lexer`] - Tokenization of script source
//! - [`Parser`] - Parsing tokens into an AST
//! - [`Compiler`] - Compiling the AST to bytecode
//! - [`Vm`] - Stack-based bytecode interpreter with an embedding API
//! - [`Heap`] - Object tracking and cycle collection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod compiler;
mod fuzz_tests;
pub mod heap;
pub mod lexer;
pub mod object;
pub mod opcode;
pub mod parser;
mod scope;
pub mod span;
pub mod token;
pub mod value;
pub mod vm;

pub use compiler::{Compiler, FunctionProto, compile_function, compile_program};
pub use heap::{Heap, HeapStats};
pub use lexer::Lexer;
pub use object::{Object, ObjectKind, PropertyMap};
pub use parser::{Parser, parse_function, parse_program};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use value::{ObjectRef, Value};
pub use vm::{FatalHandler, HostContext, NoHost, Vm, VmConfig, default_fatal_handler};
