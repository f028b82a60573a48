//! stylescript - Embedded scripting bridge for map style functions
//!
//! This crate re-exports all layers of the stylescript system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: stylescript_runtime    REPL, CLI, feature-set serialization
//! Layer 2: stylescript_bridge     Script context, function registry, feature access
//! Layer 1: stylescript_language   Lexer, parser, compiler, bytecode VM, heap
//! Layer 0: stylescript_foundation Core types (Error, Feature, GeometryType)
//! ```

pub use stylescript_bridge as bridge;
pub use stylescript_foundation as foundation;
pub use stylescript_language as language;
pub use stylescript_runtime as runtime;
