//! Registered style functions and their context arguments.
//!
//! A style function is registered as function-literal source text. Before it
//! is compiled, its text is scanned for the context identifiers `global`,
//! `feature`, `$zoom` and `$geometry`; every identifier found becomes a
//! parameter spliced in right after the first `(`, and the same set decides
//! which arguments are pushed when the function is called.
//!
//! The scan is a plain substring search, so an identifier mentioned inside a
//! string literal or a comment counts as a use as well.

use bitflags::bitflags;
use stylescript_foundation::{Error, ErrorKind, Result};
use stylescript_language::Value;

bitflags! {
    /// Context arguments a function receives, in call order.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u8 {
        /// Receives the global style object as `global`.
        const GLOBAL = 1 << 0;
        /// Receives the active feature as `feature`.
        const FEATURE = 1 << 1;
        /// Receives the ambient zoom as `$zoom`.
        const ZOOM = 1 << 2;
        /// Receives the ambient geometry kind as `$geometry`.
        const GEOMETRY = 1 << 3;
    }
}

impl ContextFlags {
    /// Flags and the parameter names they stand for, in call order.
    pub const PARAMETERS: [(Self, &'static str); 4] = [
        (Self::GLOBAL, "global"),
        (Self::FEATURE, "feature"),
        (Self::ZOOM, "$zoom"),
        (Self::GEOMETRY, "$geometry"),
    ];

    /// Returns the flags for every context identifier occurring in `source`.
    #[must_use]
    pub fn scan(source: &str) -> Self {
        Self::PARAMETERS
            .iter()
            .filter(|(_, name)| source.contains(name))
            .fold(Self::empty(), |flags, (flag, _)| flags | *flag)
    }

    /// Returns the comma-separated parameter list for these flags.
    #[must_use]
    pub fn parameter_list(self) -> String {
        Self::PARAMETERS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Splices the parameter list into `source` right after the first `(`.
    ///
    /// Source without a `(` gets the list prepended.
    #[must_use]
    pub fn splice_parameters(self, source: &str) -> String {
        let params = self.parameter_list();
        let at = source.find('(').map_or(0, |pos| pos + 1);
        let mut rewritten = String::with_capacity(source.len() + params.len());
        rewritten.push_str(&source[..at]);
        rewritten.push_str(&params);
        rewritten.push_str(&source[at..]);
        rewritten
    }
}

/// A successfully compiled style function.
#[derive(Clone, Debug)]
pub struct CompiledFunction {
    /// Registry index.
    pub index: usize,
    /// The compiled function value. Anchored in the script heap while registered.
    pub callable: Value,
    /// Context arguments pushed on every call.
    pub flags: ContextFlags,
    /// Source text after parameter splicing.
    pub source: String,
}

/// Dense, index-addressed table of compiled functions.
///
/// Slots below [`FunctionRegistry::len`] that hold no function are unset;
/// evaluating them fails just like evaluating past the end.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<Option<CompiledFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry size, including unset slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no slot was ever registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Clears the slot at `index`, growing the registry to include it.
    pub fn invalidate(&mut self, index: usize) {
        if index >= self.functions.len() {
            self.functions.resize_with(index + 1, || None);
        }
        self.functions[index] = None;
    }

    /// Stores `function` at its index, growing the registry if needed.
    pub fn install(&mut self, function: CompiledFunction) {
        let index = function.index;
        self.invalidate(index);
        self.functions[index] = Some(function);
    }

    /// Returns the function at `index`.
    ///
    /// # Errors
    /// Returns `FunctionIndexOutOfRange` past the end and `FunctionNotSet`
    /// for an unset slot.
    pub fn get(&self, index: usize) -> Result<&CompiledFunction> {
        match self.functions.get(index) {
            Some(Some(function)) => Ok(function),
            Some(None) => Err(Error::new(ErrorKind::FunctionNotSet { index })),
            None => Err(Error::new(ErrorKind::FunctionIndexOutOfRange {
                index,
                len: self.functions.len(),
            })),
        }
    }

    /// Iterates over the set slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledFunction> {
        self.functions.iter().flatten()
    }
}
