//! Configuration for a script context.

use stylescript_language::{FatalHandler, VmConfig};

/// Default upper bound on function registry indices.
pub const DEFAULT_MAX_FUNCTIONS: usize = 1 << 16;

/// Configuration for a [`ScriptContext`](crate::ScriptContext).
///
/// Wraps the engine's [`VmConfig`] and adds the registry bound.
#[derive(Clone, Copy, Debug)]
pub struct ContextConfig {
    /// Engine limits and fatal handler.
    pub vm: VmConfig,

    /// Registration at an index `>= max_functions` is rejected.
    pub max_functions: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            vm: VmConfig::default(),
            max_functions: DEFAULT_MAX_FUNCTIONS,
        }
    }
}

impl ContextConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to replace the engine configuration.
    #[must_use]
    pub fn with_vm_config(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    /// Builder method to set the registry bound.
    #[must_use]
    pub fn with_max_functions(mut self, max: usize) -> Self {
        self.max_functions = max;
        self
    }

    /// Builder method to set the maximum script call depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.vm = self.vm.with_max_call_depth(depth);
        self
    }

    /// Builder method to set the allocation count that triggers collection.
    #[must_use]
    pub fn with_gc_threshold(mut self, allocations: usize) -> Self {
        self.vm = self.vm.with_gc_threshold(allocations);
        self
    }

    /// Builder method to cap live heap objects. Exceeding the cap is fatal.
    #[must_use]
    pub fn with_max_heap_objects(mut self, limit: Option<usize>) -> Self {
        self.vm = self.vm.with_max_heap_objects(limit);
        self
    }

    /// Builder method to set the fatal error handler.
    #[must_use]
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.vm = self.vm.with_fatal_handler(handler);
        self
    }
}
