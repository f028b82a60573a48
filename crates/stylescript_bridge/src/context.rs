//! The script context: one engine instance plus everything style functions
//! are evaluated against.
//!
//! # Stack Discipline
//!
//! Value constructors push onto the engine stack and return a
//! [`ValueHandle`]. A successful evaluation leaves exactly one result on top
//! of the stack for the caller to consume; a failed one leaves the stack as
//! it was. Temporaries are reclaimed with [`ScriptContext::pop`] or by
//! rolling back to a [`ScopeMarker`].
//!
//! # Active Feature
//!
//! [`ScriptContext::set_current_feature`] borrows a feature for the lifetime
//! of the returned [`FeatureScope`]. Evaluations through the scope see the
//! feature as `feature`; evaluations outside any scope see a `feature`
//! object without properties.


use std::ops::{Deref, DerefMut};

use stylescript_foundation::{Feature, FilterKey, GeometryType, Result};
use stylescript_language::{Value, Vm};
use tracing::{debug, error, warn};

use crate::accessor::{FEATURE_OBJECT_ID, FeatureAccessor, FeatureHost};
use crate::bindings::AmbientContext;
use crate::cache::CacheStats;
use crate::config::ContextConfig;
use crate::handle::{ScopeMarker, ValueHandle};
use crate::registry::{CompiledFunction, ContextFlags, FunctionRegistry};

/// Stash key of the array anchoring registered functions.
pub(crate) const FUNCTIONS_STASH: &str = "functions";
/// Stash key of the `feature` host object.
pub(crate) const FEATURE_STASH: &str = "feature";
/// Stash key of the global style object.
pub(crate) const GLOBAL_STASH: &str = "global";

/// An engine instance with its function registry, feature accessor, and
/// global bindings.
///
/// Not `Send`: a context belongs to one worker. Run one context per thread
/// and register the same sources in each.
pub struct ScriptContext {
    pub(crate) vm: Vm,
    pub(crate) registry: FunctionRegistry,
    pub(crate) accessor: FeatureAccessor,
    pub(crate) ambient: AmbientContext,
    config: ContextConfig,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("functions", &self.registry.len())
            .field("stack_depth", &self.vm.stack_len())
            .field("ambient", &self.ambient)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScriptContext {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates a context with the given configuration.
    ///
    /// Defines the geometry constants `point`, `line` and `polygon`, and
    /// stashes the function anchor array and the `feature` object. Program
    /// text run with [`ScriptContext::eval`] also sees `feature` as a global.
    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        let mut vm = Vm::with_config(config.vm);
        for kind in GeometryType::NAMED {
            if let Some(name) = kind.script_name() {
                vm.set_global(name, Value::from(kind.code()));
            }
        }
        let anchors = vm.new_array(Vec::new());
        vm.stash_put(FUNCTIONS_STASH, anchors);
        let feature = vm.new_host_object(FEATURE_OBJECT_ID);
        vm.set_global(FEATURE_STASH, feature.clone());
        vm.stash_put(FEATURE_STASH, feature);

        debug!(max_functions = config.max_functions, "created script context");
        Self {
            vm,
            registry: FunctionRegistry::new(),
            accessor: FeatureAccessor::new(),
            ambient: AmbientContext::new(),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the engine.
    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub(crate) fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Returns the function registry.
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Returns the property cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.accessor.stats()
    }

    // =========================================================================
    // Stack
    // =========================================================================

    /// Returns the number of values on the engine stack.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.vm.stack_len()
    }

    /// Returns a handle to the top of the stack.
    #[must_use]
    pub fn get_stack_top_value(&self) -> Option<ValueHandle> {
        self.vm.stack_len().checked_sub(1).map(ValueHandle::new)
    }

    /// Records the current stack depth.
    #[must_use]
    pub fn get_scope_marker(&self) -> ScopeMarker {
        ScopeMarker(self.vm.stack_len())
    }

    /// Truncates the stack back to `marker`.
    pub fn reset_to_scope_marker(&mut self, marker: ScopeMarker) {
        self.vm.set_stack_len(marker.0);
    }

    /// Pops the top of the stack.
    pub fn pop(&mut self) -> Option<Value> {
        self.vm.pop()
    }

    pub(crate) fn push_value(&mut self, value: Value) -> ValueHandle {
        self.vm.push(value);
        ValueHandle::new(self.vm.stack_len() - 1)
    }

    /// Reads `target[key]` against `feature`; failed reads yield `undefined`.
    pub(crate) fn read_index_with(
        &mut self,
        target: &Value,
        key: &Value,
        feature: Option<&Feature>,
    ) -> Value {
        let mut host = FeatureHost::new(&mut self.accessor, feature);
        self.vm.get_index(target, key, &mut host).unwrap_or_default()
    }

    // =========================================================================
    // Value Constructors
    // =========================================================================

    /// Pushes `null`.
    pub fn new_null(&mut self) -> ValueHandle {
        self.push_value(Value::Null)
    }

    /// Pushes a boolean.
    pub fn new_boolean(&mut self, value: bool) -> ValueHandle {
        self.push_value(Value::Bool(value))
    }

    /// Pushes a number.
    pub fn new_number(&mut self, value: f64) -> ValueHandle {
        self.push_value(Value::Number(value))
    }

    /// Pushes a string.
    pub fn new_string(&mut self, value: &str) -> ValueHandle {
        self.push_value(Value::from(value))
    }

    /// Pushes an empty array.
    pub fn new_array(&mut self) -> ValueHandle {
        let array = self.vm.new_array(Vec::new());
        self.push_value(array)
    }

    /// Pushes an empty object.
    pub fn new_object(&mut self) -> ValueHandle {
        let object = self.vm.new_object();
        self.push_value(object)
    }

    /// Compiles a function expression and pushes it, without registering it.
    ///
    /// Returns `None` and logs a warning if the source does not compile.
    pub fn new_function(&mut self, source: &str) -> Option<ValueHandle> {
        match self.vm.compile_function(source) {
            Ok(function) => Some(self.push_value(function)),
            Err(err) => {
                warn!(error = %err, source, "compile failed in global function");
                None
            }
        }
    }

    /// Runs program text in the global scope and returns its completion value.
    ///
    /// The stack is left unchanged.
    ///
    /// # Errors
    /// Returns the syntax or runtime error that ended the program.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.eval_with(source, None)
    }

    fn eval_with(&mut self, source: &str, feature: Option<&Feature>) -> Result<Value> {
        let mut host = FeatureHost::new(&mut self.accessor, feature);
        self.vm.eval(source, &mut host)
    }

    // =========================================================================
    // Function Registry
    // =========================================================================

    /// Registers `source` as the function at `index`.
    ///
    /// The slot is cleared before compiling, so a failed registration leaves
    /// no function at `index`, even if one was registered before. Other slots
    /// are never touched. Indices at or past
    /// [`ContextConfig::max_functions`] are rejected without growing the
    /// registry. Returns false and logs a warning on failure.
    pub fn set_function(&mut self, index: usize, source: &str) -> bool {
        if index >= self.config.max_functions {
            warn!(
                index,
                max = self.config.max_functions,
                "function index beyond registry bound"
            );
            return false;
        }
        self.registry.invalidate(index);
        if !self.anchor(index, Value::Undefined) {
            return false;
        }

        let flags = ContextFlags::scan(source);
        let rewritten = flags.splice_parameters(source);
        match self.vm.compile_function(&rewritten) {
            Ok(callable) => {
                if !self.anchor(index, callable.clone()) {
                    return false;
                }
                self.registry.install(CompiledFunction {
                    index,
                    callable,
                    flags,
                    source: rewritten,
                });
                true
            }
            Err(err) => {
                warn!(index, error = %err, source = %rewritten, "compile failed");
                false
            }
        }
    }

    /// Stores `value` at `index` of the anchor array.
    #[allow(clippy::cast_precision_loss)]
    fn anchor(&mut self, index: usize, value: Value) -> bool {
        let Some(anchors) = self.vm.stash_get(FUNCTIONS_STASH).cloned() else {
            error!("function anchor array not initialized");
            return false;
        };
        match self
            .vm
            .set_index(&anchors, &Value::Number(index as f64), value)
        {
            Ok(()) => true,
            Err(err) => {
                error!(index, error = %err, "cannot anchor function");
                false
            }
        }
    }

    /// Calls the function at `index` with no active feature.
    ///
    /// On success the result is left on top of the stack.
    pub fn evaluate_function(&mut self, index: usize) -> bool {
        self.evaluate(index, None)
    }

    /// Calls the function at `index` and pops its result as a boolean.
    pub fn evaluate_boolean_function(&mut self, index: usize) -> bool {
        self.evaluate_boolean(index, None)
    }

    /// Calls the function at `index` and returns a handle to its result.
    pub fn function_result(&mut self, index: usize) -> Option<ValueHandle> {
        self.evaluate(index, None)
            .then(|| self.get_stack_top_value())
            .flatten()
    }

    fn evaluate_boolean(&mut self, index: usize, feature: Option<&Feature>) -> bool {
        if !self.evaluate(index, feature) {
            return false;
        }
        self.vm.pop().is_some_and(|result| result.to_boolean())
    }

    fn evaluate(&mut self, index: usize, feature: Option<&Feature>) -> bool {
        let (callable, flags) = match self.registry.get(index) {
            Ok(function) => (function.callable.clone(), function.flags),
            Err(err) => {
                error!(error = %err, size = self.registry.len(), "cannot evaluate function");
                return false;
            }
        };

        self.vm.push(callable);
        let mut nargs = 0;
        if flags.contains(ContextFlags::GLOBAL) {
            let global = self.vm.stash_get(GLOBAL_STASH).cloned().unwrap_or_default();
            self.vm.push(global);
            nargs += 1;
        }
        if flags.contains(ContextFlags::FEATURE) {
            let object = self.vm.stash_get(FEATURE_STASH).cloned().unwrap_or_default();
            self.vm.push(object);
            nargs += 1;
        }
        if flags.contains(ContextFlags::ZOOM) {
            self.vm.push(Value::from(self.ambient.get(FilterKey::Zoom)));
            nargs += 1;
        }
        if flags.contains(ContextFlags::GEOMETRY) {
            self.vm.push(Value::from(self.ambient.get(FilterKey::Geometry)));
            nargs += 1;
        }

        let mut host = FeatureHost::new(&mut self.accessor, feature);
        match self.vm.call(nargs, &mut host) {
            Ok(()) => true,
            Err(err) => {
                let source = self
                    .registry
                    .get(index)
                    .map(|function| function.source.as_str())
                    .unwrap_or_default();
                warn!(
                    error = %err,
                    index,
                    feature = ?feature.map(|f| f.id),
                    source,
                    "function evaluation failed"
                );
                false
            }
        }
    }

    // =========================================================================
    // Active Feature
    // =========================================================================

    /// Makes `feature` the active feature until the returned scope is dropped.
    ///
    /// Invalidates the property cache.
    pub fn set_current_feature<'a>(&'a mut self, feature: &'a Feature) -> FeatureScope<'a> {
        self.accessor.set_current_feature(Some(feature));
        FeatureScope {
            context: self,
            feature,
        }
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        let stats = self.accessor.stats();
        debug!(
            gets = stats.gets,
            reused = stats.reused,
            reuse_percent = stats.reuse_percent(),
            functions = self.registry.iter().count(),
            "releasing script context"
        );
    }
}

// =============================================================================
// FeatureScope
// =============================================================================

/// A [`ScriptContext`] with an active feature.
///
/// Evaluations through the scope read the feature through the `feature`
/// object. Dropping the scope clears the active feature.
pub struct FeatureScope<'a> {
    context: &'a mut ScriptContext,
    feature: &'a Feature,
}

impl<'a> FeatureScope<'a> {
    /// Returns the active feature.
    #[must_use]
    pub fn feature(&self) -> &'a Feature {
        self.feature
    }

    /// Switches to another feature, invalidating the property cache.
    pub fn set_current_feature(&mut self, feature: &'a Feature) {
        self.context.accessor.set_current_feature(Some(feature));
        self.feature = feature;
    }

    /// Calls the function at `index` against the active feature.
    ///
    /// On success the result is left on top of the stack.
    pub fn evaluate_function(&mut self, index: usize) -> bool {
        self.context.evaluate(index, Some(self.feature))
    }

    /// Calls the function at `index` and pops its result as a boolean.
    pub fn evaluate_boolean_function(&mut self, index: usize) -> bool {
        self.context.evaluate_boolean(index, Some(self.feature))
    }

    /// Calls the function at `index` and returns a handle to its result.
    pub fn function_result(&mut self, index: usize) -> Option<ValueHandle> {
        self.evaluate_function(index)
            .then(|| self.context.get_stack_top_value())
            .flatten()
    }

    /// Runs program text with the active feature visible as `feature`.
    ///
    /// # Errors
    /// Returns the syntax or runtime error that ended the program.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let feature = self.feature;
        self.context.eval_with(source, Some(feature))
    }
}

impl Deref for FeatureScope<'_> {
    type Target = ScriptContext;

    fn deref(&self) -> &ScriptContext {
        self.context
    }
}

impl DerefMut for FeatureScope<'_> {
    fn deref_mut(&mut self) -> &mut ScriptContext {
        self.context
    }
}

impl Drop for FeatureScope<'_> {
    fn drop(&mut self) {
        self.context.accessor.set_current_feature(None);
    }
}
