//! Handles to values on the script stack.
//!
//! A [`ValueHandle`] names a stack slot; it owns nothing. It stays valid
//! until the stack is popped or rolled back past its slot, after which it
//! reads as `undefined` (or as whatever value later took the slot).
//!
//! Reads never fail: conversions of values of the wrong type yield empty
//! results. Writes consume the value at the top of the stack, so the value
//! being written is first brought there with
//! [`ValueHandle::ensure_exists_on_stack_top`].

use stylescript_language::{ObjectKind, Value};
use tracing::warn;

use crate::context::{FeatureScope, ScriptContext};

/// A context that handle reads can go through.
///
/// Reads through a [`FeatureScope`] answer properties of the `feature`
/// object from the active feature; reads through a bare [`ScriptContext`]
/// see no feature.
pub trait ReadContext {
    /// Returns the underlying context.
    fn context_mut(&mut self) -> &mut ScriptContext;

    /// Reads `target[key]`; failed reads yield `undefined`.
    fn read_index(&mut self, target: &Value, key: &Value) -> Value;
}

impl ReadContext for ScriptContext {
    fn context_mut(&mut self) -> &mut ScriptContext {
        self
    }

    fn read_index(&mut self, target: &Value, key: &Value) -> Value {
        self.read_index_with(target, key, None)
    }
}

impl ReadContext for FeatureScope<'_> {
    fn context_mut(&mut self) -> &mut ScriptContext {
        &mut **self
    }

    fn read_index(&mut self, target: &Value, key: &Value) -> Value {
        let feature = self.feature();
        self.context_mut().read_index_with(target, key, Some(feature))
    }
}

/// A non-owning reference to one slot of the script stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueHandle {
    slot: usize,
}

/// Snapshot of the stack depth.
///
/// Passing it to [`ScriptContext::reset_to_scope_marker`] drops every value
/// pushed since, invalidating their handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeMarker(pub(crate) usize);

impl ScopeMarker {
    /// Returns the stack depth this marker records.
    #[must_use]
    pub const fn depth(self) -> usize {
        self.0
    }
}

impl ValueHandle {
    pub(crate) const fn new(slot: usize) -> Self {
        Self { slot }
    }

    /// Returns the stack slot.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.slot
    }

    /// Returns true if the slot is currently on the stack.
    #[must_use]
    pub fn is_valid(self, ctx: &ScriptContext) -> bool {
        self.slot < ctx.stack_depth()
    }

    /// Returns a copy of the referenced value.
    #[must_use]
    pub fn value(self, ctx: &ScriptContext) -> Value {
        ctx.vm().value_at(self.slot).cloned().unwrap_or_default()
    }

    fn with<R>(self, ctx: &ScriptContext, f: impl FnOnce(&Value) -> R) -> R {
        match ctx.vm().value_at(self.slot) {
            Some(value) => f(value),
            None => f(&Value::Undefined),
        }
    }

    // =========================================================================
    // Type Predicates
    // =========================================================================

    /// Returns true for `undefined`.
    #[must_use]
    pub fn is_undefined(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::Undefined))
    }

    /// Returns true for `null`.
    #[must_use]
    pub fn is_null(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::Null))
    }

    /// Returns true for booleans.
    #[must_use]
    pub fn is_boolean(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::Bool(_)))
    }

    /// Returns true for numbers.
    #[must_use]
    pub fn is_number(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::Number(_)))
    }

    /// Returns true for strings.
    #[must_use]
    pub fn is_string(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::String(_)))
    }

    /// Returns true for arrays.
    #[must_use]
    pub fn is_array(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| match v {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Array(_)),
            _ => false,
        })
    }

    /// Returns true for objects of any kind, including arrays and functions.
    #[must_use]
    pub fn is_object(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, |v| matches!(v, Value::Object(_)))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Converts with script truthiness.
    #[must_use]
    pub fn to_bool(self, ctx: &ScriptContext) -> bool {
        self.with(ctx, Value::to_boolean)
    }

    /// Converts to an integer, truncating toward zero and saturating.
    /// `NaN` converts to 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_int(self, ctx: &ScriptContext) -> i32 {
        self.with(ctx, |v| v.to_number() as i32)
    }

    /// Converts to a number.
    #[must_use]
    pub fn to_double(self, ctx: &ScriptContext) -> f64 {
        self.with(ctx, Value::to_number)
    }

    /// Returns the string contents, or an empty string for non-strings.
    #[must_use]
    pub fn to_string(self, ctx: &ScriptContext) -> String {
        self.with(ctx, |v| v.as_str().map(str::to_string).unwrap_or_default())
    }

    /// Returns the length of a string or array, 0 for anything else.
    #[must_use]
    pub fn get_length(self, ctx: &ScriptContext) -> usize {
        self.with(ctx, |v| match v {
            Value::String(s) => s.chars().count(),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(items) => items.len(),
                _ => 0,
            },
            _ => 0,
        })
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    /// Pushes `self[index]` and returns its handle.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_value_at_index<C: ReadContext>(self, ctx: &mut C, index: usize) -> ValueHandle {
        let target = self.value(ctx.context_mut());
        let value = ctx.read_index(&target, &Value::Number(index as f64));
        ctx.context_mut().push_value(value)
    }

    /// Pushes `self[name]` and returns its handle.
    pub fn get_value_for_property<C: ReadContext>(self, ctx: &mut C, name: &str) -> ValueHandle {
        let target = self.value(ctx.context_mut());
        let value = ctx.read_index(&target, &Value::from(name));
        ctx.context_mut().push_value(value)
    }

    /// Writes `self[index] = value`, consuming `value` from the stack top.
    ///
    /// Returns false if the write failed.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_value_at_index(
        self,
        ctx: &mut ScriptContext,
        index: usize,
        value: ValueHandle,
    ) -> bool {
        self.put(ctx, &Value::Number(index as f64), value)
    }

    /// Writes `self[name] = value`, consuming `value` from the stack top.
    ///
    /// Returns false if the write failed.
    pub fn set_value_for_property(
        self,
        ctx: &mut ScriptContext,
        name: &str,
        value: ValueHandle,
    ) -> bool {
        self.put(ctx, &Value::from(name), value)
    }

    fn put(self, ctx: &mut ScriptContext, key: &Value, value: ValueHandle) -> bool {
        let target = self.value(ctx);
        if !value.ensure_exists_on_stack_top(ctx) {
            warn!(slot = value.slot, "cannot write a value from an invalid handle");
            return false;
        }
        let Some(value) = ctx.vm_mut().pop() else {
            return false;
        };
        match ctx.vm_mut().set_index(&target, key, value) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, key = %key, "property write failed");
                false
            }
        }
    }

    /// Duplicates the referenced value to the top of the stack, unless it is
    /// already there.
    ///
    /// Returns false if the handle is invalid.
    pub fn ensure_exists_on_stack_top(self, ctx: &mut ScriptContext) -> bool {
        let depth = ctx.stack_depth();
        if depth > 0 && self.slot == depth - 1 {
            return true;
        }
        ctx.vm_mut().dup(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_constructors() {
        let mut ctx = ScriptContext::new();
        let null = ctx.new_null();
        let flag = ctx.new_boolean(true);
        let num = ctx.new_number(2.5);
        let text = ctx.new_string("road");
        let array = ctx.new_array();
        let object = ctx.new_object();

        assert!(null.is_null(&ctx));
        assert!(flag.is_boolean(&ctx) && flag.to_bool(&ctx));
        assert!(num.is_number(&ctx));
        assert!((num.to_double(&ctx) - 2.5).abs() < f64::EPSILON);
        assert_eq!(num.to_int(&ctx), 2);
        assert!(text.is_string(&ctx));
        assert_eq!(text.to_string(&ctx), "road");
        assert!(array.is_array(&ctx) && array.is_object(&ctx));
        assert!(object.is_object(&ctx) && !object.is_array(&ctx));
    }

    #[test]
    fn conversions_fail_softly() {
        let mut ctx = ScriptContext::new();
        let num = ctx.new_number(7.0);
        assert_eq!(num.to_string(&ctx), "");
        assert_eq!(num.get_length(&ctx), 0);

        let nan = ctx.new_number(f64::NAN);
        assert_eq!(nan.to_int(&ctx), 0);
        let big = ctx.new_number(1e12);
        assert_eq!(big.to_int(&ctx), i32::MAX);
    }

    #[test]
    fn stale_handle_reads_undefined() {
        let mut ctx = ScriptContext::new();
        let marker = ctx.get_scope_marker();
        let text = ctx.new_string("gone");
        ctx.reset_to_scope_marker(marker);
        assert!(!text.is_valid(&ctx));
        assert!(text.is_undefined(&ctx));
        assert_eq!(text.to_string(&ctx), "");
    }

    #[test]
    fn array_writes_consume_top() {
        let mut ctx = ScriptContext::new();
        let array = ctx.new_array();
        let depth = ctx.stack_depth();

        let first = ctx.new_number(1.0);
        assert!(array.set_value_at_index(&mut ctx, 0, first));
        assert_eq!(ctx.stack_depth(), depth);

        let second = ctx.new_string("two");
        assert!(array.set_value_at_index(&mut ctx, 1, second));
        assert_eq!(array.get_length(&ctx), 2);

        let read = array.get_value_at_index(&mut ctx, 1);
        assert_eq!(read.to_string(&ctx), "two");
    }

    #[test]
    fn writes_from_lower_slots_duplicate_first() {
        let mut ctx = ScriptContext::new();
        let value = ctx.new_number(3.0);
        let object = ctx.new_object();
        let depth = ctx.stack_depth();

        assert!(object.set_value_for_property(&mut ctx, "width", value));
        assert_eq!(ctx.stack_depth(), depth);
        assert!(value.is_number(&ctx));

        let width = object.get_value_for_property(&mut ctx, "width");
        assert_eq!(width.to_int(&ctx), 3);
    }

    #[test]
    fn write_to_null_fails() {
        let mut ctx = ScriptContext::new();
        let null = ctx.new_null();
        let value = ctx.new_number(1.0);
        assert!(!null.set_value_for_property(&mut ctx, "x", value));
    }

    #[test]
    fn ensure_on_top_is_idempotent_for_top() {
        let mut ctx = ScriptContext::new();
        let value = ctx.new_number(1.0);
        let depth = ctx.stack_depth();
        assert!(value.ensure_exists_on_stack_top(&mut ctx));
        assert_eq!(ctx.stack_depth(), depth);

        let stale = ValueHandle::new(depth + 10);
        assert!(!stale.ensure_exists_on_stack_top(&mut ctx));
    }
}
