//! Global bindings and ambient values.

use stylescript_foundation::FilterKey;
use stylescript_language::Value;
use tracing::warn;

use crate::context::{GLOBAL_STASH, ScriptContext};
use crate::handle::ValueHandle;

/// Name that designates the global style object in
/// [`ScriptContext::set_global_value`].
pub const GLOBAL_BINDING: &str = "global";

/// Integer values set by the style layer and passed to functions that ask
/// for them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AmbientContext {
    values: [i32; FilterKey::COUNT],
}

impl AmbientContext {
    /// Creates a context with every value 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: [0; FilterKey::COUNT],
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub const fn get(&self, key: FilterKey) -> i32 {
        self.values[key.index()]
    }

    /// Sets the value for `key`.
    pub fn set(&mut self, key: FilterKey, value: i32) {
        self.values[key.index()] = value;
    }
}

impl ScriptContext {
    /// Binds `value` under `name`, consuming it from the stack top.
    ///
    /// The name `global` designates the global style object passed to
    /// functions that use `global`; it is kept out of the script's global
    /// scope. Any other name defines an ordinary global.
    pub fn set_global_value(&mut self, name: &str, value: ValueHandle) -> bool {
        let Some(value) = self.take(value) else {
            return false;
        };
        if name == GLOBAL_BINDING {
            if !matches!(value, Value::Object(_)) {
                warn!(kind = value.type_of(), "global style object is not an object");
            }
            self.vm.stash_put(GLOBAL_STASH, value);
        } else {
            self.vm.set_global(name, value);
        }
        true
    }

    /// Defines the ordinary global `name`, consuming `value` from the stack top.
    pub fn define_global(&mut self, name: &str, value: ValueHandle) -> bool {
        let Some(value) = self.take(value) else {
            return false;
        };
        self.vm.set_global(name, value);
        true
    }

    /// Sets an ambient value. Read at call time by functions that use it.
    pub fn set_filter_key(&mut self, key: FilterKey, value: i32) {
        self.ambient.set(key, value);
    }

    /// Returns an ambient value.
    #[must_use]
    pub fn filter_key(&self, key: FilterKey) -> i32 {
        self.ambient.get(key)
    }

    fn take(&mut self, value: ValueHandle) -> Option<Value> {
        if !value.ensure_exists_on_stack_top(self) {
            warn!(slot = value.slot(), "cannot bind a value from an invalid handle");
            return None;
        }
        self.vm.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_slots_are_independent() {
        let mut ambient = AmbientContext::new();
        ambient.set(FilterKey::Zoom, 14);
        ambient.set(FilterKey::Geometry, 2);
        assert_eq!(ambient.get(FilterKey::Zoom), 14);
        assert_eq!(ambient.get(FilterKey::Geometry), 2);
        assert_eq!(ambient.get(FilterKey::Other), 0);
    }

    #[test]
    fn ordinary_globals_are_visible() {
        let mut ctx = ScriptContext::new();
        let value = ctx.new_number(4.0);
        assert!(ctx.define_global("lanes", value));
        assert_eq!(ctx.stack_depth(), 0);
        assert_eq!(ctx.eval("lanes * 2").ok(), Some(Value::Number(8.0)));
    }

    #[test]
    fn global_style_object_is_hidden() {
        let mut ctx = ScriptContext::new();
        let object = ctx.new_object();
        let color = ctx.new_string("#ff0000");
        assert!(object.set_value_for_property(&mut ctx, "water", color));
        assert!(ctx.set_global_value(GLOBAL_BINDING, object));

        assert_eq!(ctx.eval("typeof global").ok(), Some(Value::from("undefined")));
        assert!(ctx.set_function(0, "function() { return global.water }"));
        let result = ctx.function_result(0).expect("evaluates");
        assert_eq!(result.to_string(&ctx), "#ff0000");
    }

    #[test]
    fn geometry_constants_are_defined() {
        let mut ctx = ScriptContext::new();
        assert_eq!(
            ctx.eval("[point, line, polygon].join(',')").ok(),
            Some(Value::from("1,2,3"))
        );
    }

    #[test]
    fn invalid_handle_is_rejected() {
        let mut ctx = ScriptContext::new();
        let marker = ctx.get_scope_marker();
        let value = ctx.new_number(1.0);
        ctx.reset_to_scope_marker(marker);
        assert!(!ctx.define_global("x", value));
    }
}
