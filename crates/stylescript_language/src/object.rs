//! Heap object layouts.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use stylescript_foundation::Result;

use crate::compiler::FunctionProto;
use crate::heap::Heap;
use crate::value::Value;

/// A shared, mutable variable captured by one or more closures.
pub type Upvalue = Rc<RefCell<Value>>;

/// Signature of a builtin function: `(heap, this, args) -> result`.
pub type NativeFn = fn(&mut Heap, &Value, &[Value]) -> Result<Value>;

/// A heap object: a kind-specific payload plus named properties.
#[derive(Debug, Default)]
pub struct Object {
    /// Kind-specific payload.
    pub kind: ObjectKind,
    /// Own named properties in insertion order.
    pub properties: PropertyMap,
}

impl Object {
    /// Creates an object of the given kind with no properties.
    #[must_use]
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
        }
    }

    /// Releases every reference this object holds, breaking reference cycles.
    ///
    /// The object stays alive as an empty shell of the same kind. Shared
    /// upvalues are released, not reset, so other closures keep their view.
    /// The caller drops the returned references after ending its borrow.
    pub(crate) fn clear_contents(&mut self) -> (Vec<Value>, Vec<Upvalue>) {
        let mut values: Vec<Value> = self.properties.drain().collect();
        let mut upvalues = Vec::new();
        match &mut self.kind {
            ObjectKind::Array(items) => values.append(items),
            ObjectKind::Function(closure) => upvalues.append(&mut closure.upvalues),
            ObjectKind::Ordinary | ObjectKind::Native(_) | ObjectKind::Host(_) => {}
        }
        (values, upvalues)
    }
}

/// Kind-specific object payload.
#[derive(Debug, Default)]
pub enum ObjectKind {
    /// Plain object created by a literal or by the embedder.
    #[default]
    Ordinary,
    /// Dense array.
    Array(Vec<Value>),
    /// Script function with its captured variables.
    Function(Closure),
    /// Builtin function.
    Native(NativeFunction),
    /// Proxy whose property reads are answered by the host.
    Host(u32),
}

impl ObjectKind {
    /// Returns true for script and builtin functions.
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Native(_))
    }

    /// Returns a short class name for diagnostics.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Ordinary => "Object",
            Self::Array(_) => "Array",
            Self::Function(_) | Self::Native(_) => "Function",
            Self::Host(_) => "Host",
        }
    }
}

/// A compiled function paired with its captured variables.
#[derive(Debug)]
pub struct Closure {
    /// Compiled code.
    pub proto: Rc<FunctionProto>,
    /// Captured variables, indexed by the function's capture table.
    pub upvalues: Vec<Upvalue>,
}

/// A builtin function.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    /// Name reported by `String(fn)` and in errors.
    pub name: &'static str,
    /// Declared parameter count (the `length` property).
    pub arity: u8,
    /// Implementation.
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered string-keyed property storage.
///
/// Objects in style scripts carry a handful of properties, so a linear
/// scan beats hashing.
#[derive(Debug, Default)]
pub struct PropertyMap {
    entries: Vec<(Rc<str>, Value)>,
}

impl PropertyMap {
    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    /// Stores `value` under `key`, keeping the original insertion slot.
    pub fn set(&mut self, key: impl Into<Rc<str>>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| &**k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates stored values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn drain(&mut self) -> impl Iterator<Item = Value> + '_ {
        self.entries.drain(..).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_map_keeps_insertion_order() {
        let mut props = PropertyMap::default();
        props.set("b", Value::from(1));
        props.set("a", Value::from(2));
        props.set("b", Value::from(3));
        let keys: Vec<_> = props.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(props.get("b"), Some(&Value::from(3)));
        assert_eq!(props.remove("a"), Some(Value::from(2)));
        assert!(!props.contains("a"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn clear_contents_releases_values() {
        let mut object = Object::new(ObjectKind::Array(vec![Value::from(1), Value::from(2)]));
        object.properties.set("x", Value::from("y"));
        let (values, upvalues) = object.clear_contents();
        assert_eq!(values.len(), 3);
        assert!(upvalues.is_empty());
        assert!(object.properties.is_empty());
        assert!(matches!(&object.kind, ObjectKind::Array(items) if items.is_empty()));
    }
}
