//! Native function implementations for the VM.
//!
//! This module contains the operator helpers shared by the interpreter loop
//! and the builtin library: global functions, `Math`, and the methods of
//! strings, arrays and numbers.

#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]

mod array;
mod global;
mod math;
mod string;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use stylescript_foundation::Result;

use crate::heap::Heap;
use crate::object::{NativeFn, NativeFunction, Object, ObjectKind};
use crate::value::{Value, to_int32};

pub(crate) use string::{char_at, char_len};

// =============================================================================
// Operator Helpers
// =============================================================================

/// Converts objects to their primitive (string) form; primitives pass through.
fn to_primitive(value: Value) -> Value {
    match value {
        Value::Object(_) => Value::String(value.to_js_string()),
        other => other,
    }
}

/// The `+` operator: string concatenation if either side is a string after
/// primitive conversion, numeric addition otherwise.
pub(crate) fn add_values(a: Value, b: Value) -> Value {
    let (a, b) = (to_primitive(a), to_primitive(b));
    match (&a, &b) {
        (Value::String(x), Value::String(y)) => {
            let mut out = String::with_capacity(x.len() + y.len());
            out.push_str(x);
            out.push_str(y);
            Value::from(out)
        }
        (Value::String(_), _) | (_, Value::String(_)) => {
            Value::from(format!("{}{}", a.to_js_string(), b.to_js_string()))
        }
        _ => Value::Number(a.to_number() + b.to_number()),
    }
}

/// Compares two values for the relational operators.
///
/// Returns `None` when the comparison is undefined (NaN involved).
pub(crate) fn compare_values(a: Value, b: Value) -> Option<Ordering> {
    let (a, b) = (to_primitive(a), to_primitive(b));
    match (&a, &b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// Shift operators mask the count to five bits.
pub(crate) fn shift_count(b: &Value) -> u32 {
    b.to_uint32() & 0x1f
}

/// Bitwise not.
pub(crate) fn bit_not(a: &Value) -> f64 {
    f64::from(!to_int32(a.to_number()))
}

// =============================================================================
// Argument Helpers
// =============================================================================

/// Returns argument `i`, or `undefined` if it was not passed.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// Returns argument `i` converted to a number, or `default` if absent.
pub(crate) fn number_arg(args: &[Value], i: usize, default: f64) -> f64 {
    match args.get(i) {
        None | Some(Value::Undefined) => default,
        Some(v) => v.to_number(),
    }
}

/// Converts a number to an integer the way `ToIntegerOrInfinity` does.
pub(crate) fn to_integer(n: f64) -> f64 {
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// Resolves a relative index (negative counts from the end) into `0..=len`.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub(crate) fn relative_index(n: f64, len: usize) -> usize {
    let n = to_integer(n);
    let len_f = len as f64;
    let resolved = if n < 0.0 {
        (len_f + n).max(0.0)
    } else {
        n.min(len_f)
    };
    resolved as usize
}

/// Allocates a builtin function object.
pub(crate) fn native_function(
    heap: &mut Heap,
    name: &'static str,
    arity: u8,
    func: NativeFn,
) -> Result<Value> {
    heap.alloc(Object::new(ObjectKind::Native(NativeFunction {
        name,
        arity,
        func,
    })))
    .map(Value::Object)
}

fn table(
    heap: &mut Heap,
    entries: &[(&'static str, u8, NativeFn)],
) -> Result<HashMap<&'static str, Value>> {
    let mut methods = HashMap::with_capacity(entries.len());
    for &(name, arity, func) in entries {
        methods.insert(name, native_function(heap, name, arity, func)?);
    }
    Ok(methods)
}

// =============================================================================
// Method Tables
// =============================================================================

/// Builtin methods of primitive strings, arrays and numbers.
///
/// The function objects are allocated once per VM; property reads on a
/// string or array hand out the shared object.
#[derive(Debug, Default)]
pub(crate) struct MethodTables {
    pub string: HashMap<&'static str, Value>,
    pub array: HashMap<&'static str, Value>,
    pub number: HashMap<&'static str, Value>,
}

impl MethodTables {
    pub fn new(heap: &mut Heap) -> Result<Self> {
        Ok(Self {
            string: table(heap, string::METHODS)?,
            array: table(heap, array::METHODS)?,
            number: table(heap, global::NUMBER_METHODS)?,
        })
    }

    /// Every method object, for garbage collection roots.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.string
            .values()
            .chain(self.array.values())
            .chain(self.number.values())
    }
}

/// Installs the global functions and constants.
pub(crate) fn install_globals(
    heap: &mut Heap,
    globals: &mut HashMap<Rc<str>, Value>,
) -> Result<()> {
    globals.insert("undefined".into(), Value::Undefined);
    globals.insert("NaN".into(), Value::Number(f64::NAN));
    globals.insert("Infinity".into(), Value::Number(f64::INFINITY));
    for &(name, arity, func) in global::FUNCTIONS {
        globals.insert(name.into(), native_function(heap, name, arity, func)?);
    }
    globals.insert("Math".into(), math::create(heap)?);
    Ok(())
}
