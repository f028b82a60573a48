//! Array methods.

#![allow(clippy::cast_precision_loss)]

use stylescript_foundation::{Error, Result};

use super::{arg, number_arg, relative_index};
use crate::heap::Heap;
use crate::object::{NativeFn, ObjectKind};
use crate::value::{ObjectRef, Value, join_values};

pub(crate) const METHODS: &[(&str, u8, NativeFn)] = &[
    ("push", 1, array_push),
    ("pop", 0, array_pop),
    ("indexOf", 1, array_index_of),
    ("join", 1, array_join),
    ("slice", 2, array_slice),
    ("toString", 0, array_to_string),
];

fn this_array<'a>(this: &'a Value, method: &str) -> Result<&'a ObjectRef> {
    match this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)) => Ok(obj),
        other => Err(Error::type_error(format!(
            "Array.prototype.{method} called on {}",
            other.type_of()
        ))),
    }
}

/// Runs `f` over the items of an array receiver.
fn with_items<T>(this: &Value, method: &str, f: impl FnOnce(&mut Vec<Value>) -> T) -> Result<T> {
    let obj = this_array(this, method)?;
    let mut object = obj.borrow_mut();
    match &mut object.kind {
        ObjectKind::Array(items) => Ok(f(items)),
        _ => Err(Error::internal("array receiver changed kind")),
    }
}

fn array_push(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let len = with_items(this, "push", |items| {
        items.extend_from_slice(args);
        items.len()
    })?;
    Ok(Value::Number(len as f64))
}

fn array_pop(_: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    let popped = with_items(this, "pop", Vec::pop)?;
    Ok(popped.unwrap_or_default())
}

fn array_index_of(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let needle = arg(args, 0);
    let found = with_items(this, "indexOf", |items| {
        let from = relative_index(number_arg(args, 1, 0.0), items.len());
        items[from..]
            .iter()
            .position(|item| item.strict_equals(&needle))
            .map(|i| i + from)
    })?;
    Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

fn array_join(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let separator = match arg(args, 0) {
        Value::Undefined => ",".into(),
        sep => sep.to_js_string(),
    };
    // Snapshot so that nested arrays can be rendered without a live borrow.
    let items = with_items(this, "join", |items| items.clone())?;
    Ok(Value::from(join_values(&items, &separator, 1)))
}

fn array_slice(heap: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let sliced = with_items(this, "slice", |items| {
        let len = items.len();
        let start = relative_index(number_arg(args, 0, 0.0), len);
        let end = relative_index(number_arg(args, 1, len as f64), len);
        if end > start {
            items[start..end].to_vec()
        } else {
            Vec::new()
        }
    })?;
    heap.alloc_array(sliced)
}

fn array_to_string(heap: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    array_join(heap, this, &[])
}
