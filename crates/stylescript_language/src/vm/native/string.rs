//! String methods.
//!
//! Positions count Unicode scalar values.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::rc::Rc;

use stylescript_foundation::{Error, Result};

use super::{arg, number_arg, relative_index, to_integer};
use crate::heap::Heap;
use crate::object::NativeFn;
use crate::value::Value;

pub(crate) const METHODS: &[(&str, u8, NativeFn)] = &[
    ("charAt", 1, string_char_at),
    ("indexOf", 1, string_index_of),
    ("slice", 2, string_slice),
    ("substring", 2, string_substring),
    ("toLowerCase", 0, string_to_lower_case),
    ("toUpperCase", 0, string_to_upper_case),
    ("trim", 0, string_trim),
    ("split", 2, string_split),
    ("replace", 2, string_replace),
    ("toString", 0, string_to_string),
];

fn this_string(this: &Value, method: &str) -> Result<Rc<str>> {
    if this.is_nullish() {
        return Err(Error::type_error(format!(
            "String.prototype.{method} called on {this}"
        )));
    }
    Ok(this.to_js_string())
}

/// Number of characters in `s`.
pub(crate) fn char_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().count()
    }
}

/// Returns the character at position `index`.
pub(crate) fn char_at(s: &str, index: usize) -> Option<char> {
    if s.is_ascii() {
        s.as_bytes().get(index).map(|&b| char::from(b))
    } else {
        s.chars().nth(index)
    }
}

/// Returns the characters in `start..end` (positions clamped to the length).
fn substring(s: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}

fn string_char_at(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "charAt")?;
    let pos = to_integer(number_arg(args, 0, 0.0));
    if pos < 0.0 {
        return Ok(Value::from(""));
    }
    Ok(char_at(&s, pos as usize).map_or_else(|| Value::from(""), |c| Value::from(c.to_string())))
}

fn string_index_of(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "indexOf")?;
    let search = arg(args, 0).to_js_string();
    let from = relative_index(number_arg(args, 1, 0.0).max(0.0), char_len(&s));
    let byte_from = s.char_indices().nth(from).map_or(s.len(), |(i, _)| i);
    let found = s[byte_from..]
        .find(&*search)
        .map(|byte| s[..byte_from + byte].chars().count());
    Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

fn string_slice(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "slice")?;
    let len = char_len(&s);
    let start = relative_index(number_arg(args, 0, 0.0), len);
    let end = relative_index(number_arg(args, 1, len as f64), len);
    Ok(Value::from(substring(&s, start, end)))
}

fn string_substring(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "substring")?;
    let len = char_len(&s);
    let clamp = |n: f64| to_integer(n).clamp(0.0, len as f64) as usize;
    let a = clamp(number_arg(args, 0, 0.0));
    let b = clamp(number_arg(args, 1, len as f64));
    Ok(Value::from(substring(&s, a.min(b), a.max(b))))
}

fn string_to_lower_case(_: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(this_string(this, "toLowerCase")?.to_lowercase()))
}

fn string_to_upper_case(_: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(this_string(this, "toUpperCase")?.to_uppercase()))
}

fn string_trim(_: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    let s = this_string(this, "trim")?;
    let trimmed = s.trim();
    if trimmed.len() == s.len() {
        return Ok(Value::String(s));
    }
    Ok(Value::from(trimmed))
}

fn string_split(heap: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "split")?;
    let limit = match args.get(1) {
        None | Some(Value::Undefined) => usize::MAX,
        Some(v) => v.to_uint32() as usize,
    };
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(s)],
        sep => {
            let sep = sep.to_js_string();
            if sep.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(&*sep).map(Value::from).collect()
            }
        }
    };
    heap.alloc_array(parts.into_iter().take(limit).collect())
}

/// Replaces the first occurrence of a plain string pattern.
fn string_replace(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this, "replace")?;
    let pattern = arg(args, 0).to_js_string();
    let replacement = arg(args, 1).to_js_string();
    Ok(Value::from(s.replacen(&*pattern, &replacement, 1)))
}

fn string_to_string(_: &mut Heap, this: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::String(this_string(this, "toString")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    fn call(f: NativeFn, this: &str, args: &[Value]) -> Value {
        let mut heap = Heap::default();
        f(&mut heap, &Value::from(this), args).expect("native call")
    }

    #[test]
    fn slice_and_substring() {
        assert_eq!(
            call(string_slice, "highway", &[Value::from(-3)]),
            Value::from("way")
        );
        assert_eq!(
            call(string_substring, "highway", &[Value::from(4), Value::from(0)]),
            Value::from("high")
        );
    }

    #[test]
    fn index_of_counts_characters() {
        assert_eq!(
            call(string_index_of, "Straße-Nord", &[Value::from("Nord")]),
            Value::from(7)
        );
        assert_eq!(
            call(string_index_of, "abc", &[Value::from("z")]),
            Value::from(-1)
        );
    }

    #[test]
    fn char_at_out_of_range_is_empty() {
        assert_eq!(
            call(string_char_at, "ab", &[Value::from(5)]),
            Value::from("")
        );
        assert_eq!(call(string_char_at, "ab", &[Value::from(1)]), Value::from("b"));
    }

    #[test]
    fn split_builds_array() {
        let parts = call(string_split, "a;b;c", &[Value::from(";"), Value::from(2)]);
        let Value::Object(obj) = parts else {
            panic!("array expected");
        };
        let object = obj.borrow();
        let ObjectKind::Array(items) = &object.kind else {
            panic!("array expected");
        };
        assert_eq!(items, &vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn replace_first_only() {
        assert_eq!(
            call(string_replace, "a-b-c", &[Value::from("-"), Value::from("+")]),
            Value::from("a+b-c")
        );
    }

    #[test]
    fn methods_reject_undefined_this() {
        let mut heap = Heap::default();
        let err = string_trim(&mut heap, &Value::Undefined, &[]).expect_err("undefined this");
        assert_eq!(err.name(), "TypeError");
    }
}
