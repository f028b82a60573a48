//! Global functions and number methods.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use stylescript_foundation::{Error, Result};

use super::{arg, number_arg, to_integer};
use crate::heap::Heap;
use crate::object::NativeFn;
use crate::value::{Value, number_to_string};

pub(crate) const FUNCTIONS: &[(&str, u8, NativeFn)] = &[
    ("parseInt", 2, global_parse_int),
    ("parseFloat", 1, global_parse_float),
    ("isNaN", 1, global_is_nan),
    ("isFinite", 1, global_is_finite),
    ("String", 1, global_string),
    ("Number", 1, global_number),
    ("Boolean", 1, global_boolean),
];

pub(crate) const NUMBER_METHODS: &[(&str, u8, NativeFn)] = &[
    ("toFixed", 1, number_to_fixed),
    ("toString", 1, number_to_string_method),
];

fn global_parse_int(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    let text = arg(args, 0).to_js_string();
    let radix = to_integer(number_arg(args, 1, 0.0)) as u32;
    Ok(Value::Number(parse_int(&text, radix)))
}

/// Parses the longest integer prefix of `text`.
///
/// A radix of 0 means 10, or 16 with a `0x` prefix.
pub(crate) fn parse_int(text: &str, radix: u32) -> f64 {
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0_f64;
    let mut digits = 0;
    for c in s.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        value = value * f64::from(radix) + f64::from(d);
        digits += 1;
    }
    if digits == 0 {
        return f64::NAN;
    }
    if negative { -value } else { value }
}

fn global_parse_float(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    let text = arg(args, 0).to_js_string();
    Ok(Value::Number(parse_float(&text)))
}

/// Parses the longest decimal literal prefix of `text`.
pub(crate) fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

fn global_is_nan(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
}

fn global_is_finite(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
}

fn global_string(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Ok(Value::from(""));
    }
    Ok(Value::String(arg(args, 0).to_js_string()))
}

fn global_number(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(args, 0, 0.0)))
}

fn global_boolean(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(arg(args, 0).to_boolean()))
}

fn this_number(this: &Value, method: &str) -> Result<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        other => Err(Error::type_error(format!(
            "Number.prototype.{method} called on {}",
            other.type_of()
        ))),
    }
}

fn number_to_fixed(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let n = this_number(this, "toFixed")?;
    let digits = to_integer(number_arg(args, 0, 0.0));
    if !(0.0..=100.0).contains(&digits) {
        return Err(Error::range("toFixed() digits argument must be between 0 and 100"));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(n)));
    }
    // Negative zero prints without a sign.
    let n = if n == 0.0 { 0.0 } else { n };
    Ok(Value::from(format!("{:.*}", digits as usize, n)))
}

fn number_to_string_method(_: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
    let n = this_number(this, "toString")?;
    let radix = to_integer(number_arg(args, 0, 10.0));
    if !(2.0..=36.0).contains(&radix) {
        return Err(Error::range("toString() radix must be between 2 and 36"));
    }
    let radix = radix as u32;
    if radix == 10 || !n.is_finite() {
        return Ok(Value::from(number_to_string(n)));
    }
    Ok(Value::from(number_to_radix(n, radix)))
}

/// Formats a finite number in `radix`, emitting fraction digits until the
/// remainder is below half the gap to the next representable value.
fn number_to_radix(n: f64, radix: u32) -> String {
    let value = n.abs();
    let mut integer = value.trunc();
    let mut fraction = value - integer;
    let base = f64::from(radix);
    let next = f64::from_bits(value.to_bits() + 1);
    let mut delta = (0.5 * (next - value)).max(f64::from_bits(1));

    let mut digits: Vec<u32> = Vec::new();
    if fraction >= delta {
        loop {
            fraction *= base;
            delta *= base;
            let digit = fraction as u32;
            digits.push(digit);
            fraction -= f64::from(digit);
            if (fraction > 0.5 || (fraction == 0.5 && digit & 1 == 1)) && fraction + delta > 1.0 {
                // Round up, carrying into earlier digits.
                loop {
                    match digits.pop() {
                        None => {
                            integer += 1.0;
                            break;
                        }
                        Some(last) if last + 1 < radix => {
                            digits.push(last + 1);
                            break;
                        }
                        Some(_) => {}
                    }
                }
                break;
            }
            if fraction < delta {
                break;
            }
        }
    }

    let mut text = integer_to_radix(integer, radix);
    if !digits.is_empty() {
        text.push('.');
        text.extend(digits.iter().map(|&d| char::from_digit(d, radix).unwrap_or('0')));
    }
    if n < 0.0 {
        text.insert(0, '-');
    }
    text
}

fn integer_to_radix(n: f64, radix: u32) -> String {
    let negative = n < 0.0;
    let mut magnitude = n.abs();
    let mut digits = Vec::new();
    while magnitude >= 1.0 {
        let d = (magnitude % f64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        magnitude = (magnitude / f64::from(radix)).floor();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
