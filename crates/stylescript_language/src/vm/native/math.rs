//! The `Math` object.

use stylescript_foundation::Result;

use super::{native_function, number_arg};
use crate::heap::Heap;
use crate::object::NativeFn;
use crate::value::Value;

const FUNCTIONS: &[(&str, u8, NativeFn)] = &[
    ("abs", 1, math_abs),
    ("ceil", 1, math_ceil),
    ("floor", 1, math_floor),
    ("round", 1, math_round),
    ("sqrt", 1, math_sqrt),
    ("pow", 2, math_pow),
    ("min", 2, math_min),
    ("max", 2, math_max),
    ("log", 1, math_log),
    ("exp", 1, math_exp),
    ("sin", 1, math_sin),
    ("cos", 1, math_cos),
    ("tan", 1, math_tan),
    ("atan", 1, math_atan),
    ("atan2", 2, math_atan2),
];

/// Creates the `Math` object.
pub(crate) fn create(heap: &mut Heap) -> Result<Value> {
    let math = heap.alloc_object()?;
    let mut props = Vec::with_capacity(FUNCTIONS.len() + 2);
    props.push(("PI", Value::Number(std::f64::consts::PI)));
    props.push(("E", Value::Number(std::f64::consts::E)));
    for &(name, arity, func) in FUNCTIONS {
        props.push((name, native_function(heap, name, arity, func)?));
    }
    if let Value::Object(obj) = &math {
        let mut object = obj.borrow_mut();
        for (name, value) in props {
            object.properties.set(name, value);
        }
    }
    Ok(math)
}

fn unary(args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    Ok(Value::Number(f(number_arg(args, 0, f64::NAN))))
}

fn math_abs(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::abs)
}

fn math_ceil(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::ceil)
}

fn math_floor(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::floor)
}

/// Rounds half up (`Math.round(-2.5)` is `-2`).
fn math_round(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, |n| {
        if n.is_finite() && n.fract() != 0.0 {
            (n + 0.5).floor()
        } else {
            n
        }
    })
}

fn math_sqrt(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::sqrt)
}

fn math_pow(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    let base = number_arg(args, 0, f64::NAN);
    let exponent = number_arg(args, 1, f64::NAN);
    Ok(Value::Number(base.powf(exponent)))
}

fn fold(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> Value {
    let mut acc = init;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return Value::Number(f64::NAN);
        }
        acc = pick(acc, n);
    }
    Value::Number(acc)
}

fn math_min(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(fold(args, f64::INFINITY, f64::min))
}

fn math_max(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    Ok(fold(args, f64::NEG_INFINITY, f64::max))
}

fn math_log(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::ln)
}

fn math_exp(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::exp)
}

fn math_sin(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::sin)
}

fn math_cos(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::cos)
}

fn math_tan(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::tan)
}

fn math_atan(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    unary(args, f64::atan)
}

fn math_atan2(_: &mut Heap, _: &Value, args: &[Value]) -> Result<Value> {
    let y = number_arg(args, 0, f64::NAN);
    let x = number_arg(args, 1, f64::NAN);
    Ok(Value::Number(y.atan2(x)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: NativeFn, args: &[Value]) -> Value {
        let mut heap = Heap::default();
        f(&mut heap, &Value::Undefined, args).expect("native call")
    }

    #[test]
    fn round_half_up() {
        assert_eq!(call(math_round, &[Value::from(2.5)]), Value::from(3));
        assert_eq!(call(math_round, &[Value::from(-2.5)]), Value::from(-2));
        assert_eq!(call(math_round, &[Value::from(-2.6)]), Value::from(-3));
    }

    #[test]
    fn min_max_edges() {
        assert_eq!(call(math_min, &[]), Value::Number(f64::INFINITY));
        assert_eq!(call(math_max, &[Value::from(1), Value::from("7")]), Value::from(7));
        assert!(matches!(
            call(math_max, &[Value::from(1), Value::Undefined]),
            Value::Number(n) if n.is_nan()
        ));
    }

    #[test]
    fn math_object_has_constants() {
        let mut heap = Heap::default();
        let math = create(&mut heap).expect("create");
        let Value::Object(obj) = math else {
            panic!("object expected");
        };
        let object = obj.borrow();
        assert_eq!(
            object.properties.get("PI"),
            Some(&Value::Number(std::f64::consts::PI))
        );
        assert!(object.properties.get("floor").is_some_and(Value::is_callable));
    }
}
