//! Script values and the conversions between them.
//!
//! Primitive values are stored inline; objects are shared through
//! [`ObjectRef`]. Conversions follow the scripting language's rules
//! (`ToNumber`, `ToString`, `ToBoolean`, loose and strict equality).

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::object::{Object, ObjectKind};

/// Deepest array nesting rendered by [`Value::to_js_string`].
const MAX_JOIN_DEPTH: usize = 32;

/// A script value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// IEEE-754 double.
    Number(f64),
    /// Immutable string.
    String(Rc<str>),
    /// Reference to a heap object.
    Object(ObjectRef),
}

/// Shared reference to a heap object.
///
/// Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub(crate) fn new(object: Object) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    /// Immutably borrows the object.
    ///
    /// # Panics
    /// Panics if the object is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Mutably borrows the object.
    ///
    /// # Panics
    /// Panics if the object is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Returns true if both references point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a stable identity for this object while it is alive.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<Object>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<Object>>) -> Self {
        Self(rc)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "[{} {:#x}]", object.kind.class_name(), self.id()),
            Err(_) => write!(f, "[object {:#x}]", self.id()),
        }
    }
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Returns the result of the `typeof` operator.
    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(obj) => {
                if obj.borrow().kind.is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Returns true for `undefined` and `null`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns true if this value can be called.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Object(obj) if obj.borrow().kind.is_callable())
    }

    /// Returns the object reference if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to a boolean (`ToBoolean`).
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => !(*n == 0.0 || n.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Converts to a number (`ToNumber`).
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Object(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// Converts to a signed 32-bit integer (`ToInt32`).
    #[must_use]
    pub fn to_int32(&self) -> i32 {
        to_int32(self.to_number())
    }

    /// Converts to an unsigned 32-bit integer (`ToUint32`).
    #[must_use]
    pub fn to_uint32(&self) -> u32 {
        to_int32(self.to_number()) as u32
    }

    /// Converts to a string (`ToString`).
    #[must_use]
    pub fn to_js_string(&self) -> Rc<str> {
        match self {
            Self::String(s) => Rc::clone(s),
            other => other.render(0).into(),
        }
    }

    fn render(&self, depth: usize) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Object(obj) => {
                let Ok(object) = obj.0.try_borrow() else {
                    return String::new();
                };
                match &object.kind {
                    ObjectKind::Array(items) => {
                        if depth >= MAX_JOIN_DEPTH {
                            return String::new();
                        }
                        join_values(items, ",", depth + 1)
                    }
                    ObjectKind::Function(closure) => format!(
                        "function {}() {{ [bytecode] }}",
                        closure.proto.name.as_deref().unwrap_or("")
                    ),
                    ObjectKind::Native(native) => {
                        format!("function {}() {{ [native code] }}", native.name)
                    }
                    ObjectKind::Ordinary | ObjectKind::Host(_) => "[object Object]".to_string(),
                }
            }
        }
    }

    /// Strict equality (`===`).
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Loose equality (`==`) with type coercion.
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Number(a), Self::String(_)) => *a == other.to_number(),
            (Self::String(_), Self::Number(b)) => self.to_number() == *b,
            (Self::Bool(_), _) => Self::Number(self.to_number()).loose_equals(other),
            (_, Self::Bool(_)) => self.loose_equals(&Self::Number(other.to_number())),
            (Self::Object(_), Self::Number(_) | Self::String(_)) => {
                Self::String(self.to_js_string()).loose_equals(other)
            }
            (Self::Number(_) | Self::String(_), Self::Object(_)) => {
                self.loose_equals(&Self::String(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            other => f.write_str(&other.to_js_string()),
        }
    }
}

/// Joins values the way `Array.prototype.join` does.
pub(crate) fn join_values(items: &[Value], separator: &str, depth: usize) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            out.push_str(&item.render(depth));
        }
    }
    out
}

/// Formats a number the way scripts print it.
#[must_use]
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// Parses a string the way `ToNumber` does.
#[must_use]
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        #[allow(clippy::cast_precision_loss)]
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    let decimal_chars = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal_chars {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Wraps a number into the signed 32-bit range (`ToInt32`).
#[must_use]
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}
