//! The map feature data model.
//!
//! A [`Feature`] is owned by the tile layer; scripts only ever see it through
//! a read-only view. Property values are flat: a string, a number, or absent.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::GeometryType;

/// A single property value of a feature.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PropValue {
    /// The property is absent.
    #[default]
    None,
    /// UTF-8 string value.
    String(String),
    /// IEEE-754 double value.
    Number(f64),
}

/// Shared "absent" value returned for missing keys.
static NONE: PropValue = PropValue::None;

impl PropValue {
    /// Returns true if this is the absent variant.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for PropValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "<none>"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// String-keyed property map of a feature.
///
/// Entries are kept sorted by key so lookups are a binary search. Positions
/// returned by [`Properties::index_of`] stay valid until the map is mutated.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Properties {
    entries: Vec<(String, PropValue)>,
}

impl Properties {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        let key = key.into();
        let value = value.into();
        match self.search(&key) {
            Ok(pos) => self.entries[pos].1 = value,
            Err(pos) => self.entries.insert(pos, (key, value)),
        }
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.search(key).ok().map(|pos| self.entries.remove(pos).1)
    }

    /// Returns the value for `key`, or [`PropValue::None`] if absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &PropValue {
        match self.search(key) {
            Ok(pos) => &self.entries[pos].1,
            Err(_) => &NONE,
        }
    }

    /// Returns the storage position of `key`.
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.search(key).ok()
    }

    /// Returns the value stored at `index`, or [`PropValue::None`] if out of range.
    #[must_use]
    pub fn value_at(&self, index: usize) -> &PropValue {
        self.entries.get(index).map_or(&NONE, |(_, v)| v)
    }

    /// Returns true if `key` is present with a non-absent value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        !self.get(key).is_none()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn search(&self, key: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// A map feature as handed to the style layer.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    /// Identifier used in diagnostics.
    pub id: u64,
    /// Geometry kind of the feature.
    pub geometry: GeometryType,
    /// Property map.
    pub props: Properties,
}

impl Feature {
    /// Creates a feature with the given id and no properties.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Builder method to set the geometry kind.
    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometryType) -> Self {
        self.geometry = geometry;
        self
    }

    /// Builder method to add a property.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_stay_sorted() {
        let props: Properties = [("kind", "park"), ("area", "big"), ("name", "x")]
            .into_iter()
            .collect();
        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["area", "kind", "name"]);
    }

    #[test]
    fn set_replaces_existing() {
        let mut props = Properties::new();
        props.set("height", 10.0);
        props.set("height", 12.5);
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("height").as_number(), Some(12.5));
    }

    #[test]
    fn missing_key_is_none() {
        let props = Properties::new();
        assert!(props.get("missing").is_none());
        assert!(!props.contains("missing"));
        assert_eq!(props.index_of("missing"), None);
        assert!(props.value_at(7).is_none());
    }

    #[test]
    fn index_of_round_trips_with_value_at() {
        let feature = Feature::new(1)
            .with_prop("name", "road")
            .with_prop("lanes", 2);
        let idx = feature.props.index_of("lanes").expect("present");
        assert_eq!(feature.props.value_at(idx).as_number(), Some(2.0));
    }

    #[test]
    fn remove_returns_previous() {
        let mut props: Properties = [("a", 1.0)].into_iter().collect();
        assert_eq!(props.remove("a"), Some(PropValue::Number(1.0)));
        assert!(props.is_empty());
    }
}
