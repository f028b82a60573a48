//! Closed enumerations shared between the style layer and scripts.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Geometry kind of a feature.
///
/// The numeric values are visible to scripts through the `point`, `line` and
/// `polygon` globals and through the `$geometry` argument.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum GeometryType {
    /// Unknown or empty geometry.
    #[default]
    Unknown = 0,
    /// Point geometry.
    Points = 1,
    /// Line geometry.
    Lines = 2,
    /// Polygon geometry.
    Polygons = 3,
}

impl GeometryType {
    /// Geometry kinds exposed to scripts as global constants.
    pub const NAMED: [Self; 3] = [Self::Points, Self::Lines, Self::Polygons];

    /// Returns the numeric code scripts compare against.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Returns the global constant name, if this kind has one.
    #[must_use]
    pub const fn script_name(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Points => Some("point"),
            Self::Lines => Some("line"),
            Self::Polygons => Some("polygon"),
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name().unwrap_or("unknown"))
    }
}

impl FromStr for GeometryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point" | "points" => Ok(Self::Points),
            "line" | "lines" => Ok(Self::Lines),
            "polygon" | "polygons" => Ok(Self::Polygons),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::new(ErrorKind::TypeError(format!(
                "unknown geometry kind: {other}"
            )))),
        }
    }
}

/// Ambient values the style layer sets before evaluating functions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterKey {
    /// Reserved slot for keys without a dedicated meaning.
    Other = 0,
    /// Current zoom level, passed as `$zoom`.
    Zoom = 1,
    /// Current geometry kind, passed as `$geometry`.
    Geometry = 2,
}

impl FilterKey {
    /// Number of ambient slots.
    pub const COUNT: usize = 3;

    /// Returns the slot index of this key.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}
