//! Core error types and the feature data model for stylescript.
//!
//! This crate provides:
//! - [`Error`] - Rich error types with context
//! - [`Feature`] and [`Properties`] - The externally owned map feature a
//!   style function is evaluated against
//! - [`GeometryType`] and [`FilterKey`] - The closed enumerations shared
//!   between the style layer and scripts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod feature;
mod geometry;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use feature::{Feature, PropValue, Properties};
pub use geometry::{FilterKey, GeometryType};
