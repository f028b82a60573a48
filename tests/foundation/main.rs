//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Error, Feature, Properties, GeometryType.

mod errors;
mod features;
