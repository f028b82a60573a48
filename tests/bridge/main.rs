//! Integration tests for Layer 2: Bridge
//!
//! Tests for function registration, evaluation against features, the
//! property cache, and stack discipline.

mod cache;
mod registration;
mod scenarios;
mod stack;
