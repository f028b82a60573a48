//! Evaluation of map style functions against tile features.
//!
//! This crate provides:
//! - [`ScriptContext`] - One engine instance with its registered functions
//!   and global bindings
//! - [`FeatureScope`] - Evaluation against a borrowed, active [`Feature`]
//! - [`ValueHandle`] and [`ScopeMarker`] - Handles to the engine stack
//! - [`ContextFlags`] - The context arguments a registered function receives
//! - [`PropertyCache`] - Bounded cache of feature property lookups
//!
//! Recoverable failures (malformed source, script exceptions, unknown
//! function indices) are logged with `tracing` and reported as `false` or
//! `None`; they never propagate to the caller.
//!
//! [`Feature`]: stylescript_foundation::Feature

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accessor;
mod bindings;
pub mod cache;
mod config;
mod context;
mod handle;
pub mod registry;

pub use accessor::{FEATURE_OBJECT_ID, FeatureAccessor, FeatureHost};
pub use bindings::{AmbientContext, GLOBAL_BINDING};
pub use cache::{CACHE_CAPACITY, CacheStats, PropertyCache};
pub use config::{ContextConfig, DEFAULT_MAX_FUNCTIONS};
pub use context::{FeatureScope, ScriptContext};
pub use handle::{ReadContext, ScopeMarker, ValueHandle};
pub use registry::{CompiledFunction, ContextFlags, FunctionRegistry};
