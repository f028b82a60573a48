//! Lazy, trap-based read access to the active feature.
//!
//! Scripts see the active feature as the `feature` host object. Its property
//! reads are answered here on demand; the feature map is never copied into
//! the script heap.

use std::collections::HashMap;
use std::rc::Rc;

use stylescript_foundation::{Feature, PropValue};
use stylescript_language::{HostContext, Value};

use crate::cache::{CacheStats, PropertyCache};

/// Host object id of the `feature` object.
pub const FEATURE_OBJECT_ID: u32 = 1;

/// Per-context lookup state for the active feature.
///
/// Holds the bounded [`PropertyCache`] and a memo of string results that
/// short-circuits repeated reads of the same key within one active-feature
/// window. Both are reset by [`FeatureAccessor::set_current_feature`].
#[derive(Debug, Default)]
pub struct FeatureAccessor {
    cache: PropertyCache,
    memo: HashMap<Rc<str>, Value>,
    /// Id of the active feature, for diagnostics.
    active: Option<u64>,
}

impl FeatureAccessor {
    /// Creates an accessor with no active feature.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: PropertyCache::new(),
            memo: HashMap::new(),
            active: None,
        }
    }

    /// Makes `feature` the active feature, invalidating all lookups.
    pub fn set_current_feature(&mut self, feature: Option<&Feature>) {
        self.active = feature.map(|f| f.id);
        self.memo.clear();
        self.cache.reset();
    }

    /// Returns the id of the active feature.
    #[must_use]
    pub fn active_feature(&self) -> Option<u64> {
        self.active
    }

    /// Returns the lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Answers `key in feature`.
    pub fn has(&mut self, feature: &Feature, key: &str) -> bool {
        !self.cache.lookup(&feature.props, key).is_none()
    }

    /// Answers `feature[key]`.
    ///
    /// String properties reuse the script string created by the first read
    /// of the same key on the active feature.
    pub fn get(&mut self, feature: &Feature, key: &str) -> Value {
        if let Some(value) = self.memo.get(key) {
            return value.clone();
        }
        match self.cache.lookup(&feature.props, key) {
            PropValue::Number(n) => Value::Number(*n),
            PropValue::String(s) => {
                let value = Value::String(Rc::from(s.as_str()));
                self.memo.insert(Rc::from(key), value.clone());
                value
            }
            PropValue::None => Value::Undefined,
        }
    }
}

/// [`HostContext`] answering traps on the `feature` object.
///
/// Without an active feature every read is `undefined` and `in` is false.
pub struct FeatureHost<'a> {
    accessor: &'a mut FeatureAccessor,
    feature: Option<&'a Feature>,
}

impl<'a> FeatureHost<'a> {
    /// Creates a host over `feature`.
    pub fn new(accessor: &'a mut FeatureAccessor, feature: Option<&'a Feature>) -> Self {
        Self { accessor, feature }
    }
}

impl HostContext for FeatureHost<'_> {
    fn get(&mut self, object: u32, key: &str) -> Value {
        match self.feature {
            Some(feature) if object == FEATURE_OBJECT_ID => self.accessor.get(feature, key),
            _ => Value::Undefined,
        }
    }

    fn has(&mut self, object: u32, key: &str) -> bool {
        match self.feature {
            Some(feature) if object == FEATURE_OBJECT_ID => self.accessor.has(feature, key),
            _ => false,
        }
    }
}
