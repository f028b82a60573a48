//! Session state for the REPL.
//!
//! The session owns the script context together with the feature set that
//! style functions are evaluated against, and remembers the source text of
//! every function registered through it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stylescript_bridge::{ContextConfig, ScriptContext};
use stylescript_foundation::{Feature, FilterKey, GeometryType, PropValue, Result};
use stylescript_language::Value;
use tracing::debug;

use crate::serialize::FeatureSet;

/// Session state for an interactive REPL session.
pub struct Session {
    /// The script context functions are registered with.
    context: ScriptContext,

    /// Features available for evaluation.
    features: FeatureSet,

    /// Index of the active feature in `features`.
    current: Option<usize>,

    /// Source text of successfully registered functions.
    sources: BTreeMap<usize, String>,

    /// Current load path for relative file resolution.
    load_path: PathBuf,
}

impl Session {
    /// Creates a new session with a default context and no features.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates a new session whose context uses `config`.
    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            context: ScriptContext::with_config(config),
            features: FeatureSet::new(),
            current: None,
            sources: BTreeMap::new(),
            load_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Returns the script context.
    #[must_use]
    pub const fn context(&self) -> &ScriptContext {
        &self.context
    }

    /// Returns the script context mutably.
    pub fn context_mut(&mut self) -> &mut ScriptContext {
        &mut self.context
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Returns the feature set.
    #[must_use]
    pub const fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Replaces the feature set, selecting its first feature if any.
    pub fn set_features(&mut self, features: FeatureSet) {
        self.features = features;
        self.current = None;
        if !self.features.is_empty() {
            self.select_feature(0);
        }
    }

    /// Returns the index of the active feature.
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Returns the active feature.
    #[must_use]
    pub fn current_feature(&self) -> Option<&Feature> {
        self.current.and_then(|i| self.features.get(i))
    }

    /// Makes feature `index` active, creating empty features up to it.
    ///
    /// The ambient geometry follows the feature's geometry kind.
    pub fn select_feature(&mut self, index: usize) -> &Feature {
        let geometry = self.features.get_or_extend(index).geometry;
        self.current = Some(index);
        self.context.set_filter_key(FilterKey::Geometry, geometry.code());
        &self.features.features[index]
    }

    /// Sets a property of the active feature, selecting feature 0 if none is
    /// active. [`PropValue::None`] removes the property.
    pub fn set_property(&mut self, key: &str, value: PropValue) {
        let index = self.current.unwrap_or(0);
        self.select_feature(index);
        let feature = self.features.get_or_extend(index);
        if value.is_none() {
            feature.props.remove(key);
        } else {
            feature.props.set(key, value);
        }
    }

    /// Sets the ambient zoom.
    pub fn set_zoom(&mut self, zoom: i32) {
        self.context.set_filter_key(FilterKey::Zoom, zoom);
    }

    /// Returns the ambient zoom.
    #[must_use]
    pub fn zoom(&self) -> i32 {
        self.context.filter_key(FilterKey::Zoom)
    }

    /// Sets the ambient geometry, and the active feature's geometry kind.
    pub fn set_geometry(&mut self, geometry: GeometryType) {
        if let Some(feature) = self.current.and_then(|i| self.features.get_mut(i)) {
            feature.geometry = geometry;
        }
        self.context.set_filter_key(FilterKey::Geometry, geometry.code());
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Registers `source` at `index`.
    ///
    /// A failed registration leaves the slot unset, so its recorded source is
    /// forgotten as well.
    pub fn register_function(&mut self, index: usize, source: &str) -> bool {
        if self.context.set_function(index, source) {
            self.sources.insert(index, source.to_string());
            true
        } else {
            self.sources.remove(&index);
            false
        }
    }

    /// Iterates over the registered function sources in index order.
    pub fn function_sources(&self) -> impl Iterator<Item = (usize, &str)> {
        self.sources.iter().map(|(i, s)| (*i, s.as_str()))
    }

    /// Evaluates function `index` against the active feature.
    ///
    /// Returns `None` if the function is not set or threw.
    pub fn evaluate(&mut self, index: usize) -> Option<Value> {
        let feature = self.current.and_then(|i| self.features.get(i));
        match feature {
            Some(feature) => {
                let mut scope = self.context.set_current_feature(feature);
                if scope.evaluate_function(index) {
                    scope.pop()
                } else {
                    None
                }
            }
            None => {
                if self.context.evaluate_function(index) {
                    self.context.pop()
                } else {
                    None
                }
            }
        }
    }

    /// Evaluates function `index` against the active feature as a filter.
    pub fn evaluate_boolean(&mut self, index: usize) -> bool {
        let feature = self.current.and_then(|i| self.features.get(i));
        match feature {
            Some(feature) => self
                .context
                .set_current_feature(feature)
                .evaluate_boolean_function(index),
            None => self.context.evaluate_boolean_function(index),
        }
    }

    /// Evaluates program text with the active feature visible as `feature`.
    ///
    /// # Errors
    ///
    /// Returns the syntax or runtime error raised by the program.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let feature = self.current.and_then(|i| self.features.get(i));
        match feature {
            Some(feature) => self.context.set_current_feature(feature).eval(source),
            None => self.context.eval(source),
        }
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Returns the current load path.
    #[must_use]
    pub fn load_path(&self) -> &Path {
        &self.load_path
    }

    /// Sets the load path for relative file resolution.
    pub fn set_load_path(&mut self, path: PathBuf) {
        debug!(path = %path.display(), "load path changed");
        self.load_path = path;
    }

    /// Resolves a path relative to the current load path.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.load_path.join(path)
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_past_end_creates_features() {
        let mut session = Session::new();
        assert!(session.current_feature().is_none());
        session.select_feature(2);
        assert_eq!(session.features().len(), 3);
        assert_eq!(session.current_index(), Some(2));
    }

    #[test]
    fn properties_apply_to_active_feature() {
        let mut session = Session::new();
        session.set_property("kind", PropValue::from("road"));
        assert!(session.register_function(0, "function() { return feature.kind }"));
        assert_eq!(session.evaluate(0), Some(Value::from("road")));

        session.set_property("kind", PropValue::None);
        assert_eq!(session.evaluate(0), Some(Value::Undefined));
    }

    #[test]
    fn geometry_follows_selection() {
        let mut session = Session::new();
        session.select_feature(0);
        session.set_geometry(GeometryType::Polygons);
        session.select_feature(1);
        assert!(session.register_function(0, "function() { return $geometry }"));
        assert_eq!(session.evaluate(0), Some(Value::Number(0.0)));

        session.select_feature(0);
        assert_eq!(session.evaluate(0), Some(Value::Number(3.0)));
    }

    #[test]
    fn failed_registration_forgets_source() {
        let mut session = Session::new();
        assert!(session.register_function(1, "function() { return $zoom }"));
        assert!(!session.register_function(1, "function() {"));
        assert_eq!(session.function_sources().count(), 0);
        assert_eq!(session.evaluate(1), None);
    }

    #[test]
    fn zoom_reaches_functions() {
        let mut session = Session::new();
        session.set_zoom(15);
        assert!(session.register_function(0, "function() { return $zoom > 14 }"));
        assert!(session.evaluate_boolean(0));
        assert_eq!(session.zoom(), 15);
    }

    #[test]
    fn eval_sees_active_feature() {
        let mut session = Session::new();
        session.set_property("name", PropValue::from("pier"));
        assert_eq!(session.eval("feature.name + '!'").ok(), Some(Value::from("pier!")));
    }

    #[test]
    fn relative_paths_use_load_path() {
        let mut session = Session::new();
        session.set_load_path(PathBuf::from("/data"));
        assert_eq!(session.resolve_path("a.mpk"), PathBuf::from("/data/a.mpk"));
        assert_eq!(session.resolve_path("/b.mpk"), PathBuf::from("/b.mpk"));
    }
}
