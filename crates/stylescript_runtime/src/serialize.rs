//! Feature-set serialization and deserialization using `MessagePack`.
//!
//! Feature sets are the test fixtures of the REPL: a list of features that
//! style functions can be evaluated against, saved to and loaded from
//! `.mpk` files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stylescript_foundation::{Error, ErrorKind, Feature, Result};

/// An ordered collection of features.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// The features, in insertion order.
    pub features: Vec<Feature>,
}

impl FeatureSet {
    /// Creates an empty feature set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the set holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the feature at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Returns the feature at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Feature> {
        self.features.get_mut(index)
    }

    /// Returns the feature at `index`, appending empty features up to it.
    ///
    /// Appended features are numbered by their position.
    pub fn get_or_extend(&mut self, index: usize) -> &mut Feature {
        while self.features.len() <= index {
            let id = self.features.len() as u64;
            self.features.push(Feature::new(id));
        }
        &mut self.features[index]
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Serializes a feature set to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(set: &FeatureSet) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(set)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Deserializes a feature set from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<FeatureSet> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Saves a feature set to a file using `MessagePack` format.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(set: &FeatureSet, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_error = |action: &str, e: std::io::Error| {
        Error::new(ErrorKind::IoError(format!(
            "failed to {action} file '{}': {e}",
            path.display()
        )))
    };

    let file = File::create(path).map_err(|e| io_error("create", e))?;
    let mut writer = BufWriter::new(file);
    let bytes = to_bytes(set)?;
    writer.write_all(&bytes).map_err(|e| io_error("write", e))?;
    writer.flush().map_err(|e| io_error("flush", e))?;
    Ok(())
}

/// Loads a feature set from a `MessagePack` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<FeatureSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to open file '{}': {e}",
            path.display()
        )))
    })?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to read file '{}': {e}",
            path.display()
        )))
    })?;

    from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use stylescript_foundation::{GeometryType, PropValue};

    use super::*;

    fn sample() -> FeatureSet {
        [
            Feature::new(7)
                .with_geometry(GeometryType::Lines)
                .with_prop("kind", "road")
                .with_prop("lanes", 2),
            Feature::new(8)
                .with_geometry(GeometryType::Polygons)
                .with_prop("name", "park"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn bytes_preserve_features() {
        let set = sample();
        let bytes = to_bytes(&set).expect("serialize");
        let loaded = from_bytes(&bytes).expect("deserialize");
        assert_eq!(loaded, set);
        assert_eq!(
            loaded.get(0).map(|f| f.props.get("lanes").clone()),
            Some(PropValue::Number(2.0))
        );
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = from_bytes(&[0xc1, 0x00]).expect_err("invalid bytes");
        assert!(matches!(err.kind, ErrorKind::SerializationError(_)));
    }

    #[test]
    fn files_preserve_features() {
        let path = std::env::temp_dir().join(format!(
            "stylescript-serialize-{}.mpk",
            std::process::id()
        ));
        let set = sample();
        save_to_file(&set, &path).expect("save");
        let loaded = load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, set);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_from_file("/nonexistent/features.mpk").expect_err("missing");
        assert!(matches!(err.kind, ErrorKind::IoError(_)));
    }

    #[test]
    fn extend_numbers_new_features() {
        let mut set = FeatureSet::new();
        set.get_or_extend(2).props.set("kind", "water");
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(1).map(|f| f.id), Some(1));
        assert_eq!(set.get(2).map(|f| f.props.get("kind").as_str()), Some(Some("water")));
    }
}
