// src/config/manifest.rs

//! Bundle manifest: a JSON object mapping bundle names to the ordered list of
//! script files concatenated into that bundle.
//!
//! ```json
//! {
//!   "desktop": ["source/js/vendor/jquery.js", "source/js/app.js"],
//!   "mobile":  ["source/js/app.js", "source/js/mobile.js"]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{AssetdagError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BundleManifest {
    bundles: BTreeMap<String, Vec<String>>,
}

impl BundleManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            AssetdagError::ConfigError(format!(
                "cannot read bundle manifest {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text).map_err(|e| {
            AssetdagError::ConfigError(format!(
                "invalid bundle manifest {}: {e}",
                path.display()
            ))
        })
    }

    /// Ordered source files of a bundle.
    pub fn files(&self, bundle: &str) -> Option<&[String]> {
        self.bundles.get(bundle).map(Vec::as_slice)
    }

    pub fn contains(&self, bundle: &str) -> bool {
        self.bundles.contains_key(bundle)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
