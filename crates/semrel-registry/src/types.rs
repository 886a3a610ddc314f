//! Common types for registry operations

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name Cargo uses for the default registry in `publish = [..]` lists
pub const CRATES_IO: &str = "crates-io";

/// A single crate publish request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Crate name
    pub name: String,
    /// Version being published
    pub version: String,
    /// Path to the crate's Cargo.toml
    pub manifest_path: PathBuf,
    /// Features to enable while packaging
    #[serde(default)]
    pub features: Vec<String>,
    /// Pass `--allow-dirty` to cargo
    pub allow_dirty: bool,
    /// Pass `--no-verify` to cargo
    pub no_verify: bool,
}

impl PublishRequest {
    /// Create a request with default flags
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            manifest_path: manifest_path.into(),
            features: Vec::new(),
            allow_dirty: true,
            no_verify: false,
        }
    }

    /// Set the features to enable
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Set whether a dirty working tree is allowed
    pub fn allow_dirty(mut self, allow: bool) -> Self {
        self.allow_dirty = allow;
        self
    }

    /// Set whether cargo should skip the verification build
    pub fn no_verify(mut self, no_verify: bool) -> Self {
        self.no_verify = no_verify;
        self
    }
}
