//! Workspace listing in publish order

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::workspace::Workspace;

/// A member as seen by the release hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Crate name
    pub name: String,
    /// Current version
    pub version: String,
    /// Manifest location
    pub manifest_path: PathBuf,
    /// Takes part in publishing to the configured registry
    pub publishable: bool,
}

/// List members in publish order
pub fn list_packages(root: &Path, config: &Config) -> Result<Vec<PackageEntry>> {
    let workspace = Workspace::discover(root)?;
    let plan = workspace.publish_plan()?;

    Ok(plan
        .iter()
        .filter_map(|name| {
            let manifest = workspace.member(name)?;
            Some(PackageEntry {
                name: name.to_string(),
                version: manifest.version().map(ToString::to_string).unwrap_or_default(),
                manifest_path: manifest.path().to_path_buf(),
                publishable: workspace.is_publishable(name, config.registry_name())
                    && !config.is_excluded(name),
            })
        })
        .collect())
}
