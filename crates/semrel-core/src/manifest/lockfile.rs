//! Cargo.lock version updates

use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::{DocumentMut, Item};
use tracing::{debug, warn};

use crate::error::{ManifestError, Result};

use super::{dependency::replace_string, stage_write, PendingFlush};

/// A workspace Cargo.lock
#[derive(Debug, Clone)]
pub struct Lockfile {
    path: PathBuf,
    original: String,
    doc: DocumentMut,
}

impl Lockfile {
    /// Load `Cargo.lock` from a workspace root; `None` when there is none
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join("Cargo.lock");
        if !path.exists() {
            debug!(root = %root.display(), "no Cargo.lock");
            return Ok(None);
        }

        let original = fs::read_to_string(&path).map_err(|e| ManifestError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let doc = original
            .parse::<DocumentMut>()
            .map_err(|e| ManifestError::Parse {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Some(Self {
            path,
            original,
            doc,
        }))
    }

    /// Path of the lockfile
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set the version of a workspace package
    ///
    /// Only `[[package]]` entries without a `source` belong to the
    /// workspace. A package missing from the lockfile is logged and
    /// skipped. Returns whether the document changed.
    pub fn set_member_version(&mut self, name: &str, version: &str) -> Result<bool> {
        let Some(packages) = self
            .doc
            .get_mut("package")
            .and_then(Item::as_array_of_tables_mut)
        else {
            warn!(path = %self.path.display(), "Cargo.lock has no packages");
            return Ok(false);
        };

        let mut found = false;
        let mut changed = false;
        for entry in packages.iter_mut() {
            let is_member = entry.get("name").and_then(Item::as_str) == Some(name)
                && !entry.contains_key("source");
            if !is_member {
                continue;
            }

            found = true;
            let item = entry.get_mut("version").ok_or_else(|| ManifestError::Lockfile {
                path: self.path.clone(),
                package: name.to_string(),
                reason: "entry has no version".to_string(),
            })?;
            changed |= replace_string(item, version);
        }

        if !found {
            warn!(
                path = %self.path.display(),
                package = name,
                "package not in Cargo.lock, skipping"
            );
        }
        Ok(changed)
    }

    /// Write the document to a temp file next to the lockfile
    pub fn stage_flush(&self) -> Result<Option<PendingFlush>> {
        stage_write(&self.path, &self.original, self.doc.to_string())
    }
}
