//! Cargo.toml model with format-preserving edits
//!
//! A [`Manifest`] keeps the text it was read from next to an editable
//! `toml_edit` document. Edits only touch the document; [`Manifest::stage_flush`]
//! writes the result to a temp file beside the manifest and
//! [`PendingFlush::commit`] renames it into place, so a caller can stage every
//! file of a workspace before replacing any of them.

mod dependency;
mod lockfile;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use toml_edit::{DocumentMut, Item};
use tracing::{debug, trace};

use crate::error::{ManifestError, Result};

pub use dependency::{Dependency, DependencyKind, DependencyVersionPolicy};
pub use lockfile::Lockfile;

use dependency::{collect_dependencies, dependency_tables_mut, replace_string, rewrite_table};

/// The `package.publish` setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishSetting {
    /// Key absent or `true`
    #[default]
    Any,
    /// `publish = false`
    Never,
    /// `publish = ["registry", ..]`
    Only(Vec<String>),
}

impl PublishSetting {
    /// Check if the crate may be published to `registry`
    pub fn allows(&self, registry: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Never => false,
            Self::Only(registries) => registries.iter().any(|r| r == registry),
        }
    }
}

/// Identity of a package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    /// `package.name`
    pub name: String,
    /// Effective version; `None` until an inherited version is resolved
    pub version: Option<Version>,
    /// `version.workspace = true`
    pub version_inherited: bool,
    /// `package.publish`
    pub publish: PublishSetting,
}

/// A Cargo.toml on disk
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    original: String,
    doc: DocumentMut,
    package: Option<PackageInfo>,
    dependencies: Vec<Dependency>,
}

impl Manifest {
    /// Load a package manifest; `[package]` with a name and version is required
    pub fn load(path: &Path) -> Result<Self> {
        let manifest = Self::load_root(path)?;
        if manifest.package.is_none() {
            return Err(ManifestError::MissingField {
                path: path.to_path_buf(),
                field: "package.name".to_string(),
            }
            .into());
        }
        Ok(manifest)
    }

    /// Load a manifest that may be a virtual workspace root
    pub fn load_root(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()).into());
        }

        let original = fs::read_to_string(path).map_err(|e| ManifestError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_str_at(path, original)
    }

    /// Parse manifest text as if it lived at `path`
    pub fn from_str_at(path: &Path, text: String) -> Result<Self> {
        let doc: DocumentMut = text.parse().map_err(|e: toml_edit::TomlError| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let package = match doc.get("package") {
            Some(item) => Some(parse_package(path, item)?),
            None => None,
        };
        let dependencies = collect_dependencies(doc.as_table());

        trace!(
            path = %path.display(),
            package = package.as_ref().map(|p| p.name.as_str()),
            dependencies = dependencies.len(),
            "parsed manifest"
        );

        Ok(Self {
            path: path.to_path_buf(),
            original: text,
            doc,
            package,
            dependencies,
        })
    }

    /// Path of the Cargo.toml
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the manifest
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Package identity; `None` for a virtual workspace root
    pub fn package(&self) -> Option<&PackageInfo> {
        self.package.as_ref()
    }

    /// Package name, empty for a virtual root
    pub fn name(&self) -> &str {
        self.package.as_ref().map(|p| p.name.as_str()).unwrap_or_default()
    }

    /// Effective package version
    pub fn version(&self) -> Option<&Version> {
        self.package.as_ref().and_then(|p| p.version.as_ref())
    }

    /// Check if the version comes from `[workspace.package]`
    pub fn inherits_version(&self) -> bool {
        self.package.as_ref().is_some_and(|p| p.version_inherited)
    }

    /// Dependency declarations in manifest order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Check if the manifest has a `[workspace]` table
    pub fn is_workspace_root(&self) -> bool {
        self.doc.get("workspace").is_some()
    }

    /// The `[workspace]` table
    pub fn workspace_table(&self) -> Option<&dyn toml_edit::TableLike> {
        self.doc.get("workspace").and_then(Item::as_table_like)
    }

    /// `[workspace.package] version`
    pub fn workspace_version(&self) -> Option<&str> {
        self.workspace_table()
            .and_then(|w| w.get("package"))
            .and_then(Item::as_table_like)
            .and_then(|p| p.get("version"))
            .and_then(Item::as_str)
    }

    /// `[workspace.dependencies]` entries
    pub fn workspace_dependencies(&self) -> Vec<Dependency> {
        self.workspace_table()
            .and_then(|w| w.get("dependencies"))
            .and_then(Item::as_table_like)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(key, item)| {
                        Dependency::from_item(key, item, DependencyKind::Normal, None)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fill in a version taken from `[workspace.package]`
    pub(crate) fn inherit_version(&mut self, version: Version) {
        if let Some(package) = self.package.as_mut().filter(|p| p.version_inherited) {
            package.version = Some(version);
        }
    }

    /// Set `package.version`
    ///
    /// Only the value changes; its surrounding whitespace and trailing
    /// comment are kept. Members inheriting their version are left alone.
    /// Returns whether the document changed.
    pub fn set_version(&mut self, new_version: &str) -> Result<bool> {
        let version = parse_version(&self.path, new_version)?;

        let Some(package) = self.package.as_mut() else {
            return Err(ManifestError::MissingField {
                path: self.path.clone(),
                field: "package".to_string(),
            }
            .into());
        };
        if package.version_inherited {
            debug!(path = %self.path.display(), "version inherited from workspace, skipping");
            return Ok(false);
        }

        let item = self
            .doc
            .get_mut("package")
            .and_then(Item::as_table_like_mut)
            .and_then(|p| p.get_mut("version"))
            .ok_or_else(|| ManifestError::MissingField {
                path: self.path.clone(),
                field: "package.version".to_string(),
            })?;

        let changed = replace_string(item, new_version);
        package.version = Some(version);
        Ok(changed)
    }

    /// Set `[workspace.package] version`
    pub fn set_workspace_version(&mut self, new_version: &str) -> Result<bool> {
        parse_version(&self.path, new_version)?;

        let item = self
            .doc
            .get_mut("workspace")
            .and_then(Item::as_table_like_mut)
            .and_then(|w| w.get_mut("package"))
            .and_then(Item::as_table_like_mut)
            .and_then(|p| p.get_mut("version"))
            .ok_or_else(|| ManifestError::MissingField {
                path: self.path.clone(),
                field: "workspace.package.version".to_string(),
            })?;

        Ok(replace_string(item, new_version))
    }

    /// Point every path declaration of `sibling` at `new_version`
    ///
    /// Covers normal, build and dev tables, their `[target.*]` variants and
    /// `[workspace.dependencies]`. Declarations using `workspace = true`
    /// are skipped; their requirement lives in the root manifest. Returns
    /// the number of declarations changed.
    pub fn rewrite_sibling_dependency_version(
        &mut self,
        sibling: &str,
        new_version: &str,
        policy: DependencyVersionPolicy,
    ) -> Result<usize> {
        let version = parse_version(&self.path, new_version)?;
        let requirement = policy.requirement(&version);

        let mut changed = 0;
        for (kind, table) in dependency_tables_mut(self.doc.as_table_mut()) {
            changed += rewrite_table(table, kind, sibling, &requirement);
        }

        if let Some(table) = self
            .doc
            .get_mut("workspace")
            .and_then(Item::as_table_like_mut)
            .and_then(|w| w.get_mut("dependencies"))
            .and_then(Item::as_table_like_mut)
        {
            changed += rewrite_table(table, DependencyKind::Normal, sibling, &requirement);
        }

        if changed > 0 {
            debug!(
                path = %self.path.display(),
                sibling,
                requirement = %requirement,
                changed,
                "rewrote sibling requirement"
            );
            self.dependencies = collect_dependencies(self.doc.as_table());
        }
        Ok(changed)
    }

    /// Current document text
    pub fn render(&self) -> String {
        self.doc.to_string()
    }

    /// Check if the document differs from what was read
    pub fn is_dirty(&self) -> bool {
        self.render() != self.original
    }

    /// Write the document to a temp file next to the manifest
    ///
    /// Returns `None` when nothing changed.
    pub fn stage_flush(&self) -> Result<Option<PendingFlush>> {
        stage_write(&self.path, &self.original, self.render())
    }

    /// Persist the document
    pub fn flush(&mut self) -> Result<bool> {
        match self.stage_flush()? {
            Some(pending) => {
                self.original = pending.commit()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A rewritten file waiting in a temp file
#[derive(Debug)]
pub struct PendingFlush {
    temp: NamedTempFile,
    target: PathBuf,
    content: String,
}

impl PendingFlush {
    /// File that will be replaced
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target, returning the written text
    pub fn commit(self) -> Result<String> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| ManifestError::Write {
                path: target.clone(),
                reason: e.error.to_string(),
            })?;
        debug!(path = %target.display(), "committed");
        Ok(self.content)
    }
}

/// Stage `rendered` for `path` unless it equals `original`
pub(crate) fn stage_write(path: &Path, original: &str, rendered: String) -> Result<Option<PendingFlush>> {
    if rendered == original {
        trace!(path = %path.display(), "unchanged, nothing to stage");
        return Ok(None);
    }

    let write_err = |e: std::io::Error| ManifestError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".semrel-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    temp.write_all(rendered.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    // Keep the target's permissions instead of the temp file's 0600
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp.path(), meta.permissions()).map_err(write_err)?;
    }

    debug!(path = %path.display(), temp = %temp.path().display(), "staged");
    Ok(Some(PendingFlush {
        temp,
        target: path.to_path_buf(),
        content: rendered,
    }))
}

fn parse_version(path: &Path, version: &str) -> Result<Version> {
    Version::parse(version).map_err(|e| {
        ManifestError::InvalidVersion {
            path: path.to_path_buf(),
            version: version.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn parse_package(path: &Path, item: &Item) -> Result<PackageInfo> {
    let missing = |field: &str| ManifestError::MissingField {
        path: path.to_path_buf(),
        field: field.to_string(),
    };

    let table = item.as_table_like().ok_or_else(|| missing("package"))?;

    let name = table
        .get("name")
        .and_then(Item::as_str)
        .ok_or_else(|| missing("package.name"))?
        .to_string();

    let version_item = table.get("version").ok_or_else(|| missing("package.version"))?;
    let (version, version_inherited) = if let Some(v) = version_item.as_str() {
        (Some(parse_version(path, v)?), false)
    } else if version_item
        .as_table_like()
        .and_then(|t| t.get("workspace"))
        .and_then(Item::as_bool)
        == Some(true)
    {
        (None, true)
    } else {
        return Err(missing("package.version").into());
    };

    let publish = match table.get("publish") {
        None => PublishSetting::Any,
        Some(item) => match (item.as_bool(), item.as_array()) {
            (Some(true), _) => PublishSetting::Any,
            (Some(false), _) => PublishSetting::Never,
            (None, Some(list)) => PublishSetting::Only(
                list.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            _ => PublishSetting::Any,
        },
    };

    Ok(PackageInfo {
        name,
        version,
        version_inherited,
        publish,
    })
}
