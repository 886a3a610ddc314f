//! Dependency declarations and requirement rewriting

use std::path::PathBuf;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use toml_edit::{InlineTable, Item, TableLike, Value};

/// Section a dependency is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// `[dependencies]`
    Normal,
    /// `[build-dependencies]`
    Build,
    /// `[dev-dependencies]`
    Dev,
}

impl DependencyKind {
    /// Map a manifest table name onto a kind
    pub fn from_table_name(table: &str) -> Option<Self> {
        match table {
            "dependencies" => Some(Self::Normal),
            "build-dependencies" | "build_dependencies" => Some(Self::Build),
            "dev-dependencies" | "dev_dependencies" => Some(Self::Dev),
            _ => None,
        }
    }

    /// Returns the string representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Build => "build",
            Self::Dev => "dev",
        }
    }

    /// Cargo strips dev-dependencies when packaging
    pub fn is_published(&self) -> bool {
        !matches!(self, Self::Dev)
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How sibling requirements are written during prepare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyVersionPolicy {
    /// `"X.Y.Z"`, Cargo's default caret requirement
    #[default]
    Range,
    /// `"=X.Y.Z"`
    Exact,
}

impl DependencyVersionPolicy {
    /// Requirement string for a sibling at `version`
    pub fn requirement(&self, version: &Version) -> String {
        match self {
            Self::Range => version.to_string(),
            Self::Exact => format!("={}", version),
        }
    }
}

impl FromStr for DependencyVersionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "range" | "caret" => Ok(Self::Range),
            "exact" | "pin" => Ok(Self::Exact),
            _ => Err(format!("Unknown dependency version policy: {}", s)),
        }
    }
}

impl std::fmt::Display for DependencyVersionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range => write!(f, "range"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// One dependency declaration as written in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Key in the dependency table
    pub key: String,
    /// Referenced package (`package = ".."` rename, else the key)
    pub package: String,
    /// Section
    pub kind: DependencyKind,
    /// `cfg(..)` or triple of a `[target.*]` table
    pub target: Option<String>,
    /// Version requirement, when written
    pub requirement: Option<String>,
    /// Path as written, relative to the declaring manifest
    pub path: Option<PathBuf>,
    /// `workspace = true`
    pub workspace: bool,
    /// Git source
    pub git: Option<String>,
}

impl Dependency {
    /// Parse a declaration; returns `None` for shapes Cargo would reject
    pub fn from_item(key: &str, item: &Item, kind: DependencyKind, target: Option<&str>) -> Option<Self> {
        let mut dep = Self {
            key: key.to_string(),
            package: key.to_string(),
            kind,
            target: target.map(String::from),
            requirement: None,
            path: None,
            workspace: false,
            git: None,
        };

        if let Some(req) = item.as_str() {
            dep.requirement = Some(req.to_string());
            return Some(dep);
        }

        let table = item.as_table_like()?;
        if let Some(package) = table.get("package").and_then(Item::as_str) {
            dep.package = package.to_string();
        }
        dep.requirement = table.get("version").and_then(Item::as_str).map(String::from);
        dep.path = table.get("path").and_then(Item::as_str).map(PathBuf::from);
        dep.workspace = table
            .get("workspace")
            .and_then(Item::as_bool)
            .unwrap_or(false);
        dep.git = table.get("git").and_then(Item::as_str).map(String::from);
        Some(dep)
    }

    /// Declared through a local path
    pub fn is_path(&self) -> bool {
        self.path.is_some()
    }

    /// Cargo refuses to publish a crate whose path or git dependency lacks a version
    pub fn needs_requirement(&self) -> bool {
        self.kind.is_published()
            && !self.workspace
            && (self.path.is_some() || self.git.is_some())
            && self.requirement.is_none()
    }
}

/// Collect every declaration of a manifest, including `[target.*]` tables
pub(crate) fn collect_dependencies(root: &dyn TableLike) -> Vec<Dependency> {
    let mut deps = Vec::new();

    for (name, item) in root.iter() {
        if name == "target" {
            let Some(targets) = item.as_table_like() else {
                continue;
            };
            for (cfg, target) in targets.iter() {
                let Some(target) = target.as_table_like() else {
                    continue;
                };
                for (name, item) in target.iter() {
                    if let Some(kind) = DependencyKind::from_table_name(name) {
                        collect_table(item, kind, Some(cfg), &mut deps);
                    }
                }
            }
        } else if let Some(kind) = DependencyKind::from_table_name(name) {
            collect_table(item, kind, None, &mut deps);
        }
    }

    deps
}

fn collect_table(item: &Item, kind: DependencyKind, target: Option<&str>, deps: &mut Vec<Dependency>) {
    if let Some(table) = item.as_table_like() {
        deps.extend(
            table
                .iter()
                .filter_map(|(key, item)| Dependency::from_item(key, item, kind, target)),
        );
    }
}

/// Every dependency table of a manifest, mutably
pub(crate) fn dependency_tables_mut(
    root: &mut dyn TableLike,
) -> Vec<(DependencyKind, &mut dyn TableLike)> {
    let mut tables = Vec::new();

    for (name, item) in root.iter_mut() {
        if name.get() == "target" {
            let Some(targets) = item.as_table_like_mut() else {
                continue;
            };
            for (_, target) in targets.iter_mut() {
                let Some(target) = target.as_table_like_mut() else {
                    continue;
                };
                for (name, item) in target.iter_mut() {
                    if let Some(kind) = DependencyKind::from_table_name(name.get()) {
                        if let Some(table) = item.as_table_like_mut() {
                            tables.push((kind, table));
                        }
                    }
                }
            }
        } else if let Some(kind) = DependencyKind::from_table_name(name.get()) {
            if let Some(table) = item.as_table_like_mut() {
                tables.push((kind, table));
            }
        }
    }

    tables
}

/// Rewrite the requirement of every path declaration of `sibling` in one table
///
/// Dev-dependencies without a version stay without one. Returns the number
/// of declarations whose text changed.
pub(crate) fn rewrite_table(
    table: &mut dyn TableLike,
    kind: DependencyKind,
    sibling: &str,
    requirement: &str,
) -> usize {
    let mut changed = 0;

    for (key, decl) in table.iter_mut() {
        let Some(fields) = decl.as_table_like() else {
            // `name = "1.0"` is a registry dependency
            continue;
        };

        let package = fields
            .get("package")
            .and_then(Item::as_str)
            .unwrap_or(key.get());
        let is_workspace = fields
            .get("workspace")
            .and_then(Item::as_bool)
            .unwrap_or(false);

        if package != sibling || is_workspace || !fields.contains_key("path") {
            continue;
        }
        if kind == DependencyKind::Dev && !fields.contains_key("version") {
            continue;
        }

        if set_requirement(decl, requirement) {
            changed += 1;
        }
    }

    changed
}

/// Set `version` on one declaration, keeping its formatting
fn set_requirement(decl: &mut Item, requirement: &str) -> bool {
    if let Some(current) = decl.as_table_like_mut().and_then(|t| t.get_mut("version")) {
        return replace_string(current, requirement);
    }

    match decl {
        Item::Value(Value::InlineTable(table)) => insert_inline(table, "version", requirement),
        Item::Table(table) => {
            table.insert("version", toml_edit::value(requirement));
        }
        _ => return false,
    }
    true
}

/// Replace a string value in place; whitespace and trailing comments survive
pub(crate) fn replace_string(item: &mut Item, new: &str) -> bool {
    if item.as_str() == Some(new) {
        return false;
    }

    let mut value = Value::from(new);
    if let Some(old) = item.as_value() {
        *value.decor_mut() = old.decor().clone();
    }
    *item = Item::Value(value);
    true
}

// The closing-brace padding sits on the last value; move it to the new one
fn insert_inline(table: &mut InlineTable, key: &str, new: &str) {
    let trailing = table.iter_mut().last().and_then(|(_, last)| {
        let suffix = last.decor().suffix().cloned();
        last.decor_mut().set_suffix("");
        suffix
    });

    let mut value = Value::from(new);
    if let Some(suffix) = trailing {
        value.decor_mut().set_suffix(suffix);
    }
    table.insert(key, value);
}
