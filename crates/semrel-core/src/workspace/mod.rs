//! Cargo workspace model
//!
//! - Member discovery from `[workspace] members` / `exclude`
//! - Intra-workspace dependency edges (path and `workspace = true` declarations)
//! - Publish ordering with cycle detection

mod discovery;
pub mod graph;
pub mod plan;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;

use crate::error::CycleError;
use crate::manifest::{Dependency, Manifest};

pub use graph::{DependencyGraph, Edge};
pub use plan::PublishPlan;

/// A discovered workspace
///
/// The root Cargo.toml is always loaded, virtual or not. When it has a
/// `[package]` table it is also a member.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    manifests: Vec<Manifest>,
    members: BTreeMap<String, usize>,
    graph: DependencyGraph,
}

impl Workspace {
    /// Canonical workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root Cargo.toml
    pub fn root_manifest(&self) -> &Manifest {
        &self.manifests[0]
    }

    pub(crate) fn root_manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifests[0]
    }

    /// Name of the root package, if the root is not virtual
    pub fn root_package(&self) -> Option<&str> {
        self.root_manifest().package().map(|p| p.name.as_str())
    }

    /// Member manifests, sorted by name
    pub fn members(&self) -> impl Iterator<Item = &Manifest> {
        self.members.values().map(|i| &self.manifests[*i])
    }

    /// Member names, sorted
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the workspace has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Look up a member by crate name
    pub fn member(&self, name: &str) -> Option<&Manifest> {
        self.members.get(name).map(|i| &self.manifests[*i])
    }

    pub(crate) fn member_mut(&mut self, name: &str) -> Option<&mut Manifest> {
        let index = *self.members.get(name)?;
        self.manifests.get_mut(index)
    }

    /// All loaded manifests; the root comes first
    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    /// Effective version of a member
    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.member(name).and_then(Manifest::version)
    }

    /// `[workspace.dependencies]` of the root
    pub fn workspace_dependencies(&self) -> Vec<Dependency> {
        self.root_manifest().workspace_dependencies()
    }

    /// Dependency graph between members
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Members in publish order
    pub fn publish_plan(&self) -> Result<PublishPlan, CycleError> {
        self.graph.publish_order().map(PublishPlan::new)
    }

    /// Check if a member may be published to `registry`
    pub fn is_publishable(&self, name: &str, registry: &str) -> bool {
        self.member(name)
            .and_then(Manifest::package)
            .is_some_and(|p| p.publish.allows(registry))
    }
}
