//! Workspace member discovery

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use semver::Version;
use toml_edit::Item;
use tracing::{debug, info, instrument};

use crate::error::{ManifestError, Result, WorkspaceError};
use crate::manifest::{Dependency, Manifest};

use super::{DependencyGraph, Workspace};

impl Workspace {
    /// Discover the workspace rooted at `root`
    ///
    /// `root` must contain a Cargo.toml. A root without `[workspace]` is a
    /// single-crate workspace.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn discover(root: &Path) -> Result<Self> {
        let root_manifest_path = root.join("Cargo.toml");
        if !root_manifest_path.exists() {
            return Err(WorkspaceError::NoManifest(root.to_path_buf()).into());
        }
        let root = fs::canonicalize(root)?;
        let root_manifest = Manifest::load_root(&root.join("Cargo.toml"))?;

        let mut manifests = vec![root_manifest];

        if manifests[0].is_workspace_root() {
            for dir in member_dirs(&root, &manifests[0])? {
                if dir == root {
                    continue;
                }
                manifests.push(Manifest::load(&dir.join("Cargo.toml"))?);
            }
        }

        let mut members: BTreeMap<String, usize> = BTreeMap::new();
        for (index, manifest) in manifests.iter().enumerate() {
            let Some(package) = manifest.package() else {
                continue;
            };
            if let Some(existing) = members.insert(package.name.clone(), index) {
                return Err(WorkspaceError::DuplicateMember {
                    name: package.name.clone(),
                    first: manifests[existing].path().to_path_buf(),
                    second: manifest.path().to_path_buf(),
                }
                .into());
            }
        }

        if members.is_empty() {
            return Err(WorkspaceError::NoPackages(root).into());
        }

        resolve_inherited_versions(&mut manifests)?;
        let graph = build_graph(&manifests, &members);

        info!(
            members = members.len(),
            edges = graph.edges().len(),
            "workspace discovered"
        );

        Ok(Self {
            root,
            manifests,
            members,
            graph,
        })
    }
}

/// Member directories listed by `[workspace] members`, minus `exclude`
fn member_dirs(root: &Path, root_manifest: &Manifest) -> Result<Vec<PathBuf>> {
    let workspace = root_manifest.workspace_table();
    let strings = |key: &str| -> Vec<String> {
        workspace
            .and_then(|w| w.get(key))
            .and_then(Item::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    };

    let excluded: Vec<PathBuf> = strings("exclude")
        .iter()
        .map(|e| normalize(&root.join(e)))
        .collect();

    let mut dirs = Vec::new();
    let mut seen = HashSet::new();

    for pattern in strings("members") {
        let candidates = if is_glob(&pattern) {
            // The root is literal text; only the member entry is a pattern
            let full = Path::new(&Pattern::escape(&root.to_string_lossy())).join(&pattern);
            let paths = glob(&full.to_string_lossy()).map_err(|e| {
                WorkspaceError::InvalidMemberPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
            })?;

            paths
                .filter_map(|p| p.ok())
                .filter(|p| p.join("Cargo.toml").is_file())
                .map(|p| normalize(&p))
                .filter(|p| {
                    let skip = excluded.iter().any(|e| p.starts_with(e));
                    if skip {
                        debug!(path = %p.display(), "excluded from workspace");
                    }
                    !skip
                })
                .collect()
        } else {
            let dir = root.join(&pattern);
            if !dir.join("Cargo.toml").is_file() {
                return Err(WorkspaceError::MissingMember {
                    pattern,
                    path: dir.join("Cargo.toml"),
                }
                .into());
            }
            vec![normalize(&dir)]
        };

        for dir in candidates {
            if seen.insert(dir.clone()) {
                debug!(pattern = %pattern, path = %dir.display(), "found member");
                dirs.push(dir);
            }
        }
    }

    Ok(dirs)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn resolve_inherited_versions(manifests: &mut [Manifest]) -> Result<()> {
    if !manifests.iter().any(Manifest::inherits_version) {
        return Ok(());
    }

    let root_path = manifests[0].path().to_path_buf();
    let raw = manifests[0]
        .workspace_version()
        .ok_or_else(|| ManifestError::MissingField {
            path: root_path.clone(),
            field: "workspace.package.version".to_string(),
        })?
        .to_string();
    let version = Version::parse(&raw).map_err(|e| ManifestError::InvalidVersion {
        path: root_path,
        version: raw.clone(),
        reason: e.to_string(),
    })?;

    for manifest in manifests.iter_mut() {
        manifest.inherit_version(version.clone());
    }
    Ok(())
}

fn build_graph(manifests: &[Manifest], members: &BTreeMap<String, usize>) -> DependencyGraph {
    let mut graph = DependencyGraph::new(members.keys().cloned());

    let by_dir: HashMap<PathBuf, &str> = members
        .iter()
        .map(|(name, i)| (normalize(manifests[*i].dir()), name.as_str()))
        .collect();

    let root = &manifests[0];
    let workspace_deps: HashMap<String, Dependency> = root
        .workspace_dependencies()
        .into_iter()
        .map(|d| (d.key.clone(), d))
        .collect();

    for (name, index) in members {
        let manifest = &manifests[*index];
        for dep in manifest.dependencies() {
            let resolved = if dep.workspace {
                workspace_deps.get(&dep.key).and_then(|root_dep| {
                    root_dep
                        .path
                        .as_ref()
                        .map(|p| (root.dir().join(p), root_dep.package.as_str()))
                })
            } else {
                dep.path
                    .as_ref()
                    .map(|p| (manifest.dir().join(p), dep.package.as_str()))
            };

            let Some((path, package)) = resolved else {
                continue;
            };

            match by_dir.get(&normalize(&path)) {
                Some(member) if *member == package => {
                    graph.add_edge(name, member, dep.kind);
                }
                _ => {
                    debug!(
                        member = %name,
                        dependency = %dep.key,
                        path = %path.display(),
                        "path dependency outside the workspace"
                    );
                }
            }
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemrelError;
    use crate::manifest::DependencyKind;
    use crate::test_support::{package, Fixture};

    #[test]
    fn test_discover_chain() {
        let fixture = Fixture::chain();
        let ws = Workspace::discover(fixture.root()).unwrap();

        assert_eq!(ws.member_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(ws.root_package().is_none());
        assert_eq!(ws.graph().dependencies_of("a"), vec!["b"]);
        assert_eq!(ws.publish_plan().unwrap().order(), ["c", "b", "a"]);
    }

    #[test]
    fn test_discover_single_crate() {
        let fixture = Fixture::new(&package("solo", "0.3.0", ""));
        let ws = Workspace::discover(fixture.root()).unwrap();
        assert_eq!(ws.len(), 1);
        assert_eq!(ws.root_package(), Some("solo"));
        assert_eq!(ws.version_of("solo").unwrap().to_string(), "0.3.0");
    }

    #[test]
    fn test_root_package_is_member() {
        let root = format!(
            "{}\n[workspace]\nmembers = [\"crates/*\"]\n",
            package("app", "1.0.0", "lib = { path = \"crates/lib\", version = \"1.0.0\" }")
        );
        let fixture = Fixture::new(&root);
        fixture.add("crates/lib", &package("lib", "1.0.0", ""));

        let ws = Workspace::discover(fixture.root()).unwrap();
        assert_eq!(ws.root_package(), Some("app"));
        assert_eq!(ws.publish_plan().unwrap().order(), ["lib", "app"]);
    }

    #[test]
    fn test_glob_and_exclude() {
        let fixture = Fixture::new(
            "[workspace]\nmembers = [\"crates/*\"]\nexclude = [\"crates/experimental\"]\n",
        );
        fixture.add("crates/one", &package("one", "0.1.0", ""));
        fixture.add("crates/two", &package("two", "0.1.0", ""));
        fixture.add("crates/experimental", &package("experimental", "0.1.0", ""));
        std::fs::create_dir_all(fixture.root().join("crates/not-a-crate")).unwrap();

        let ws = Workspace::discover(fixture.root()).unwrap();
        assert_eq!(ws.member_names().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_glob_members_under_root_with_pattern_characters() {
        let fixture = Fixture::empty();
        let root = fixture.root().join("checkout [ci]?");
        std::fs::create_dir_all(root.join("crates/one/src")).unwrap();
        std::fs::write(root.join("Cargo.toml"), "[workspace]\nmembers = [\"crates/*\"]\n").unwrap();
        std::fs::write(
            root.join("crates/one/Cargo.toml"),
            package("one", "0.1.0", ""),
        )
        .unwrap();

        let ws = Workspace::discover(&root).unwrap();
        assert_eq!(ws.member_names().collect::<Vec<_>>(), vec!["one"]);
    }

    #[test]
    fn test_missing_literal_member() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"gone\"]\n");
        assert!(matches!(
            Workspace::discover(fixture.root()).unwrap_err(),
            SemrelError::Workspace(WorkspaceError::MissingMember { .. })
        ));
    }

    #[test]
    fn test_no_manifest_and_no_packages() {
        let fixture = Fixture::empty();
        assert!(matches!(
            Workspace::discover(fixture.root()).unwrap_err(),
            SemrelError::Workspace(WorkspaceError::NoManifest(_))
        ));

        let fixture = Fixture::new("[workspace]\nmembers = []\n");
        assert!(matches!(
            Workspace::discover(fixture.root()).unwrap_err(),
            SemrelError::Workspace(WorkspaceError::NoPackages(_))
        ));
    }

    #[test]
    fn test_duplicate_member_names() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"x\", \"y\"]\n");
        fixture.add("x", &package("same", "0.1.0", ""));
        fixture.add("y", &package("same", "0.1.0", ""));
        assert!(matches!(
            Workspace::discover(fixture.root()).unwrap_err(),
            SemrelError::Workspace(WorkspaceError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_workspace_dependency_edges_and_inherited_version() {
        let fixture = Fixture::new(
            "[workspace]\nmembers = [\"core\", \"cli\"]\n\n[workspace.package]\nversion = \"2.0.0\"\n\n[workspace.dependencies]\ncore = { path = \"core\", version = \"2.0.0\" }\n",
        );
        fixture.add(
            "core",
            "[package]\nname = \"core\"\nversion.workspace = true\n",
        );
        fixture.add(
            "cli",
            "[package]\nname = \"cli\"\nversion.workspace = true\n\n[dependencies]\ncore.workspace = true\n",
        );

        let ws = Workspace::discover(fixture.root()).unwrap();
        assert_eq!(ws.version_of("cli").unwrap().to_string(), "2.0.0");
        assert_eq!(ws.graph().dependencies_of("cli"), vec!["core"]);
    }

    #[test]
    fn test_external_path_and_renames() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"app\", \"util\"]\n");
        fixture.add(
            "app",
            &package(
                "app",
                "0.1.0",
                "helpers = { package = \"util\", path = \"../util\", version = \"0.1.0\" }\nvendored = { path = \"../vendor/vendored\" }",
            ),
        );
        fixture.add("util", &package("util", "0.1.0", ""));
        fixture.add("vendor/vendored", &package("vendored", "0.1.0", ""));

        let ws = Workspace::discover(fixture.root()).unwrap();
        let edges = ws.graph().edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "app");
        assert_eq!(edges[0].to, "util");
        assert!(edges[0].kinds.contains(&DependencyKind::Normal));
    }

    #[test]
    fn test_publishability() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"a\", \"b\"]\n");
        fixture.add(
            "a",
            "[package]\nname = \"a\"\nversion = \"0.1.0\"\npublish = false\n",
        );
        fixture.add(
            "b",
            "[package]\nname = \"b\"\nversion = \"0.1.0\"\npublish = [\"internal\"]\n",
        );
        let ws = Workspace::discover(fixture.root()).unwrap();
        assert!(!ws.is_publishable("a", "crates-io"));
        assert!(!ws.is_publishable("b", "crates-io"));
        assert!(ws.is_publishable("b", "internal"));
        assert!(!ws.is_publishable("missing", "internal"));
    }
}
