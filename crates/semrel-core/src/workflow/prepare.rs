//! prepare: stamp the release version across the workspace

use std::path::Path;

use semver::Version;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::{Result, VersionError};
use crate::manifest::{Lockfile, Manifest, PendingFlush};
use crate::types::PrepareReport;
use crate::workspace::Workspace;

/// Set every member to `version` and point sibling requirements at it
///
/// All rewritten files are staged before any is replaced; an error while
/// staging leaves the workspace untouched. Running twice with the same
/// version changes nothing the second time.
#[instrument(skip_all, fields(root = %root.display(), version = %version))]
pub fn prepare(root: &Path, version: &str, config: &Config) -> Result<PrepareReport> {
    let target = Version::parse(version).map_err(|e| VersionError::Invalid {
        version: version.to_string(),
        reason: e.to_string(),
    })?;
    let version = target.to_string();

    let mut workspace = Workspace::discover(root)?;
    let members: Vec<String> = workspace.member_names().map(String::from).collect();
    info!(members = members.len(), "preparing release");

    set_versions(&mut workspace, &members, &target)?;
    rewrite_requirements(&mut workspace, config, &version)?;
    check_consistency(&workspace, &version)?;

    let mut staged: Vec<PendingFlush> = Vec::new();
    for manifest in workspace.manifests() {
        if let Some(pending) = manifest.stage_flush()? {
            staged.push(pending);
        }
    }

    let mut lockfile_updated = false;
    if config.update_lockfile {
        if let Some(pending) = stage_lockfile(&workspace, &members, &version)? {
            staged.push(pending);
            lockfile_updated = true;
        }
    } else {
        debug!("lockfile update disabled");
    }

    let mut changed_files = Vec::with_capacity(staged.len());
    for pending in staged {
        let path = pending.target().to_path_buf();
        pending.commit()?;
        changed_files.push(path);
    }

    if changed_files.is_empty() {
        info!("workspace already at target version");
    } else {
        info!(files = changed_files.len(), "release version written");
    }

    Ok(PrepareReport {
        version,
        members,
        changed_files,
        lockfile_updated,
    })
}

fn set_versions(workspace: &mut Workspace, members: &[String], target: &Version) -> Result<()> {
    let version = target.to_string();
    let mut inherited = Vec::new();

    for name in members {
        let Some(manifest) = workspace.member_mut(name) else {
            continue;
        };
        if manifest.inherits_version() {
            inherited.push(name.clone());
        } else if manifest.set_version(&version)? {
            debug!(name = %name, "package version updated");
        }
    }

    if !inherited.is_empty() {
        if workspace.root_manifest_mut().set_workspace_version(&version)? {
            debug!("workspace.package version updated");
        }
        for name in &inherited {
            if let Some(manifest) = workspace.member_mut(name) {
                manifest.inherit_version(target.clone());
            }
        }
    }
    Ok(())
}

fn rewrite_requirements(workspace: &mut Workspace, config: &Config, version: &str) -> Result<()> {
    let policy = config.dependency_version_policy;

    for edge in workspace.graph().edges() {
        if let Some(manifest) = workspace.member_mut(&edge.from) {
            manifest.rewrite_sibling_dependency_version(&edge.to, version, policy)?;
        }
    }

    let shared: Vec<String> = workspace
        .workspace_dependencies()
        .into_iter()
        .filter(|d| d.path.is_some() && workspace.member(&d.package).is_some())
        .map(|d| d.package)
        .collect();
    for name in shared {
        workspace
            .root_manifest_mut()
            .rewrite_sibling_dependency_version(&name, version, policy)?;
    }
    Ok(())
}

/// Re-read every staged document and confirm the version it declares
fn check_consistency(workspace: &Workspace, expected: &str) -> Result<()> {
    let root = workspace.root_manifest();
    let reparsed_root = Manifest::from_str_at(root.path(), root.render())?;
    let workspace_version = reparsed_root.workspace_version().map(String::from);

    for manifest in workspace.members() {
        let reparsed = Manifest::from_str_at(manifest.path(), manifest.render())?;
        let found = if reparsed.inherits_version() {
            workspace_version.clone()
        } else {
            reparsed.version().map(ToString::to_string)
        };

        if found.as_deref() != Some(expected) {
            return Err(VersionError::InconsistentRewrite {
                member: manifest.name().to_string(),
                expected: expected.to_string(),
                found: found.unwrap_or_else(|| "no version".to_string()),
            }
            .into());
        }
    }
    Ok(())
}

fn stage_lockfile(workspace: &Workspace, members: &[String], version: &str) -> Result<Option<PendingFlush>> {
    let Some(mut lockfile) = Lockfile::load(workspace.root())? else {
        debug!("no Cargo.lock in workspace root");
        return Ok(None);
    };

    for name in members {
        lockfile.set_member_version(name, version)?;
    }
    lockfile.stage_flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemrelError;
    use crate::manifest::DependencyVersionPolicy;
    use crate::test_support::{package, Fixture};

    #[test]
    fn test_prepare_updates_versions_and_requirements() {
        let fixture = Fixture::chain();
        let report = prepare(fixture.root(), "1.2.0", &Config::default()).unwrap();

        assert_eq!(report.version, "1.2.0");
        assert_eq!(report.members, vec!["a", "b", "c"]);
        assert_eq!(report.changed_files.len(), 3);

        let a = fixture.read("crates/a/Cargo.toml");
        assert!(a.contains("version = \"1.2.0\"\nedition"));
        assert!(a.contains("b = { path = \"../b\", version = \"1.2.0\" }"));
        let c = fixture.read("crates/c/Cargo.toml");
        assert!(c.contains("version = \"1.2.0\""));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let fixture = Fixture::chain();
        prepare(fixture.root(), "1.2.0", &Config::default()).unwrap();
        let before = fixture.snapshot();

        let report = prepare(fixture.root(), "1.2.0", &Config::default()).unwrap();
        assert!(!report.has_changes());
        assert_eq!(fixture.snapshot(), before);
    }

    #[test]
    fn test_invalid_version_touches_nothing() {
        let fixture = Fixture::chain();
        let before = fixture.snapshot();

        let err = prepare(fixture.root(), "1.2", &Config::default()).unwrap_err();
        assert!(matches!(err, SemrelError::Version(VersionError::Invalid { .. })));
        assert_eq!(fixture.snapshot(), before);
    }

    #[test]
    fn test_exact_policy() {
        let fixture = Fixture::chain();
        let config = Config {
            dependency_version_policy: DependencyVersionPolicy::Exact,
            ..Default::default()
        };
        prepare(fixture.root(), "2.0.0", &config).unwrap();
        assert!(fixture
            .read("crates/b/Cargo.toml")
            .contains("c = { path = \"../c\", version = \"=2.0.0\" }"));
    }

    #[test]
    fn test_formatting_and_comments_survive() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"a\", \"b\"]\n");
        fixture.add(
            "a",
            "# the app\n[package]\nname = \"a\"\nversion   = \"0.1.0\" # bumped by CI\n\n[dependencies]\nb = { path = \"../b\", version = \"0.1\" }  # sibling\nserde = \"1\"\n",
        );
        fixture.add("b", &package("b", "0.1.0", ""));

        prepare(fixture.root(), "0.2.0", &Config::default()).unwrap();
        assert_eq!(
            fixture.read("a/Cargo.toml"),
            "# the app\n[package]\nname = \"a\"\nversion   = \"0.2.0\" # bumped by CI\n\n[dependencies]\nb = { path = \"../b\", version = \"0.2.0\" }  # sibling\nserde = \"1\"\n"
        );
    }

    #[test]
    fn test_inherited_version_and_workspace_dependencies() {
        let fixture = Fixture::new(
            "[workspace]\nmembers = [\"a\", \"b\"]\n\n[workspace.package]\nversion = \"0.1.0\"\n\n[workspace.dependencies]\nb = { path = \"b\", version = \"0.1.0\" }\n",
        );
        fixture.add(
            "a",
            "[package]\nname = \"a\"\nversion.workspace = true\n\n[dependencies]\nb.workspace = true\n",
        );
        fixture.add("b", "[package]\nname = \"b\"\nversion.workspace = true\n");

        let report = prepare(fixture.root(), "0.3.0", &Config::default()).unwrap();
        assert_eq!(report.changed_files.len(), 1);

        let root = fixture.read("Cargo.toml");
        assert!(root.contains("[workspace.package]\nversion = \"0.3.0\""));
        assert!(root.contains("b = { path = \"b\", version = \"0.3.0\" }"));
        assert!(fixture.read("a/Cargo.toml").contains("version.workspace = true"));
    }

    #[test]
    fn test_dev_dependency_handling() {
        let fixture = Fixture::new("[workspace]\nmembers = [\"a\", \"b\"]\n");
        fixture.add(
            "a",
            "[package]\nname = \"a\"\nversion = \"0.1.0\"\n\n[dev-dependencies]\nb = { path = \"../b\" }\n",
        );
        fixture.add(
            "b",
            "[package]\nname = \"b\"\nversion = \"0.1.0\"\n\n[dev-dependencies]\na = { path = \"../a\", version = \"0.1.0\" }\n",
        );

        prepare(fixture.root(), "0.2.0", &Config::default()).unwrap();
        assert!(fixture.read("a/Cargo.toml").contains("b = { path = \"../b\" }"));
        assert!(fixture
            .read("b/Cargo.toml")
            .contains("a = { path = \"../a\", version = \"0.2.0\" }"));
    }

    #[test]
    fn test_lockfile_is_updated() {
        let fixture = Fixture::chain();
        fixture.write(
            "Cargo.lock",
            "version = 3\n\n[[package]]\nname = \"a\"\nversion = \"0.1.0\"\n\n[[package]]\nname = \"serde\"\nversion = \"0.1.0\"\nsource = \"registry+https://github.com/rust-lang/crates.io-index\"\n",
        );

        let report = prepare(fixture.root(), "0.4.0", &Config::default()).unwrap();
        assert!(report.lockfile_updated);
        let lock = fixture.read("Cargo.lock");
        assert!(lock.contains("name = \"a\"\nversion = \"0.4.0\""));
        assert!(lock.contains("name = \"serde\"\nversion = \"0.1.0\""));
    }

    #[test]
    fn test_lockfile_update_can_be_disabled() {
        let fixture = Fixture::chain();
        let lock = "version = 3\n\n[[package]]\nname = \"a\"\nversion = \"0.1.0\"\n";
        fixture.write("Cargo.lock", lock);
        let config = Config {
            update_lockfile: false,
            ..Default::default()
        };

        let report = prepare(fixture.root(), "0.4.0", &config).unwrap();
        assert!(!report.lockfile_updated);
        assert_eq!(fixture.read("Cargo.lock"), lock);
    }

    #[test]
    fn test_staging_failure_leaves_workspace_untouched() {
        let fixture = Fixture::chain();
        let before = fixture.snapshot();
        // Manifests are staged before the lockfile is read
        std::fs::create_dir(fixture.root().join("Cargo.lock")).unwrap();

        let err = prepare(fixture.root(), "9.0.0", &Config::default()).unwrap_err();
        assert!(matches!(err, SemrelError::Manifest(_)));
        assert_eq!(fixture.snapshot(), before);
    }
}
