//! verifyConditions: check that a release can go through before anything changes

use std::path::{Path, PathBuf};

use semrel_registry::{token_env_var, CredentialProvider, Registry};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{ConfigError, Result, VerificationError};
use crate::manifest::{Dependency, Manifest};
use crate::types::{VerificationReport, VerifiedCrate};
use crate::workspace::Workspace;

/// Registry token from the config, the environment or cargo's credentials
///
/// A token in the config wins.
pub fn resolve_token(config: &Config, provider: &CredentialProvider) -> Result<Option<String>> {
    if let Some(token) = config.registry_token.as_deref().filter(|t| !t.trim().is_empty()) {
        debug!("using registry token from configuration");
        return Ok(Some(token.to_string()));
    }

    provider
        .token(config.registry.as_deref())
        .map_err(|e| ConfigError::ParseError(format!("reading registry credentials: {}", e)).into())
}

/// Locate the cargo executable
///
/// `$CARGO` is honoured the way cargo subcommands do.
pub fn locate_cargo() -> Result<PathBuf> {
    if let Some(cargo) = std::env::var_os("CARGO").map(PathBuf::from) {
        if cargo.is_file() {
            return Ok(cargo);
        }
    }
    which::which("cargo").map_err(|e| VerificationError::CargoNotFound(e.to_string()).into())
}

/// Verify that the workspace can be released
///
/// Checks run cheapest first: workspace layout and ordering, the token,
/// dependencies cargo would reject, the cargo executable, then registry
/// lookups. Dry runs skip the registry. Nothing on disk is modified.
#[instrument(skip_all, fields(root = %root.display(), registry = registry.name()))]
pub async fn verify_conditions(
    root: &Path,
    config: &Config,
    token: Option<&str>,
    registry: &dyn Registry,
) -> Result<VerificationReport> {
    let workspace = Workspace::discover(root)?;
    let plan = workspace.publish_plan()?;
    info!(members = workspace.len(), "workspace discovered");

    if token.map(str::trim).filter(|t| !t.is_empty()).is_none() {
        return Err(VerificationError::MissingToken {
            registry: config.registry_name().to_string(),
            variable: token_env_var(config.registry.as_deref()),
        }
        .into());
    }

    let registry_name = config.registry_name();
    let mut crates = Vec::with_capacity(plan.len());
    for name in plan.iter() {
        let publishable = workspace.is_publishable(name, registry_name) && !config.is_excluded(name);
        let version = workspace
            .version_of(name)
            .map(ToString::to_string)
            .unwrap_or_default();

        if publishable {
            if let Some(manifest) = workspace.member(name) {
                check_dependencies(&workspace, manifest)?;
            }
        } else {
            debug!(name, "not taking part in publishing");
        }

        crates.push(VerifiedCrate {
            name: name.to_string(),
            version,
            publishable,
            already_published: None,
        });
    }

    if !config.dry_run {
        let cargo = locate_cargo()?;
        debug!(cargo = %cargo.display(), "found cargo");
    }

    if config.dry_run {
        info!("dry run, skipping registry checks");
    } else {
        for entry in crates.iter_mut().filter(|c| c.publishable) {
            let exists = registry
                .version_exists(&entry.name, &entry.version)
                .await
                .map_err(|e| VerificationError::Unreachable {
                    registry: registry.name().to_string(),
                    reason: e.to_string(),
                })?;
            if exists {
                warn!(
                    name = %entry.name,
                    version = %entry.version,
                    "version already published; publish will skip it"
                );
            }
            entry.already_published = Some(exists);
        }
    }

    info!(publishable = crates.iter().filter(|c| c.publishable).count(), "verification passed");
    Ok(VerificationReport {
        registry: registry.name().to_string(),
        plan: plan.order().to_vec(),
        crates,
        network_checks_skipped: config.dry_run,
    })
}

/// Reject dependencies cargo publish would refuse
///
/// Path dependencies on members get their requirement during prepare, so
/// only git and out-of-workspace path dependencies are checked.
fn check_dependencies(workspace: &Workspace, manifest: &Manifest) -> Result<()> {
    let inherited = workspace.workspace_dependencies();

    for dep in manifest.dependencies() {
        if !dep.kind.is_published() {
            continue;
        }

        let declared = if dep.workspace {
            match inherited.iter().find(|d| d.key == dep.key) {
                Some(root_dep) => root_dep,
                None => continue,
            }
        } else {
            dep
        };

        if is_member_path(workspace, declared) {
            continue;
        }

        if declared.requirement.is_none() && (declared.path.is_some() || declared.git.is_some()) {
            return Err(VerificationError::UnpublishableDependency {
                member: manifest.name().to_string(),
                dependency: dep.package.clone(),
                kind: dep.kind.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn is_member_path(workspace: &Workspace, dep: &Dependency) -> bool {
    dep.path.is_some() && workspace.member(&dep.package).is_some()
}
