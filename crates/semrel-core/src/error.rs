//! Error types for semrel

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::PublishReport;

/// Result type alias using SemrelError
pub type Result<T> = std::result::Result<T, SemrelError>;

/// Lifecycle phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Loading and validating configuration
    Config,
    /// Reading the workspace and building the dependency graph
    Discover,
    /// verifyConditions hook
    Verify,
    /// prepare hook
    Prepare,
    /// publish hook
    Publish,
}

impl Phase {
    /// Returns the string representation of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Discover => "discover",
            Self::Verify => "verify",
            Self::Prepare => "prepare",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for semrel operations
#[derive(Debug, Error)]
pub enum SemrelError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest-related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Workspace layout errors
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Dependency cycle between members
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// verifyConditions failures
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Version-related errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Publish failures
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl SemrelError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Phase the error belongs to, when it can be attributed to one
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Config(_) => Some(Phase::Config),
            Self::Manifest(ManifestError::Write { .. } | ManifestError::Lockfile { .. }) => {
                Some(Phase::Prepare)
            }
            Self::Manifest(_) | Self::Workspace(_) | Self::Cycle(_) => Some(Phase::Discover),
            Self::Verification(_) => Some(Phase::Verify),
            Self::Version(_) => Some(Phase::Prepare),
            Self::Publish(_) => Some(Phase::Publish),
            Self::Io(_) | Self::Other(_) => None,
        }
    }

    /// Crate the error is about, when known
    pub fn member(&self) -> Option<&str> {
        match self {
            Self::Verification(VerificationError::UnpublishableDependency { member, .. }) => {
                Some(member)
            }
            Self::Version(VersionError::InconsistentRewrite { member, .. }) => Some(member),
            Self::Manifest(ManifestError::Lockfile { package, .. }) => Some(package),
            Self::Workspace(WorkspaceError::DuplicateMember { name, .. }) => Some(name),
            Self::Publish(err) => err.member(),
            _ => None,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading or writing Cargo.toml and Cargo.lock
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file does not exist
    #[error("Manifest not found at {0}")]
    NotFound(PathBuf),

    /// Manifest exists but cannot be read
    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// Manifest is not valid TOML
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A required key is absent
    #[error("{path} is missing `{field}`")]
    MissingField { path: PathBuf, field: String },

    /// `package.version` is not a semantic version
    #[error("Invalid version '{version}' in {path}: {reason}")]
    InvalidVersion {
        path: PathBuf,
        version: String,
        reason: String,
    },

    /// Staging or committing a rewritten file failed
    #[error("Failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Cargo.lock could not be updated for a package
    #[error("Failed to update {package} in {path}: {reason}")]
    Lockfile {
        path: PathBuf,
        package: String,
        reason: String,
    },
}

/// Workspace layout errors
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No Cargo.toml at the workspace root
    #[error("No Cargo.toml found in {0}")]
    NoManifest(PathBuf),

    /// A literal `members` entry does not point at a crate
    #[error("Workspace member {pattern} has no Cargo.toml at {path}")]
    MissingMember { pattern: String, path: PathBuf },

    /// A `members` glob cannot be parsed
    #[error("Invalid workspace member pattern '{pattern}': {reason}")]
    InvalidMemberPattern { pattern: String, reason: String },

    /// Two members share a crate name
    #[error("Crate name {name} is used by both {first} and {second}")]
    DuplicateMember {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Neither a root package nor any members
    #[error("Workspace at {0} contains no packages")]
    NoPackages(PathBuf),
}

/// Members that lie on a dependency cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Dependency cycle between workspace members: {}", members.join(", "))]
pub struct CycleError {
    /// Sorted crate names on some cycle
    pub members: Vec<String>,
}

/// verifyConditions failures
#[derive(Debug, Error)]
pub enum VerificationError {
    /// No registry token configured
    #[error("No token configured for {registry}; set {variable} or `registry_token`")]
    MissingToken { registry: String, variable: String },

    /// The registry could not be queried
    #[error("Registry {registry} is unreachable: {reason}")]
    Unreachable { registry: String, reason: String },

    /// A dependency cargo would refuse to publish
    #[error("{member} cannot be published: {kind} dependency `{dependency}` has no version requirement")]
    UnpublishableDependency {
        member: String,
        dependency: String,
        kind: String,
    },

    /// `cargo` is not on PATH
    #[error("cargo executable not found: {0}")]
    CargoNotFound(String),
}

/// Version-related errors
#[derive(Debug, Error)]
pub enum VersionError {
    /// Target version is not semver
    #[error("Invalid release version '{version}': {reason}")]
    Invalid { version: String, reason: String },

    /// A staged manifest does not carry the target version
    #[error("{member} would be left at {found} instead of {expected}")]
    InconsistentRewrite {
        member: String,
        expected: String,
        found: String,
    },
}

/// Publish failures; every variant carries the partial report
#[derive(Debug, Error)]
pub enum PublishError {
    /// The registry refused a crate permanently
    #[error("Publishing {member} was rejected: {cause}")]
    Rejected {
        member: String,
        cause: String,
        report: Box<PublishReport>,
    },

    /// A transient failure outlived the retry budget
    #[error("Publishing {member} failed after {attempts} attempts: {cause}")]
    RetriesExhausted {
        member: String,
        attempts: u32,
        cause: String,
        report: Box<PublishReport>,
    },

    /// The published version never became visible
    #[error("{member}@{version} was not visible in the registry after {waited_secs}s")]
    PropagationTimeout {
        member: String,
        version: String,
        waited_secs: u64,
        report: Box<PublishReport>,
    },

    /// The run was cancelled
    #[error("Publishing cancelled{}", member.as_ref().map(|m| format!(" while processing {m}")).unwrap_or_default())]
    Cancelled {
        member: Option<String>,
        report: Box<PublishReport>,
    },

    /// Best-effort run finished with failures
    #[error("Publishing incomplete, failed: {}", failed.join(", "))]
    Incomplete {
        failed: Vec<String>,
        report: Box<PublishReport>,
    },
}

impl PublishError {
    /// Partial report at the time of failure
    pub fn report(&self) -> &PublishReport {
        match self {
            Self::Rejected { report, .. }
            | Self::RetriesExhausted { report, .. }
            | Self::PropagationTimeout { report, .. }
            | Self::Cancelled { report, .. }
            | Self::Incomplete { report, .. } => report,
        }
    }

    /// Crate being processed when the run stopped
    pub fn member(&self) -> Option<&str> {
        match self {
            Self::Rejected { member, .. }
            | Self::RetriesExhausted { member, .. }
            | Self::PropagationTimeout { member, .. } => Some(member),
            Self::Cancelled { member, .. } => member.as_deref(),
            Self::Incomplete { failed, .. } => failed.first().map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_message() {
        let err = CycleError {
            members: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Dependency cycle between workspace members: a, b"
        );
    }

    #[test]
    fn test_phase_attribution() {
        let err: SemrelError = VersionError::Invalid {
            version: "x".to_string(),
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(err.phase(), Some(Phase::Prepare));

        let err: SemrelError = CycleError { members: vec![] }.into();
        assert_eq!(err.phase(), Some(Phase::Discover));

        let err: SemrelError = ManifestError::Write {
            path: PathBuf::from("Cargo.toml"),
            reason: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.phase(), Some(Phase::Prepare));

        assert_eq!(SemrelError::other("boom").phase(), None);
    }

    #[test]
    fn test_publish_error_member() {
        let err = PublishError::Cancelled {
            member: None,
            report: Box::default(),
        };
        assert_eq!(err.member(), None);
        assert_eq!(err.to_string(), "Publishing cancelled");

        let err = PublishError::Cancelled {
            member: Some("core".to_string()),
            report: Box::default(),
        };
        assert_eq!(err.to_string(), "Publishing cancelled while processing core");
    }
}
