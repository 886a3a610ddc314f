//! Report types shared by the release hooks

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use semrel_registry::CRATES_IO;

/// Per-crate publish state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStatus {
    /// Not attempted yet
    Pending,
    /// Upload or propagation wait in progress
    InFlight,
    /// Visible in the registry
    Published,
    /// Gave up on this crate
    Failed,
}

impl PublishStatus {
    /// Returns the string representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Publish record of one plan member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrateRecord {
    /// Crate name
    pub name: String,
    /// Version being published
    pub version: String,
    /// Current state
    pub status: PublishStatus,
    /// Publish attempts made
    pub attempts: u32,
    /// Last error seen, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Time from first attempt to visibility, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Dry-run entry; nothing was sent to the registry
    pub simulated: bool,
    /// Registry page for the crate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CrateRecord {
    /// Create a pending record
    pub fn pending(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            status: PublishStatus::Pending,
            attempts: 0,
            last_error: None,
            duration_ms: None,
            simulated: false,
            url: None,
        }
    }
}

/// Why a member was left out of publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Listed in `exclude_crates`
    Excluded,
    /// `publish = false` or a `publish` list without the target registry
    NotPublishable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excluded => write!(f, "excluded by configuration"),
            Self::NotPublishable => write!(f, "not publishable to this registry"),
        }
    }
}

/// A member that was not published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedCrate {
    /// Crate name
    pub name: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// Release record handed back to the release pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Human readable release name
    pub name: String,
    /// Link to the main crate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Outcome of a publish run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishReport {
    /// Registry name (`crates-io` by default)
    pub registry: String,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Root package of the workspace, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_package: Option<String>,
    /// Plan members in publish order
    pub crates: Vec<CrateRecord>,
    /// Members not taking part
    pub skipped: Vec<SkippedCrate>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PublishReport {
    /// Create an empty report for a registry
    pub fn new(registry: impl Into<String>, dry_run: bool) -> Self {
        Self {
            registry: registry.into(),
            dry_run,
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Get the record of a crate
    pub fn record(&self, name: &str) -> Option<&CrateRecord> {
        self.crates.iter().find(|c| c.name == name)
    }

    pub(crate) fn record_mut(&mut self, name: &str) -> Option<&mut CrateRecord> {
        self.crates.iter_mut().find(|c| c.name == name)
    }

    /// Status of a crate in the plan
    pub fn status(&self, name: &str) -> Option<PublishStatus> {
        self.record(name).map(|c| c.status)
    }

    fn with_status(&self, status: PublishStatus) -> Vec<&str> {
        self.crates
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Published crates, in publish order
    pub fn published(&self) -> Vec<&str> {
        self.with_status(PublishStatus::Published)
    }

    /// Failed crates
    pub fn failed(&self) -> Vec<&str> {
        self.with_status(PublishStatus::Failed)
    }

    /// Crates never attempted
    pub fn pending(&self) -> Vec<&str> {
        self.with_status(PublishStatus::Pending)
    }

    /// Check if every plan member was published
    pub fn is_complete(&self) -> bool {
        self.crates
            .iter()
            .all(|c| c.status == PublishStatus::Published)
    }

    /// Release record for the pipeline
    ///
    /// The main crate is the root package when it was published, otherwise
    /// the last crate published. Nothing published means no release.
    pub fn release(&self) -> Option<Release> {
        let published: Vec<&CrateRecord> = self
            .crates
            .iter()
            .filter(|c| c.status == PublishStatus::Published)
            .collect();

        let main = self
            .root_package
            .as_deref()
            .and_then(|root| published.iter().find(|c| c.name == root))
            .or_else(|| published.last())?;

        let label = if self.registry == CRATES_IO {
            "crates.io"
        } else {
            self.registry.as_str()
        };

        Some(Release {
            name: format!(
                "{} packages ({} packages published)",
                label,
                published.len()
            ),
            url: main.url.clone(),
        })
    }
}

/// Verification result for one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedCrate {
    /// Crate name
    pub name: String,
    /// Current version
    pub version: String,
    /// Whether it takes part in publishing
    pub publishable: bool,
    /// Current version already present in the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_published: Option<bool>,
}

/// Outcome of verifyConditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Registry name
    pub registry: String,
    /// Publish order of all members
    pub plan: Vec<String>,
    /// Per-member findings, in plan order
    pub crates: Vec<VerifiedCrate>,
    /// Registry lookups were skipped (dry run)
    pub network_checks_skipped: bool,
}

impl VerificationReport {
    /// Members whose current version is already in the registry
    pub fn already_published(&self) -> Vec<&str> {
        self.crates
            .iter()
            .filter(|c| c.already_published == Some(true))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Outcome of prepare
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareReport {
    /// Version every member now carries
    pub version: String,
    /// Members rewritten, in name order
    pub members: Vec<String>,
    /// Files whose content changed
    pub changed_files: Vec<PathBuf>,
    /// Whether Cargo.lock was rewritten
    pub lockfile_updated: bool,
}

impl PrepareReport {
    /// Check if the run wrote anything
    pub fn has_changes(&self) -> bool {
        !self.changed_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(root: Option<&str>, entries: &[(&str, PublishStatus)]) -> PublishReport {
        let mut report = PublishReport::new(CRATES_IO, false);
        report.root_package = root.map(String::from);
        for (name, status) in entries {
            let mut record = CrateRecord::pending(*name, "1.0.0");
            record.status = *status;
            record.url = Some(format!("https://crates.io/crates/{name}"));
            report.crates.push(record);
        }
        report
    }

    #[test]
    fn test_release_prefers_root_package() {
        let report = report(
            Some("app"),
            &[
                ("core", PublishStatus::Published),
                ("app", PublishStatus::Published),
                ("cli", PublishStatus::Published),
            ],
        );
        let release = report.release().unwrap();
        assert_eq!(release.name, "crates.io packages (3 packages published)");
        assert_eq!(release.url.as_deref(), Some("https://crates.io/crates/app"));
    }

    #[test]
    fn test_release_falls_back_to_last_published() {
        let report = report(
            Some("app"),
            &[
                ("core", PublishStatus::Published),
                ("util", PublishStatus::Published),
                ("app", PublishStatus::Failed),
            ],
        );
        let release = report.release().unwrap();
        assert_eq!(release.name, "crates.io packages (2 packages published)");
        assert_eq!(release.url.as_deref(), Some("https://crates.io/crates/util"));
    }

    #[test]
    fn test_release_alternate_registry() {
        let mut report = report(None, &[("core", PublishStatus::Published)]);
        report.registry = "internal".to_string();
        report.crates[0].url = None;
        let release = report.release().unwrap();
        assert_eq!(release.name, "internal packages (1 packages published)");
        assert!(release.url.is_none());
        assert!(!serde_json::to_string(&release).unwrap().contains("url"));
    }

    #[test]
    fn test_no_release_without_publishes() {
        let report = report(None, &[("core", PublishStatus::Pending)]);
        assert!(report.release().is_none());
        assert_eq!(report.pending(), vec!["core"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PublishStatus::InFlight).unwrap(),
            "\"in-flight\""
        );
    }
}
