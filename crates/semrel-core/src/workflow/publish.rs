//! publish: upload members in dependency order

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use semrel_registry::{PublishRequest, Registry, RegistryError};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{PublishError, Result};
use crate::types::{CrateRecord, PublishReport, PublishStatus, SkipReason, SkippedCrate};
use crate::workspace::{PublishPlan, Workspace};

use super::cancel::CancelSignal;

/// Progress events of a publish run
pub trait PublishObserver: Send + Sync {
    /// An upload attempt is starting
    fn on_start(&self, _name: &str, _version: &str, _attempt: u32) {}

    /// Uploaded and visible, or found already present
    fn on_published(&self, _record: &CrateRecord) {}

    /// Given up on a crate
    fn on_failed(&self, _record: &CrateRecord) {}

    /// Member left out of the run
    fn on_skip(&self, _name: &str, _reason: SkipReason) {}

    /// Member held back because a dependency failed
    fn on_blocked(&self, _name: &str, _dependency: &str) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl PublishObserver for NoopObserver {}

/// Why a single crate did not make it
enum CrateFailure {
    Rejected(String),
    Exhausted { attempts: u32, cause: String },
    NotVisible,
    Cancelled,
}

struct Cancelled;

impl From<Cancelled> for CrateFailure {
    fn from(_: Cancelled) -> Self {
        CrateFailure::Cancelled
    }
}

/// Drives a publish plan against a registry
pub struct PublishCoordinator<'a> {
    config: &'a Config,
    registry: &'a dyn Registry,
    cancel: CancelSignal,
    observer: &'a dyn PublishObserver,
}

impl<'a> PublishCoordinator<'a> {
    /// Create a coordinator
    pub fn new(config: &'a Config, registry: &'a dyn Registry) -> Self {
        Self {
            config,
            registry,
            cancel: CancelSignal::never(),
            observer: &NoopObserver,
        }
    }

    /// Stop between steps once the signal fires
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress to an observer
    pub fn with_observer(mut self, observer: &'a dyn PublishObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Publish the plan members of `workspace`
    ///
    /// Without best-effort the run stops at the first failure and later
    /// members stay pending. With best-effort, members whose dependencies
    /// all made it are still published.
    pub async fn run(
        &self,
        workspace: &Workspace,
        plan: &PublishPlan,
    ) -> std::result::Result<PublishReport, PublishError> {
        let registry_name = self.registry.name();
        let mut report = PublishReport::new(registry_name, self.config.dry_run);

        for name in plan.iter() {
            let reason = if self.config.is_excluded(name) {
                Some(SkipReason::Excluded)
            } else if !workspace.is_publishable(name, self.config.registry_name()) {
                Some(SkipReason::NotPublishable)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(name, %reason, "skipping");
                    self.observer.on_skip(name, reason);
                    report.skipped.push(SkippedCrate {
                        name: name.to_string(),
                        reason,
                    });
                }
                None => {
                    let version = workspace
                        .version_of(name)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    report.crates.push(CrateRecord::pending(name, version));
                }
            }
        }
        report.root_package = workspace
            .root_package()
            .filter(|root| report.record(root).is_some())
            .map(String::from);

        info!(
            registry = registry_name,
            crates = report.crates.len(),
            skipped = report.skipped.len(),
            dry_run = self.config.dry_run,
            "publishing"
        );

        let queue: Vec<(String, String)> = report
            .crates
            .iter()
            .map(|c| (c.name.clone(), c.version.clone()))
            .collect();
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for (name, version) in queue {
            if self.cancel.is_cancelled() {
                warn!("publish cancelled");
                return Err(finish_cancelled(report, None));
            }

            if !failed.is_empty() {
                if !self.config.best_effort {
                    break;
                }
                let deps = workspace.graph().transitive_dependencies(&name);
                if let Some(dep) = deps.iter().find(|d| failed.contains(*d)) {
                    info!(name = %name, dependency = %dep, "dependency failed, holding back");
                    self.observer.on_blocked(&name, dep);
                    continue;
                }
            }

            let Some(manifest) = workspace.member(&name) else {
                continue;
            };
            let manifest_path = manifest.path().to_path_buf();

            if self.config.dry_run {
                let url = self.registry.crate_url(&name);
                if let Some(record) = report.record_mut(&name) {
                    record.status = PublishStatus::Published;
                    record.simulated = true;
                    record.url = url;
                    info!(name = %name, version = %version, "dry run, not uploading");
                    self.observer.on_published(record);
                }
                continue;
            }

            let request = PublishRequest::new(&name, &version, manifest_path)
                .with_features(self.config.features_for(&name))
                .allow_dirty(self.config.allow_dirty)
                .no_verify(self.config.no_verify);

            let started = Instant::now();
            let Some(record) = report.record_mut(&name) else {
                continue;
            };
            record.status = PublishStatus::InFlight;
            let outcome = self.publish_crate(&request, record).await;
            record.duration_ms = Some(started.elapsed().as_millis() as u64);

            match outcome {
                Ok(()) => {
                    record.status = PublishStatus::Published;
                    record.url = self.registry.crate_url(&name);
                    info!(name = %name, version = %version, attempts = record.attempts, "published");
                    self.observer.on_published(record);
                }
                Err(CrateFailure::Cancelled) => {
                    warn!(name = %name, "publish cancelled");
                    return Err(finish_cancelled(report, Some(name)));
                }
                Err(failure) => {
                    record.status = PublishStatus::Failed;
                    if matches!(failure, CrateFailure::NotVisible) {
                        record.last_error = Some("not visible in the index".to_string());
                    }
                    self.observer.on_failed(record);

                    // An unconfirmed upload is never worked around
                    if self.config.best_effort && !matches!(failure, CrateFailure::NotVisible) {
                        warn!(name = %name, "publish failed, continuing with unaffected crates");
                        failed.insert(name);
                        continue;
                    }

                    report.finished_at = Some(chrono::Utc::now());
                    let report = Box::new(report);
                    return Err(match failure {
                        CrateFailure::Rejected(cause) => PublishError::Rejected {
                            member: name,
                            cause,
                            report,
                        },
                        CrateFailure::Exhausted { attempts, cause } => PublishError::RetriesExhausted {
                            member: name,
                            attempts,
                            cause,
                            report,
                        },
                        CrateFailure::NotVisible => PublishError::PropagationTimeout {
                            member: name,
                            version,
                            waited_secs: self.config.publish_timeout_secs,
                            report,
                        },
                        CrateFailure::Cancelled => PublishError::Cancelled {
                            member: Some(name),
                            report,
                        },
                    });
                }
            }
        }

        report.finished_at = Some(chrono::Utc::now());
        if !failed.is_empty() {
            return Err(PublishError::Incomplete {
                failed: failed.into_iter().collect(),
                report: Box::new(report),
            });
        }

        info!(published = report.published().len(), "publish complete");
        Ok(report)
    }

    /// Upload one crate and wait for it to show up
    async fn publish_crate(
        &self,
        request: &PublishRequest,
        record: &mut CrateRecord,
    ) -> std::result::Result<(), CrateFailure> {
        let (name, version) = (request.name.as_str(), request.version.as_str());

        match self.cancellable(self.registry.version_exists(name, version)).await? {
            Ok(true) => {
                info!(name, version, "already in the registry, skipping upload");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => debug!(name, error = %e, "lookup failed, uploading anyway"),
        }

        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            record.attempts = attempt;
            self.observer.on_start(name, version, attempt);
            debug!(name, version, attempt, "uploading");

            match self.cancellable(self.registry.publish(request)).await? {
                Ok(()) => break,
                Err(RegistryError::AlreadyPublished { .. }) if attempt > 1 => {
                    info!(name, version, "an earlier attempt went through");
                    break;
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let mut delay = self.config.retry.delay_for(attempt);
                    if let Some(secs) = e.retry_after() {
                        delay = delay.max(Duration::from_secs(secs));
                    }
                    warn!(name, attempt, delay_ms = delay.as_millis() as u64, error = %e, "transient failure, retrying");
                    record.last_error = Some(e.to_string());
                    self.cancellable(tokio::time::sleep(delay)).await?;
                }
                Err(e) => {
                    record.last_error = Some(e.to_string());
                    return Err(if e.is_transient() {
                        CrateFailure::Exhausted {
                            attempts: attempt,
                            cause: e.to_string(),
                        }
                    } else {
                        CrateFailure::Rejected(e.to_string())
                    });
                }
            }
        }

        self.wait_until_visible(name, version).await
    }

    /// Poll the registry until the version is visible or the timeout passes
    async fn wait_until_visible(&self, name: &str, version: &str) -> std::result::Result<(), CrateFailure> {
        let deadline = tokio::time::Instant::now() + self.config.publish_timeout();
        let mut poll = 0;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                warn!(name, version, "not visible before timeout");
                return Err(CrateFailure::NotVisible);
            }
            let interval = self.config.poll.interval_for(poll).min(remaining);
            self.cancellable(tokio::time::sleep(interval)).await?;

            let lookup = tokio::time::timeout_at(deadline, self.registry.version_exists(name, version));
            match self.cancellable(lookup).await? {
                Ok(Ok(true)) => {
                    debug!(name, version, polls = poll + 1, "visible in the index");
                    return Ok(());
                }
                Ok(Ok(false)) => debug!(name, version, "not visible yet"),
                Ok(Err(e)) => debug!(name, error = %e, "lookup failed, polling again"),
                Err(_) => {
                    warn!(name, version, "not visible before timeout");
                    return Err(CrateFailure::NotVisible);
                }
            }
            poll += 1;
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> std::result::Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }
}

fn finish_cancelled(mut report: PublishReport, member: Option<String>) -> PublishError {
    report.finished_at = Some(chrono::Utc::now());
    PublishError::Cancelled {
        member,
        report: Box::new(report),
    }
}

/// Publish every publishable member of the workspace at `root`
pub async fn publish(
    root: &Path,
    config: &Config,
    registry: &dyn Registry,
    cancel: CancelSignal,
) -> Result<PublishReport> {
    publish_with_observer(root, config, registry, cancel, &NoopObserver).await
}

/// [`publish`] with progress events
#[instrument(skip_all, fields(root = %root.display(), registry = registry.name()))]
pub async fn publish_with_observer(
    root: &Path,
    config: &Config,
    registry: &dyn Registry,
    cancel: CancelSignal,
    observer: &dyn PublishObserver,
) -> Result<PublishReport> {
    let workspace = Workspace::discover(root)?;
    let plan = workspace.publish_plan()?;

    let report = PublishCoordinator::new(config, registry)
        .with_cancel(cancel)
        .with_observer(observer)
        .run(&workspace, &plan)
        .await?;
    Ok(report)
}
