//! Configuration types

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use semrel_registry::CRATES_IO;

use crate::manifest::DependencyVersionPolicy;

use super::defaults::{
    DEFAULT_INITIAL_POLL_MS, DEFAULT_INITIAL_RETRY_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_POLL_MS, DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_PUBLISH_TIMEOUT_SECS,
};

/// Main configuration for semrel
///
/// Keys are snake_case; the camelCase names used by release pipeline
/// configs (`dryRun`, `excludeCrates`, ..) are accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry token; wins over the environment and cargo's credentials
    #[serde(alias = "registryToken", skip_serializing)]
    pub registry_token: Option<String>,

    /// Alternate registry name as configured in `.cargo/config.toml`
    pub registry: Option<String>,

    /// Sparse index of the registry
    #[serde(alias = "indexUrl")]
    pub index_url: Option<String>,

    /// Simulate publishing without touching the registry
    #[serde(alias = "dryRun")]
    pub dry_run: bool,

    /// Upper bound for waiting on a published version to become visible
    #[serde(alias = "publishTimeout", alias = "publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Members never published
    #[serde(alias = "excludeCrates")]
    pub exclude_crates: Vec<String>,

    /// How sibling requirements are rewritten
    #[serde(alias = "dependencyVersionPolicy")]
    pub dependency_version_policy: DependencyVersionPolicy,

    /// Keep publishing members unaffected by a failure
    #[serde(alias = "bestEffort")]
    pub best_effort: bool,

    /// Pass `--allow-dirty` to cargo publish
    #[serde(alias = "allowDirty")]
    pub allow_dirty: bool,

    /// Pass `--no-verify` to cargo publish
    #[serde(alias = "noVerify")]
    pub no_verify: bool,

    /// Features to enable per crate when publishing
    pub features: BTreeMap<String, Vec<String>>,

    /// Rewrite workspace entries in Cargo.lock during prepare
    #[serde(alias = "updateLockfile")]
    pub update_lockfile: bool,

    /// Retry policy for transient publish failures
    pub retry: RetryConfig,

    /// Propagation polling
    pub poll: PollConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_token: None,
            registry: None,
            index_url: None,
            dry_run: false,
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            exclude_crates: Vec::new(),
            dependency_version_policy: DependencyVersionPolicy::default(),
            best_effort: false,
            allow_dirty: true,
            no_verify: false,
            features: BTreeMap::new(),
            update_lockfile: true,
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl Config {
    /// Registry name used in `publish = [..]` checks and reports
    pub fn registry_name(&self) -> &str {
        self.registry.as_deref().unwrap_or(CRATES_IO)
    }

    /// Propagation wait bound
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Check if a member is listed in `exclude_crates`
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_crates.iter().any(|c| c == name)
    }

    /// Features to enable when publishing a crate
    pub fn features_for(&self, name: &str) -> Vec<String> {
        self.features.get(name).cloned().unwrap_or_default()
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(dry_run) = overrides.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(registry) = overrides.registry {
            self.registry = Some(registry);
        }
        for name in overrides.exclude {
            if !self.is_excluded(&name) {
                self.exclude_crates.push(name);
            }
        }
        if let Some(policy) = overrides.policy {
            self.dependency_version_policy = policy;
        }
        if let Some(best_effort) = overrides.best_effort {
            self.best_effort = best_effort;
        }
    }
}

/// Values from the command line that win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--dry-run`
    pub dry_run: Option<bool>,
    /// `--registry`
    pub registry: Option<String>,
    /// `--exclude`, added to `exclude_crates`
    pub exclude: Vec<String>,
    /// `--policy`
    pub policy: Option<DependencyVersionPolicy>,
    /// `--best-effort`
    pub best_effort: Option<bool>,
}

/// Retry policy for transient publish failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per crate, first attempt included
    #[serde(alias = "maxAttempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(alias = "initialDelayMs")]
    pub initial_delay_ms: u64,

    /// Cap for the doubling delay
    #[serde(alias = "maxDelayMs")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_RETRY_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(backoff(
            self.initial_delay_ms,
            self.max_delay_ms,
            attempt.saturating_sub(1),
        ))
    }
}

/// Propagation polling intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// First wait between publish and the first lookup
    #[serde(alias = "initialIntervalMs")]
    pub initial_interval_ms: u64,

    /// Cap for the doubling interval
    #[serde(alias = "maxIntervalMs")]
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_INITIAL_POLL_MS,
            max_interval_ms: DEFAULT_MAX_POLL_MS,
        }
    }
}

impl PollConfig {
    /// Interval before the given lookup (0-based)
    pub fn interval_for(&self, poll: u32) -> Duration {
        Duration::from_millis(backoff(self.initial_interval_ms, self.max_interval_ms, poll))
    }
}

fn backoff(initial: u64, max: u64, exponent: u32) -> u64 {
    initial
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(max)
}
