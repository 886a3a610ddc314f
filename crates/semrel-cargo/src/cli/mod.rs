//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use semrel_core::config::{load_config, load_config_or_default, validate_config};
use semrel_core::error::ConfigError;
use semrel_core::{Config, ConfigOverrides, DependencyVersionPolicy, SemrelError};
use semrel_registry::{
    index_env_var, CargoPublisher, CratesIoConfig, CratesIoRegistry, CredentialProvider,
};

use commands::{
    CompletionsCommand, ListCommand, PrepareCommand, PublishCommand, VerifyCommand,
};

/// semrel-cargo - release hooks for Cargo workspaces
#[derive(Debug, Parser)]
#[command(name = "semrel-cargo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Workspace root
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Config file; searched upwards from the workspace root by default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the workspace can be released (verifyConditions)
    Verify(VerifyCommand),

    /// Write the release version into every manifest (prepare)
    Prepare(PrepareCommand),

    /// Publish members in dependency order (publish)
    Publish(PublishCommand),

    /// List members in publish order
    List(ListCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Flags that win over the config file
#[derive(Debug, Clone, Default, Args)]
pub struct OverrideArgs {
    /// Simulate publishing without touching the registry
    #[arg(long, env = "SEMREL_DRY_RUN")]
    pub dry_run: bool,

    /// Alternate registry name from `.cargo/config.toml`
    #[arg(long, env = "SEMREL_REGISTRY")]
    pub registry: Option<String>,

    /// Skip a member when publishing (repeatable)
    #[arg(long = "exclude", value_name = "CRATE")]
    pub exclude: Vec<String>,

    /// How sibling requirements are written: range or exact
    #[arg(long)]
    pub policy: Option<DependencyVersionPolicy>,

    /// Keep publishing members unaffected by a failure
    #[arg(long)]
    pub best_effort: bool,
}

impl From<&OverrideArgs> for ConfigOverrides {
    fn from(args: &OverrideArgs) -> Self {
        Self {
            dry_run: args.dry_run.then_some(true),
            registry: args.registry.clone(),
            exclude: args.exclude.clone(),
            policy: args.policy,
            best_effort: args.best_effort.then_some(true),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Verify(ref cmd) => cmd.execute(&self),
            Commands::Prepare(ref cmd) => cmd.execute(&self),
            Commands::Publish(ref cmd) => cmd.execute(&self),
            Commands::List(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }

    /// Workspace root to operate on
    pub fn workspace_root(&self) -> anyhow::Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Load, override and validate the configuration
    pub fn load_config(&self, root: &Path, overrides: &OverrideArgs) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => {
                let (config, path) = load_config_or_default(root)?;
                if let Some(path) = path {
                    debug!(path = %path.display(), "using config file");
                }
                config
            }
        };

        config.apply(overrides.into());
        validate_config(&config)?;
        info!(
            registry = config.registry_name(),
            dry_run = config.dry_run,
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Registry adapter for the configured registry
///
/// An alternate registry without `index_url` takes its index from cargo's
/// own configuration; lookups never fall back to the crates.io index.
pub fn build_registry(
    config: &Config,
    token: Option<String>,
    provider: &CredentialProvider,
    root: &Path,
) -> anyhow::Result<CratesIoRegistry> {
    let defaults = CratesIoConfig::default();
    let index_url = match (&config.index_url, &config.registry) {
        (Some(url), _) => url.clone(),
        (None, None) => defaults.index_url.clone(),
        (None, Some(name)) => provider
            .registry_index(name, root)
            .map_err(|e| invalid_index(e.to_string()))?
            .ok_or_else(|| {
                invalid_index(format!(
                    "no index known for registry '{}'; set index_url, {} or [registries.{}] in .cargo/config.toml",
                    name,
                    index_env_var(name),
                    name
                ))
            })?,
    };
    debug!(index = %index_url, "registry index");

    let registry_config = CratesIoConfig {
        registry: config.registry.clone(),
        index_url,
        web_url: if config.registry.is_none() {
            defaults.web_url
        } else {
            None
        },
        token: token.clone(),
        ..defaults
    };

    let publisher = CargoPublisher::new()
        .with_registry(config.registry.clone())
        .with_token(token);
    Ok(CratesIoRegistry::new(registry_config)?.with_publisher(publisher))
}

fn invalid_index(message: String) -> SemrelError {
    ConfigError::InvalidValue {
        field: "index_url".to_string(),
        message,
    }
    .into()
}
