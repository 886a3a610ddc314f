//! Publish command

use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use semrel_core::types::SkipReason;
use semrel_core::{
    publish_with_observer, resolve_token, CancelSignal, CrateRecord, PublishObserver,
    PublishReport, SemrelError,
};
use semrel_registry::{CredentialProvider, Registry};

use crate::cli::output;
use crate::cli::{build_registry, Cli, OutputFormat, OverrideArgs};

/// Publish members in dependency order
#[derive(Debug, Args)]
pub struct PublishCommand {
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Spinner fed by publish events
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PublishObserver for ProgressObserver {
    fn on_start(&self, name: &str, version: &str, attempt: u32) {
        if attempt > 1 {
            self.bar
                .set_message(format!("publishing {name}@{version} (attempt {attempt})"));
        } else {
            self.bar.set_message(format!("publishing {name}@{version}"));
        }
    }

    fn on_published(&self, record: &CrateRecord) {
        let suffix = if record.simulated { " (dry run)" } else { "" };
        self.bar.println(format!(
            "{} {}@{}{}",
            console::style("✓").green().bold(),
            record.name,
            record.version,
            suffix
        ));
    }

    fn on_failed(&self, record: &CrateRecord) {
        self.bar.println(format!(
            "{} {}@{}: {}",
            console::style("✗").red().bold(),
            record.name,
            record.version,
            record.last_error.as_deref().unwrap_or("failed")
        ));
    }

    fn on_skip(&self, name: &str, reason: SkipReason) {
        self.bar
            .println(format!("{} {} ({})", console::style("-").dim(), name, reason));
    }

    fn on_blocked(&self, name: &str, dependency: &str) {
        self.bar.println(format!(
            "{} {} (waiting on {})",
            console::style("!").yellow().bold(),
            name,
            dependency
        ));
    }
}

impl PublishCommand {
    /// Execute the publish command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing publish command");
        let root = cli.workspace_root()?;
        let config = cli.load_config(&root, &self.overrides)?;

        let provider = CredentialProvider::from_env();
        let token = resolve_token(&config, &provider)?;
        let registry = build_registry(&config, token, &provider, &root)?;

        let (handle, signal) = CancelSignal::new();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current step");
                handle.cancel();
            }
        });

        let observer = ProgressObserver::new(cli.quiet || cli.format == OutputFormat::Json);
        let result = publish_with_observer(&root, &config, &registry, signal, &observer).await;
        observer.finish();

        match result {
            Ok(report) => {
                self.print_report(cli, &registry, &report)?;
                Ok(())
            }
            Err(SemrelError::Publish(err)) => {
                self.print_report(cli, &registry, err.report())?;
                Err(SemrelError::Publish(err).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn print_report(
        &self,
        cli: &Cli,
        registry: &dyn Registry,
        report: &PublishReport,
    ) -> anyhow::Result<()> {
        let release = report.release();

        match cli.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "release": release,
                    "report": report,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if cli.quiet {
                    return Ok(());
                }
                println!();
                println!("{}", output::header(&format!("Publish report ({})", registry.name())));
                for record in &report.crates {
                    println!(
                        "{}",
                        output::key_value(
                            &record.name,
                            &format!("{} {}", record.version, output::status(record.status))
                        )
                    );
                }
                match release {
                    Some(release) => {
                        output::success(&release.name);
                        if let Some(url) = release.url {
                            println!("{}", output::key_value("url", &url));
                        }
                    }
                    None => output::info("Nothing was published"),
                }
            }
        }
        Ok(())
    }
}
