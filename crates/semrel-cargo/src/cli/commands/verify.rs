//! Verify command

use clap::Args;
use console::style;
use tracing::info;

use semrel_core::{resolve_token, verify_conditions};
use semrel_registry::CredentialProvider;

use crate::cli::output;
use crate::cli::{build_registry, Cli, OutputFormat, OverrideArgs};

/// Check that the workspace can be released
#[derive(Debug, Args)]
pub struct VerifyCommand {
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl VerifyCommand {
    /// Execute the verify command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing verify command");
        let root = cli.workspace_root()?;
        let config = cli.load_config(&root, &self.overrides)?;

        let provider = CredentialProvider::from_env();
        let token = resolve_token(&config, &provider)?;
        let registry = build_registry(&config, token.clone(), &provider, &root)?;
        let report = verify_conditions(&root, &config, token.as_deref(), &registry).await?;

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    println!("{}", output::header("Publish plan"));
                    for (i, entry) in report.crates.iter().enumerate() {
                        let note = match (entry.publishable, entry.already_published) {
                            (false, _) => style("skipped").dim().to_string(),
                            (true, Some(true)) => style("already published").yellow().to_string(),
                            _ => String::new(),
                        };
                        println!(
                            "  {:>2}. {} {} {}",
                            i + 1,
                            entry.name,
                            output::version_style().apply_to(&entry.version),
                            note
                        );
                    }
                    println!();
                    if report.network_checks_skipped {
                        output::warning("dry run: registry checks skipped");
                    }
                    output::success(&format!("Ready to release to {}", report.registry));
                }
            }
        }
        Ok(())
    }
}
