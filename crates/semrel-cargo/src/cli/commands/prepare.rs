//! Prepare command

use clap::Args;
use tracing::info;

use semrel_core::prepare;

use crate::cli::output;
use crate::cli::{Cli, OutputFormat, OverrideArgs};

/// Write the release version into every manifest
#[derive(Debug, Args)]
pub struct PrepareCommand {
    /// Version to release
    #[arg(value_name = "VERSION")]
    pub release_version: String,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl PrepareCommand {
    /// Execute the prepare command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(version = %self.release_version, "executing prepare command");
        let root = cli.workspace_root()?;
        let config = cli.load_config(&root, &self.overrides)?;

        let report = prepare(&root, &self.release_version, &config)?;

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                if cli.quiet {
                    return Ok(());
                }
                if !report.has_changes() {
                    output::info(&format!(
                        "Workspace already at {}",
                        output::version_style().apply_to(&report.version)
                    ));
                    return Ok(());
                }

                for path in &report.changed_files {
                    let shown = path.strip_prefix(&root).unwrap_or(path);
                    println!("  {}", output::path_style().apply_to(shown.display()));
                }
                output::success(&format!(
                    "Set {} members to {}",
                    report.members.len(),
                    output::version_style().apply_to(&report.version)
                ));
            }
        }
        Ok(())
    }
}
