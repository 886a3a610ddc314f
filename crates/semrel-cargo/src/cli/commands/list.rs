//! List command

use clap::Args;
use console::style;
use tracing::info;

use semrel_core::list_packages;

use crate::cli::output;
use crate::cli::{Cli, OutputFormat, OverrideArgs};

/// List members in publish order
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show members that will be published
    #[arg(long)]
    pub publishable: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl ListCommand {
    /// Execute the list command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing list command");
        let root = cli.workspace_root()?;
        let config = cli.load_config(&root, &self.overrides)?;

        let entries: Vec<_> = list_packages(&root, &config)?
            .into_iter()
            .filter(|e| !self.publishable || e.publishable)
            .collect();

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            OutputFormat::Text => {
                for entry in &entries {
                    let mut line = format!(
                        "{}({})",
                        entry.name,
                        output::version_style().apply_to(&entry.version)
                    );
                    if !entry.publishable {
                        line.push_str(&format!(" {}", style("not published").dim()));
                    }
                    println!("{}", line);
                }
            }
        }
        Ok(())
    }
}
