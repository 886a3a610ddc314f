//! Shell completions generation command

use std::io;

use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use tracing::info;

use crate::cli::Cli;

/// Generate shell completions
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<std::path::PathBuf>,
}

impl CompletionsCommand {
    /// Execute the completions command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(shell = ?self.shell, "executing completions command");
        let mut cmd = Cli::command();

        if let Some(ref output_path) = self.output {
            let mut file = std::fs::File::create(output_path)?;
            generate(self.shell, &mut cmd, "semrel-cargo", &mut file);

            if !cli.quiet {
                println!("Completions written to {}", output_path.display());
            }
        } else {
            generate(self.shell, &mut cmd, "semrel-cargo", &mut io::stdout());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_completions_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("semrel-cargo.bash");
        let cli = Cli::parse_from([
            "semrel-cargo",
            "--quiet",
            "completions",
            "bash",
            "--output",
            path.to_str().unwrap(),
        ]);
        cli.execute().unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("semrel-cargo"));
    }
}
