//! Output formatting utilities

use console::{style, Style};
use semrel_core::{PublishStatus, SemrelError};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Style for version numbers
pub fn version_style() -> Style {
    Style::new().green().bold()
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Styled publish status
pub fn status(status: PublishStatus) -> String {
    let style = match status {
        PublishStatus::Published => Style::new().green(),
        PublishStatus::Failed => Style::new().red().bold(),
        PublishStatus::InFlight => Style::new().yellow(),
        PublishStatus::Pending => Style::new().dim(),
    };
    style.apply_to(status.as_str()).to_string()
}

/// One-line description of an error with its phase and crate
pub fn describe_error(err: &anyhow::Error) -> String {
    let Some(semrel) = err.downcast_ref::<SemrelError>() else {
        return format!("{:#}", err);
    };

    let mut prefix = String::new();
    if let Some(phase) = semrel.phase() {
        prefix.push_str(&format!("[{}] ", phase));
    }
    if let Some(member) = semrel.member() {
        prefix.push_str(&format!("{}: ", member));
    }
    format!("{}{}", prefix, semrel)
}

/// Error payload for `--format json`
pub fn error_json(err: &anyhow::Error) -> serde_json::Value {
    let semrel = err.downcast_ref::<SemrelError>();
    serde_json::json!({
        "error": format!("{:#}", err),
        "phase": semrel.and_then(SemrelError::phase).map(|p| p.as_str()),
        "member": semrel.and_then(SemrelError::member),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use semrel_core::error::VerificationError;

    #[test]
    fn test_describe_error_includes_phase_and_member() {
        let err: anyhow::Error = SemrelError::from(VerificationError::UnpublishableDependency {
            member: "app".to_string(),
            dependency: "helper".to_string(),
            kind: "normal".to_string(),
        })
        .into();

        let text = describe_error(&err);
        assert!(text.starts_with("[verify] app: "));
        assert!(text.contains("helper"));

        let json = error_json(&err);
        assert_eq!(json["phase"], "verify");
        assert_eq!(json["member"], "app");
    }

    #[test]
    fn test_describe_plain_error() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(describe_error(&err), "boom");
        assert!(error_json(&err)["phase"].is_null());
    }
}
