//! `cargo publish` runner
//!
//! Publishing goes through cargo itself so packaging, verification and the
//! upload protocol stay exactly what the toolchain does. Failures are mapped
//! onto [`RegistryError`] by inspecting cargo's stderr.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

use crate::credentials::token_env_var;
use crate::error::{RegistryError, Result};
use crate::types::PublishRequest;

/// Runs `cargo publish` for single crates
#[derive(Debug, Clone)]
pub struct CargoPublisher {
    /// Cargo executable
    program: PathBuf,
    /// Alternate registry name, `None` for crates.io
    registry: Option<String>,
    /// Token handed to cargo through its environment variable
    token: Option<String>,
    /// Upper bound for one `cargo publish` invocation
    timeout: Option<Duration>,
}

impl CargoPublisher {
    /// Create a publisher using `$CARGO` or `cargo` from `PATH`
    pub fn new() -> Self {
        let program = std::env::var_os("CARGO")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cargo"));
        Self {
            program,
            registry: None,
            token: None,
            timeout: None,
        }
    }

    /// Use a specific cargo executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Publish to an alternate registry
    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    /// Token to authenticate with
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Bound a single invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cargo executable in use
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Arguments passed to cargo for a request
    pub fn publish_args(&self, request: &PublishRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "publish".into(),
            "--manifest-path".into(),
            request.manifest_path.clone().into_os_string(),
        ];

        if request.allow_dirty {
            args.push("--allow-dirty".into());
        }

        if request.no_verify {
            args.push("--no-verify".into());
        }

        if !request.features.is_empty() {
            args.push("--features".into());
            args.push(request.features.join(",").into());
        }

        if let Some(registry) = &self.registry {
            args.push("--registry".into());
            args.push(registry.into());
        }

        args
    }

    /// Run `cargo publish` for one crate
    pub async fn publish(&self, request: &PublishRequest) -> Result<()> {
        info!(
            crate_name = %request.name,
            version = %request.version,
            registry = self.registry.as_deref().unwrap_or("crates-io"),
            "running cargo publish"
        );

        let args = self.publish_args(request);
        trace!(program = %self.program.display(), args = ?args, "spawning cargo");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(token) = &self.token {
            cmd.env(token_env_var(self.registry.as_deref()), token);
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    RegistryError::Timeout(format!(
                        "cargo publish for {} exceeded {}s",
                        request.name,
                        limit.as_secs()
                    ))
                })??,
            None => cmd.output().await?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!(stdout = %String::from_utf8_lossy(&output.stdout), "cargo publish stdout");

        if output.status.success() {
            debug!(crate_name = %request.name, stderr = %stderr, "cargo publish succeeded");
            return Ok(());
        }

        warn!(
            crate_name = %request.name,
            status = %output.status,
            stderr = %stderr,
            "cargo publish failed"
        );
        Err(classify_publish_failure(
            &request.name,
            &request.version,
            &stderr,
        ))
    }
}

impl Default for CargoPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Map cargo's stderr from a failed publish onto a registry error
///
/// The HTTP status cargo reports from the registry (`status 429 ...`) takes
/// precedence over keyword matching.
pub fn classify_publish_failure(name: &str, version: &str, stderr: &str) -> RegistryError {
    let lower = stderr.to_lowercase();
    let message = summarize(stderr);

    if lower.contains("already exists")
        || lower.contains("already uploaded")
        || lower.contains("is already published")
    {
        return RegistryError::AlreadyPublished {
            name: name.to_string(),
            version: version.to_string(),
        };
    }

    if let Some(status) = reported_status(stderr) {
        return match status {
            429 => RegistryError::RateLimited { retry_after: None },
            401 | 403 => RegistryError::AuthenticationFailed(message),
            _ => RegistryError::ApiError { status, message },
        };
    }

    if lower.contains("rate limit") || lower.contains("too many requests") {
        return RegistryError::RateLimited { retry_after: None };
    }

    if lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("no token found")
    {
        return RegistryError::AuthenticationFailed(message);
    }

    if lower.contains("failed to parse manifest")
        || lower.contains("failed to verify package tarball")
        || lower.contains("failed to prepare local package")
        || lower.contains("must have a version")
        || lower.contains("invalid manifest")
    {
        return RegistryError::InvalidManifest {
            name: name.to_string(),
            reason: message,
        };
    }

    if lower.contains("spurious network error")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("could not resolve host")
        || lower.contains("network")
    {
        return RegistryError::Network(message);
    }

    RegistryError::CommandFailed(message)
}

fn reported_status(stderr: &str) -> Option<u16> {
    let re = Regex::new(r"status (\d{3})").ok()?;
    re.captures(stderr)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Keep the `error:` line and its causes, drop cargo's progress chatter
fn summarize(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .skip_while(|l| !l.starts_with("error"))
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        stderr.trim().to_string()
    } else {
        lines.join(" ")
    }
}
