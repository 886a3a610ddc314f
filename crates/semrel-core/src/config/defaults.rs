//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "semrel.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "semrel.yaml";

/// Seconds to wait for a published version to appear in the index
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 300;

/// Publish attempts per crate
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First retry delay
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 2_000;

/// Retry delay cap
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;

/// First index poll interval
pub const DEFAULT_INITIAL_POLL_MS: u64 = 1_000;

/// Index poll interval cap
pub const DEFAULT_MAX_POLL_MS: u64 = 30_000;

/// Get list of config file names to search for, in priority order
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".semrel.toml",
        ".semrel.yaml",
    ]
}
