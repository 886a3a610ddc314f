//! Registry token and index lookup
//!
//! Reads a token that has already been configured for Cargo. Nothing here
//! logs in or prompts; the token either exists in the environment or in
//! Cargo's credentials file, or it does not. Alternate registry indexes are
//! resolved the way cargo does: `CARGO_REGISTRIES_<NAME>_INDEX`, then
//! `[registries.<name>] index` in `.cargo/config.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{RegistryError, Result};

/// Environment variable Cargo reads the token from for a registry
///
/// `None` means the default registry (`CARGO_REGISTRY_TOKEN`); alternate
/// registries use `CARGO_REGISTRIES_<NAME>_TOKEN` with the name uppercased
/// and dashes replaced by underscores.
pub fn token_env_var(registry: Option<&str>) -> String {
    match registry {
        None => "CARGO_REGISTRY_TOKEN".to_string(),
        Some(name) => format!("CARGO_REGISTRIES_{}_TOKEN", env_name(name)),
    }
}

/// Environment variable Cargo reads an alternate registry's index from
pub fn index_env_var(registry: &str) -> String {
    format!("CARGO_REGISTRIES_{}_INDEX", env_name(registry))
}

fn env_name(registry: &str) -> String {
    registry.to_uppercase().replace(['-', '.'], "_")
}

/// Token provider backed by an environment snapshot and Cargo's credentials file
#[derive(Debug, Clone, Default)]
pub struct CredentialProvider {
    /// Environment variables visible to the lookup
    vars: HashMap<String, String>,
    /// Directory holding `credentials.toml`
    cargo_home: Option<PathBuf>,
}

impl CredentialProvider {
    /// Snapshot the process environment and locate `CARGO_HOME`
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let cargo_home = vars
            .get("CARGO_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".cargo")));
        Self { vars, cargo_home }
    }

    /// Build a provider from explicit variables, without a credentials file
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            cargo_home: None,
        }
    }

    /// Set the directory searched for `credentials.toml`
    pub fn with_cargo_home(mut self, cargo_home: impl Into<PathBuf>) -> Self {
        self.cargo_home = Some(cargo_home.into());
        self
    }

    /// Look up the token for a registry (`None` = crates.io)
    ///
    /// Empty values count as missing.
    #[instrument(skip(self))]
    pub fn token(&self, registry: Option<&str>) -> Result<Option<String>> {
        let var = token_env_var(registry);
        if let Some(token) = self.vars.get(&var).filter(|t| !t.trim().is_empty()) {
            debug!(variable = %var, source = "environment", "token found");
            return Ok(Some(token.clone()));
        }

        if let Some(token) = self.read_credentials_file(registry)? {
            debug!(source = "credentials_file", "token found");
            return Ok(Some(token));
        }

        debug!("no token found");
        Ok(None)
    }

    /// Check if a token is available for a registry
    pub fn has_token(&self, registry: Option<&str>) -> bool {
        self.token(registry).ok().flatten().is_some()
    }

    /// Sparse index URL of an alternate registry
    ///
    /// Cargo config files are read from `start_dir` upwards, then from
    /// `CARGO_HOME`; the closest definition wins. Git indexes cannot be
    /// queried over HTTP and are rejected.
    #[instrument(skip(self))]
    pub fn registry_index(&self, registry: &str, start_dir: &Path) -> Result<Option<String>> {
        let var = index_env_var(registry);
        let index = match self.vars.get(&var).filter(|v| !v.trim().is_empty()) {
            Some(index) => {
                debug!(variable = %var, "registry index from environment");
                Some(index.clone())
            }
            None => self.index_from_config_files(registry, start_dir)?,
        };

        match index {
            Some(index) if !index.starts_with("sparse+") => {
                Err(RegistryError::ConfigurationError(format!(
                    "registry '{}' uses a git index ({}); only sparse indexes are supported",
                    registry, index
                )))
            }
            other => Ok(other),
        }
    }

    fn index_from_config_files(&self, registry: &str, start_dir: &Path) -> Result<Option<String>> {
        let project_dirs = start_dir.ancestors().map(|dir| dir.join(".cargo"));
        let dirs: Vec<PathBuf> = project_dirs.chain(self.cargo_home.clone()).collect();

        for dir in dirs {
            // Cargo accepts both names, preferring the .toml one
            let Some(path) = ["config.toml", "config"]
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file())
            else {
                continue;
            };

            if let Some(index) = parse_registry_index(&path, registry)? {
                debug!(path = %path.display(), "registry index from cargo config");
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn read_credentials_file(&self, registry: Option<&str>) -> Result<Option<String>> {
        let Some(cargo_home) = &self.cargo_home else {
            return Ok(None);
        };

        // Cargo accepts both names, preferring the .toml one
        let path = ["credentials.toml", "credentials"]
            .iter()
            .map(|name| cargo_home.join(name))
            .find(|p| p.exists());

        match path {
            Some(path) => parse_credentials(&path, registry),
            None => Ok(None),
        }
    }
}

fn parse_registry_index(path: &Path, registry: &str) -> Result<Option<String>> {
    #[derive(Deserialize)]
    struct CargoConfig {
        #[serde(default)]
        registries: HashMap<String, RegistryEntry>,
    }

    #[derive(Deserialize)]
    struct RegistryEntry {
        index: Option<String>,
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        RegistryError::ConfigurationError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut config: CargoConfig = toml::from_str(&content).map_err(|e| {
        RegistryError::ConfigurationError(format!(
            "Failed to parse {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(config.registries.remove(registry).and_then(|r| r.index))
}

fn parse_credentials(path: &Path, registry: Option<&str>) -> Result<Option<String>> {
    #[derive(Deserialize)]
    struct CargoCredentials {
        registry: Option<RegistryCredentials>,
        #[serde(default)]
        registries: HashMap<String, RegistryCredentials>,
    }

    #[derive(Deserialize)]
    struct RegistryCredentials {
        token: Option<String>,
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        RegistryError::ConfigurationError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut creds: CargoCredentials = toml::from_str(&content).map_err(|e| {
        RegistryError::ConfigurationError(format!(
            "Failed to parse {}: {}",
            path.display(),
            e
        ))
    })?;

    let entry = match registry {
        None => creds.registry,
        Some(name) => creds.registries.remove(name),
    };

    Ok(entry
        .and_then(|e| e.token)
        .filter(|t| !t.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_env_var_names() {
        assert_eq!(token_env_var(None), "CARGO_REGISTRY_TOKEN");
        assert_eq!(
            token_env_var(Some("my-registry")),
            "CARGO_REGISTRIES_MY_REGISTRY_TOKEN"
        );
    }

    #[test]
    fn test_token_from_vars() {
        let provider = CredentialProvider::with_vars([("CARGO_REGISTRY_TOKEN", "secret")]);
        assert_eq!(provider.token(None).unwrap(), Some("secret".to_string()));
        assert!(provider.token(Some("internal")).unwrap().is_none());
    }

    #[test]
    fn test_empty_token_is_missing() {
        let provider = CredentialProvider::with_vars([("CARGO_REGISTRY_TOKEN", "  ")]);
        assert!(!provider.has_token(None));
    }

    #[test]
    fn test_alternate_registry_token() {
        let provider = CredentialProvider::with_vars([(
            "CARGO_REGISTRIES_INTERNAL_TOKEN",
            "alt-secret",
        )]);
        assert_eq!(
            provider.token(Some("internal")).unwrap(),
            Some("alt-secret".to_string())
        );
        assert!(!provider.has_token(None));
    }

    #[test]
    fn test_token_in_credentials_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("credentials.toml"),
            "[registry]\ntoken = \"file-token\"\n\n[registries.internal]\ntoken = \"internal-token\"\n",
        )
        .unwrap();

        let provider =
            CredentialProvider::with_vars(Vec::<(String, String)>::new()).with_cargo_home(temp.path());
        assert_eq!(provider.token(None).unwrap(), Some("file-token".to_string()));
        assert_eq!(
            provider.token(Some("internal")).unwrap(),
            Some("internal-token".to_string())
        );
    }

    #[test]
    fn test_environment_wins_over_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("credentials"),
            "[registry]\ntoken = \"file-token\"\n",
        )
        .unwrap();

        let provider = CredentialProvider::with_vars([("CARGO_REGISTRY_TOKEN", "env-token")])
            .with_cargo_home(temp.path());
        assert_eq!(provider.token(None).unwrap(), Some("env-token".to_string()));
    }

    #[test]
    fn test_registry_index_from_environment() {
        let temp = TempDir::new().unwrap();
        let provider = CredentialProvider::with_vars([(
            "CARGO_REGISTRIES_MY_REGISTRY_INDEX",
            "sparse+https://index.internal.example/",
        )]);
        assert_eq!(index_env_var("my-registry"), "CARGO_REGISTRIES_MY_REGISTRY_INDEX");
        assert_eq!(
            provider.registry_index("my-registry", temp.path()).unwrap().as_deref(),
            Some("sparse+https://index.internal.example/")
        );
    }

    #[test]
    fn test_registry_index_from_cargo_config() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("ws");
        let member = workspace.join("crates").join("core");
        std::fs::create_dir_all(&member).unwrap();
        std::fs::create_dir_all(workspace.join(".cargo")).unwrap();
        std::fs::write(
            workspace.join(".cargo").join("config.toml"),
            "[registries.internal]\nindex = \"sparse+https://index.internal.example/\"\n\n[build]\njobs = 4\n",
        )
        .unwrap();

        let provider = CredentialProvider::with_vars(Vec::<(String, String)>::new());
        assert_eq!(
            provider.registry_index("internal", &member).unwrap().as_deref(),
            Some("sparse+https://index.internal.example/")
        );
        assert!(provider.registry_index("other", &member).unwrap().is_none());
    }

    #[test]
    fn test_registry_index_from_cargo_home() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("config"),
            "[registries.internal]\nindex = \"sparse+https://home.example/\"\n",
        )
        .unwrap();

        let provider = CredentialProvider::with_vars(Vec::<(String, String)>::new())
            .with_cargo_home(home.path());
        assert_eq!(
            provider.registry_index("internal", project.path()).unwrap().as_deref(),
            Some("sparse+https://home.example/")
        );
    }

    #[test]
    fn test_git_index_is_rejected() {
        let temp = TempDir::new().unwrap();
        let provider = CredentialProvider::with_vars([(
            "CARGO_REGISTRIES_INTERNAL_INDEX",
            "https://git.example/index.git",
        )]);
        assert!(matches!(
            provider.registry_index("internal", temp.path()),
            Err(RegistryError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_invalid_credentials_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("credentials.toml"), "[registry\n").unwrap();

        let provider =
            CredentialProvider::with_vars(Vec::<(String, String)>::new()).with_cargo_home(temp.path());
        assert!(matches!(
            provider.token(None),
            Err(RegistryError::ConfigurationError(_))
        ));
    }
}
