//! Registry adapter traits

use crate::error::Result;
use crate::types::PublishRequest;

/// A Cargo package registry
///
/// Implementations answer whether a crate version is resolvable and
/// perform the publish itself. The release workflows only talk to the
/// registry through this trait.
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Registry name as used in `publish = [..]` lists (`crates-io` by default)
    fn name(&self) -> &str;

    /// Check whether `name@version` is visible in the registry index
    async fn version_exists(&self, name: &str, version: &str) -> Result<bool>;

    /// Publish a crate
    async fn publish(&self, request: &PublishRequest) -> Result<()>;

    /// Public page for a crate, if the registry has one
    fn crate_url(&self, _name: &str) -> Option<String> {
        None
    }
}
