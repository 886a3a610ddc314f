//! semrel core - release hooks for Cargo workspaces
//!
//! Three entry points back the release pipeline:
//!
//! - [`verify_conditions`] checks that the workspace can be released
//! - [`prepare`] writes the release version into every manifest
//! - [`publish`] uploads members to the registry in dependency order
//!
//! Everything below them (manifest editing, workspace discovery, the
//! dependency graph and configuration) is public for tools that need it.

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, ConfigOverrides};
pub use error::{Phase, PublishError, Result, SemrelError};
pub use manifest::{DependencyKind, DependencyVersionPolicy, Manifest};
pub use types::{
    CrateRecord, PrepareReport, PublishReport, PublishStatus, Release, VerificationReport,
};
pub use workflow::{
    list_packages, prepare, publish, publish_with_observer, resolve_token, verify_conditions,
    CancelHandle, CancelSignal, NoopObserver, PackageEntry, PublishCoordinator, PublishObserver,
};
pub use workspace::{PublishPlan, Workspace};
