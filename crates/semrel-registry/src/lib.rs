//! Cargo registry access for semrel-cargo
//!
//! This crate is the seam between the release workflows and a Cargo
//! package registry.
//!
//! ## Components
//!
//! - [`Registry`]: async trait the workflows publish and query through
//! - [`CratesIoRegistry`]: sparse-index lookups plus `cargo publish`, for
//!   crates.io and alternate registries
//! - [`CargoPublisher`]: runs `cargo publish` and classifies its failures
//! - [`CredentialProvider`]: reads an already configured registry token and
//!   resolves alternate registry indexes from cargo config
//!
//! ## Usage
//!
//! ```ignore
//! use semrel_registry::{CratesIoConfig, CratesIoRegistry, PublishRequest, Registry};
//!
//! let registry = CratesIoRegistry::new(CratesIoConfig::default())?;
//! registry
//!     .publish(&PublishRequest::new("my-crate", "1.2.0", "crates/my-crate/Cargo.toml"))
//!     .await?;
//! ```

pub mod cargo;
pub mod crates_io;
pub mod credentials;
pub mod error;
pub mod traits;
pub mod types;

pub use cargo::{classify_publish_failure, CargoPublisher};
pub use crates_io::{index_path, CratesIoConfig, CratesIoRegistry};
pub use credentials::{index_env_var, token_env_var, CredentialProvider};
pub use error::{RegistryError, Result};
pub use traits::Registry;
pub use types::{PublishRequest, CRATES_IO};
