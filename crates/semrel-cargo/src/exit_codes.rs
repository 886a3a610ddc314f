//! Exit codes for the CLI

use semrel_core::{PublishError, SemrelError};

/// Success
pub const SUCCESS: u8 = 0;

/// General error
pub const ERROR: u8 = 1;

/// Configuration error
pub const CONFIG_ERROR: u8 = 2;

/// Workspace or manifest error
pub const WORKSPACE_ERROR: u8 = 3;

/// Version error
pub const VERSION_ERROR: u8 = 4;

/// verifyConditions failed
pub const VERIFICATION_ERROR: u8 = 5;

/// Publishing failed
pub const PUBLISH_ERROR: u8 = 6;

/// User cancelled
pub const CANCELLED: u8 = 130;

/// Exit code for an error returned by a command
pub fn for_error(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<SemrelError>() else {
        return ERROR;
    };

    match err {
        SemrelError::Config(_) => CONFIG_ERROR,
        SemrelError::Manifest(_) | SemrelError::Workspace(_) | SemrelError::Cycle(_) => {
            WORKSPACE_ERROR
        }
        SemrelError::Version(_) => VERSION_ERROR,
        SemrelError::Verification(_) => VERIFICATION_ERROR,
        SemrelError::Publish(PublishError::Cancelled { .. }) => CANCELLED,
        SemrelError::Publish(_) => PUBLISH_ERROR,
        SemrelError::Io(_) | SemrelError::Other(_) => ERROR,
    }
}
