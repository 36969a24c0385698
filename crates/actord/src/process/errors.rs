//! Defines the error surface for actor launch and supervision.

use thiserror::Error;

use crate::bootstrap::BootstrapError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the actor process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before the actor was ready.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Waiting for, or carrying out, shutdown failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}
