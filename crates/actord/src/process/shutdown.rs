use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use crate::dispatch::DispatchError;
use crate::hub::HubError;
use crate::transport::ListenerError;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported while waiting for, or carrying out, shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept loop did not stop cleanly.
    #[error("listener shutdown failed: {source}")]
    Listener {
        /// Listener error.
        #[source]
        source: ListenerError,
    },
    /// The dispatch thread did not stop cleanly.
    #[error("dispatch shutdown failed: {source}")]
    Dispatch {
        /// Dispatch error.
        #[source]
        source: DispatchError,
    },
    /// The hub link thread did not stop cleanly.
    #[error("hub link shutdown failed: {source}")]
    Hub {
        /// Hub error.
        #[source]
        source: HubError,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal,
                "shutdown signal received"
            );
        }
        Ok(())
    }
}
