//! Error types for the hub link.

use std::io;

use thiserror::Error;

/// Errors surfaced by the hub link.
#[derive(Debug, Error)]
pub enum HubError {
    /// A write was attempted while no link is up.
    #[error("not connected to the hub")]
    NotConnected,
    /// A second link was built while one is active.
    #[error("a hub connection is already active")]
    AlreadyConnected,
    /// The hub endpoint could not be resolved.
    #[error("failed to resolve hub endpoint {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no address.
    #[error("no addresses resolved for hub endpoint {endpoint}")]
    ResolveEmpty {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Connecting to the hub failed.
    #[error("failed to connect to hub at {endpoint}: {source}")]
    Connect {
        /// Configured endpoint.
        endpoint: String,
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// Writing to, or reading from, the established link failed.
    #[error("hub link I/O failed: {source}")]
    Io {
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// The link thread could not be spawned.
    #[error("failed to spawn hub link thread: {source}")]
    Spawn {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Link state lock was poisoned by a panicking thread.
    #[error("hub link lock poisoned")]
    LockPoisoned,
    /// The link thread panicked.
    #[error("hub link thread panicked")]
    ThreadPanic,
}
