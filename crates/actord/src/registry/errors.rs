//! Error types for registry operations.

use std::io;

use thiserror::Error;

use crate::session::DecodeError;

/// Errors surfaced by the connection registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No live session has the given id.
    #[error("connection {connection_id} is not registered")]
    NotRegistered {
        /// Requested connection id.
        connection_id: u32,
    },
    /// Writing to, or closing, a session transport failed.
    #[error("failed to write to connection {connection_id}: {source}")]
    Write {
        /// Connection the write was for.
        connection_id: u32,
        /// Transport error.
        #[source]
        source: io::Error,
    },
    /// An inbound line could not be decoded into a command.
    #[error("connection {connection_id}: {source}")]
    Decode {
        /// Connection the line arrived on.
        connection_id: u32,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },
    /// The session table lock was poisoned by a panicking thread.
    #[error("session table lock poisoned")]
    LockPoisoned,
}
