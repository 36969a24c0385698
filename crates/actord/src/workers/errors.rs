//! Error types for worker lifecycle management.

use std::io;

use thiserror::Error;

/// Errors surfaced by the worker manager.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The role is not part of the registered worker set.
    #[error("unknown worker role '{role}'")]
    UnknownRole {
        /// Requested role id.
        role: String,
    },
    /// A fresh start was requested for a role whose thread is running.
    #[error("worker '{role}' is already running")]
    AlreadyStarted {
        /// Role id.
        role: String,
    },
    /// The role exists but its thread has not been started.
    #[error("worker '{role}' has not been started")]
    NotStarted {
        /// Role id.
        role: String,
    },
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker '{name}': {source}")]
    Spawn {
        /// Display name of the thread.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Worker table lock was poisoned by a panicking thread.
    #[error("worker table lock poisoned")]
    LockPoisoned,
}
