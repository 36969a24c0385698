//! Error types for command validation, execution and dispatch.
//!
//! Each enum covers one boundary: matching a command against the vocabulary,
//! running a handler, handing a command to the dispatch loop, and attaching a
//! command set. The dispatcher turns all of them into `fail` replies; none of
//! them tears down a session.

use std::io;

use thiserror::Error;

use crate::hub::HubError;
use crate::workers::WorkerError;

/// The command text names a known verb but its arguments do not fit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// An argument the verb does not accept.
    #[error("unexpected argument '{name}' for '{verb}'")]
    Unexpected {
        /// Matched verb.
        verb: String,
        /// Offending keyword.
        name: String,
    },
    /// A required argument is absent.
    #[error("missing required argument '{name}' for '{verb}'")]
    Missing {
        /// Matched verb.
        verb: String,
        /// Missing keyword.
        name: String,
    },
    /// The same argument was given twice.
    #[error("argument '{name}' given more than once for '{verb}'")]
    Duplicate {
        /// Matched verb.
        verb: String,
        /// Repeated keyword.
        name: String,
    },
    /// The verb table lock was poisoned.
    #[error("verb table lock poisoned")]
    LockPoisoned,
}

/// Failure reported by a command handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Free-form failure text.
    #[error("{0}")]
    Message(String),
    /// An argument value could not be used.
    #[error("invalid value for '{name}': {reason}")]
    InvalidArgument {
        /// Argument keyword.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A hub link operation failed.
    #[error(transparent)]
    Hub(#[from] HubError),
    /// A worker operation failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// A self-command could not be dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl HandlerError {
    /// Builds a free-form handler failure.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

/// A command could not be handed to the dispatch loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The actor is stopping and accepts no new commands.
    #[error("actor is shutting down")]
    ShuttingDown,
    /// The dispatch queue is gone.
    #[error("dispatch queue closed")]
    QueueClosed,
    /// The dispatch thread panicked.
    #[error("dispatch thread panicked")]
    ThreadPanic,
    /// The dispatch thread could not be spawned.
    #[error("failed to spawn dispatch thread: {source}")]
    Spawn {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// A command set's vocabulary could not be attached.
#[derive(Debug, Error)]
pub enum CommandSetError {
    /// A vocabulary entry has no verb.
    #[error("command set '{set}' has an entry without a verb")]
    EmptyVerb {
        /// Command set name.
        set: String,
    },
    /// A vocabulary entry's argument spec is malformed.
    #[error("command set '{set}' has a bad argument spec for '{verb}': {source}")]
    Spec {
        /// Command set name.
        set: String,
        /// Verb of the offending entry.
        verb: String,
        /// Parse error.
        #[source]
        source: ArgumentSpecError,
    },
    /// The verb table lock was poisoned.
    #[error("verb table lock poisoned")]
    LockPoisoned,
}

/// Errors parsing an argument spec such as `<exptime> [<filter>]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentSpecError {
    /// A token is not `<name>`, `[<name>]` or `[name]`.
    #[error("malformed argument token '{token}'")]
    Malformed {
        /// Offending token.
        token: String,
    },
    /// The same keyword appears twice.
    #[error("argument '{name}' declared more than once")]
    Duplicate {
        /// Repeated keyword.
        name: String,
    },
}
