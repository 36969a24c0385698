//! Worker lifecycle: named roles, one FIFO queue and one thread each.
//!
//! Roles are registered once. Each start or restart hands a role a fresh
//! queue and a new thread; the generation counter feeds the thread display
//! name (`master`, `master-1`, `master-2`, ...).

mod errors;
mod manager;
mod msg;
mod queue;

pub use self::errors::WorkerError;
pub use self::manager::{StartOptions, WorkerContext, WorkerEntry, WorkerManager, WorkerRole};
pub use self::msg::{Msg, MsgKind, Priority};
pub use self::queue::WorkQueue;

const WORKERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::workers");
