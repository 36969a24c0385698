//! Runtime for line-protocol actors.
//!
//! An actor accepts newline-delimited commands from any number of inbound TCP
//! sessions and from one outbound link to the hub, runs them against its
//! vocabulary and streams correlated replies back:
//!
//! ```text
//! <commander> <mid> <command text>            inbound
//! <connection id> <mid> <flag> <keywords>     outbound, flag one of i d w e f F
//! ```
//!
//! Each command gets any number of progress replies and one terminal `F`
//! (finished) or `f` (failed). New sessions are greeted with
//! `<id> 0 i yourUserNum=<id>`.
//!
//! [`bootstrap_with`] assembles the pieces: the [`ConnectionRegistry`] owns
//! sessions and routes replies, the [`DispatchCore`] validates and executes
//! commands (inline or on a dispatch thread), the hub client keeps the
//! commander link alive with exponential backoff, and the
//! [`WorkerManager`] runs named worker threads that can be restarted in
//! place.

mod bootstrap;
mod command;
pub mod dispatch;
mod health;
pub mod hub;
mod process;
mod registry;
mod session;
mod telemetry;
mod transport;
pub mod workers;

pub use bootstrap::{
    Actor, ActorComponents, BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use command::{Command, ReplySink};
pub use dispatch::{
    ActorContext, Arguments, CommandSet, DispatchCore, HandlerError, VerbTable, VocabEntry,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_actor, run_actor_with,
};
pub use registry::{ConnectionRegistry, RegistryError};
pub use session::{DecodeError, SessionTransport};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ListenerError, ListenerHandle};
pub use workers::{Msg, MsgKind, Priority, StartOptions, WorkerContext, WorkerManager, WorkerRole};

#[cfg(test)]
mod tests;
