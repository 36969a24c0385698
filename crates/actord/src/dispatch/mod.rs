//! Command dispatch: validation, handler execution and the dispatch loop.
//!
//! Every decoded command goes through [`DispatchCore::submit_command`]. In
//! direct mode it runs on the session thread that read it; in queued mode
//! it joins a FIFO drained by one dispatch thread, so commands from all
//! sessions execute one at a time in arrival order.
//!
//! ## Outcomes
//!
//! - empty text: `finish` with no keywords, validator untouched
//! - no verb matches: `fail` with `Unrecognized command: ...`
//! - verb matches but arguments do not: `fail` with `Unmatched command: ...`
//! - a handler errors or panics: `fail` with
//!   `command failed: <reason> (in <set>:<verb>)`, later handlers are skipped
//!
//! Handlers receive an [`ActorContext`] instead of reaching for globals.

mod context;
mod core_cmds;
mod dispatcher;
mod errors;
mod validator;
mod verbs;

pub use self::context::{ActorContext, ActorState};
pub use self::core_cmds::CoreCommands;
pub use self::dispatcher::{DispatchCore, DispatchHandle, DispatchSettings, SELF_CONNECTION_ID};
pub use self::errors::{
    ArgumentSpecError, CommandSetError, DispatchError, HandlerError, MatchError,
};
pub use self::validator::{
    ArgumentSpec, Arguments, CommandHandler, MatchedCommand, MatchedHandler, Validator,
};
pub use self::verbs::{CommandSet, VerbTable, VocabEntry};

#[cfg(test)]
pub(crate) use self::validator::MockValidator;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
