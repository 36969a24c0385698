//! Commands and their reply state machine.
//!
//! A [`Command`] is created for every accepted inbound line (and for every
//! command the actor sends itself). Handlers talk back to the sender through
//! it: any number of progress replies followed by exactly one terminal
//! `finish` or `fail`. Replies leave through a [`ReplySink`], so the command
//! never touches a socket itself.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use actorcore_protocol::{BROADCAST_CONNECTION_ID, ReplyFlag, ReplyLine};
use tracing::{info, warn};

pub(crate) const CMDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cmds");

/// Destination for serialised reply lines.
pub trait ReplySink: Send + Sync {
    /// Delivers one reply line. Delivery is best effort.
    fn send_reply(&self, reply: &ReplyLine);
}

/// Handle to one in-flight command.
///
/// Clones share the same reply state, so a worker thread can finish a command
/// on behalf of the dispatch thread.
#[derive(Clone)]
pub struct Command {
    inner: Arc<CommandInner>,
}

struct CommandInner {
    connection_id: u32,
    message_id: u64,
    commander: String,
    raw: String,
    immortal: bool,
    finished: AtomicBool,
    finish_count: AtomicU32,
    matched_form: Mutex<Option<String>>,
    sink: Arc<dyn ReplySink>,
}

impl Command {
    /// Creates a command that expects exactly one terminal reply.
    pub fn new(
        sink: Arc<dyn ReplySink>,
        commander: impl Into<String>,
        connection_id: u32,
        message_id: u64,
        raw: impl Into<String>,
    ) -> Self {
        Self::build(sink, commander.into(), connection_id, message_id, raw.into(), false)
    }

    /// Creates the actor's broadcast command.
    ///
    /// It replies on connection 0, message 0 and never counts as finished.
    pub fn broadcast(sink: Arc<dyn ReplySink>) -> Self {
        Self::build(
            sink,
            format!("self.{BROADCAST_CONNECTION_ID}"),
            BROADCAST_CONNECTION_ID,
            0,
            String::new(),
            true,
        )
    }

    fn build(
        sink: Arc<dyn ReplySink>,
        commander: String,
        connection_id: u32,
        message_id: u64,
        raw: String,
        immortal: bool,
    ) -> Self {
        Self {
            inner: Arc::new(CommandInner {
                connection_id,
                message_id,
                commander,
                raw,
                immortal,
                finished: AtomicBool::new(false),
                finish_count: AtomicU32::new(0),
                matched_form: Mutex::new(None),
                sink,
            }),
        }
    }

    /// Connection the command arrived on.
    #[must_use]
    pub fn connection_id(&self) -> u32 {
        self.inner.connection_id
    }

    /// Message id used to correlate replies.
    #[must_use]
    pub fn message_id(&self) -> u64 {
        self.inner.message_id
    }

    /// Dotted identity of the sender.
    #[must_use]
    pub fn commander(&self) -> &str {
        &self.inner.commander
    }

    /// Command text as received, without header.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.inner.raw
    }

    /// Whether this is the never-finishing broadcast command.
    #[must_use]
    pub fn is_immortal(&self) -> bool {
        self.inner.immortal
    }

    /// Returns `true` until the first terminal reply has been sent.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.inner.finished.load(Ordering::SeqCst)
    }

    /// Number of terminal replies sent so far.
    #[must_use]
    pub fn finish_count(&self) -> u32 {
        self.inner.finish_count.load(Ordering::SeqCst)
    }

    /// Canonical form recorded by the dispatcher once the command matched.
    #[must_use]
    pub fn matched_form(&self) -> Option<String> {
        self.inner
            .matched_form
            .lock()
            .ok()
            .and_then(|form| form.clone())
    }

    pub(crate) fn set_matched_form(&self, form: String) {
        if let Ok(mut slot) = self.inner.matched_form.lock() {
            *slot = Some(form);
        }
    }

    /// Sends an informational progress reply.
    pub fn inform(&self, text: &str) {
        self.emit(ReplyFlag::Inform, text);
    }

    /// Sends a debugging progress reply.
    pub fn diagnostic(&self, text: &str) {
        self.emit(ReplyFlag::Diagnostic, text);
    }

    /// Sends a warning progress reply.
    pub fn warn(&self, text: &str) {
        self.emit(ReplyFlag::Warn, text);
    }

    /// Sends a non-terminal error reply.
    pub fn error(&self, text: &str) {
        self.emit(ReplyFlag::Error, text);
    }

    /// Alias of [`Command::inform`].
    pub fn respond(&self, text: &str) {
        self.inform(text);
    }

    /// Ends the command successfully.
    ///
    /// Calling it on a command that already terminated logs a warning and
    /// still sends the reply.
    pub fn finish(&self, text: &str) {
        self.terminate(ReplyFlag::Finish, text);
    }

    /// Ends the command with a failure. Same re-entrancy rules as
    /// [`Command::finish`].
    pub fn fail(&self, text: &str) {
        self.terminate(ReplyFlag::Fail, text);
    }

    fn terminate(&self, flag: ReplyFlag, text: &str) {
        if !self.inner.immortal {
            let already_finished = self.inner.finished.swap(true, Ordering::SeqCst);
            let previous = self.inner.finish_count.fetch_add(1, Ordering::SeqCst);
            if already_finished {
                warn!(
                    target: CMDS_TARGET,
                    connection_id = self.inner.connection_id,
                    message_id = self.inner.message_id,
                    finish_count = previous.saturating_add(1),
                    %flag,
                    command = %self.inner.raw,
                    "command was already finished"
                );
            }
        }
        self.emit(flag, text);
    }

    fn emit(&self, flag: ReplyFlag, text: &str) {
        let line = ReplyLine::new(self.inner.connection_id, self.inner.message_id, flag, text);
        info!(target: CMDS_TARGET, "> {line}");
        self.inner.sink.send_reply(&line);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Command")
            .field("connection_id", &self.inner.connection_id)
            .field("message_id", &self.inner.message_id)
            .field("commander", &self.inner.commander)
            .field("raw", &self.inner.raw)
            .field("immortal", &self.inner.immortal)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}:{}:{} {}",
            self.inner.commander, self.inner.connection_id, self.inner.message_id, self.inner.raw
        )
    }
}
