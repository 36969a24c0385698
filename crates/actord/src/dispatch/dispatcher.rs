//! Inbound command processing.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use actorcore_config::{Config, DispatchMode};
use actorcore_protocol::{ReplyFlag, text_key};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::command::{Command, ReplySink};
use crate::hub::{HubCallbacks, HubLink};
use crate::registry::{ConnectionRegistry, LineSubmitter, RegistryError};

use super::DISPATCH_TARGET;
use super::context::{ActorContext, ActorState};
use super::errors::DispatchError;
use super::validator::Validator;

thread_local! {
    /// Commands executing on the current thread, nested self-commands included.
    static EXECUTING_HERE: Cell<usize> = const { Cell::new(0) };
}

/// Connection id reserved for commands the actor sends itself. No session
/// ever gets it, so replies to self-commands are broadcast.
pub const SELF_CONNECTION_ID: u32 = u32::MAX;

/// Dispatcher settings resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Actor name, used in hub announcements.
    pub name: String,
    /// Version reported by `version`.
    pub version: String,
    /// Where commands run.
    pub mode: DispatchMode,
    /// How long the dispatch thread blocks before rechecking for shutdown.
    pub poll_interval: Duration,
}

impl DispatchSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.name().to_owned(),
            version: config.version().to_owned(),
            mode: config.dispatch_mode(),
            poll_interval: config.dispatch_poll_interval(),
        }
    }
}

/// Validates commands and runs their handlers, either inline or on one
/// dedicated dispatch thread fed by a FIFO queue.
pub struct DispatchCore {
    settings: DispatchSettings,
    registry: Arc<ConnectionRegistry>,
    validator: Arc<dyn Validator>,
    broadcast: Command,
    context: ActorContext,
    hub: Option<HubLink>,
    queue_tx: Sender<Command>,
    queue_rx: Receiver<Command>,
    /// Cleared by the dispatch thread right before its final drain. Held
    /// across every enqueue so nothing lands after the drain.
    accepting: Mutex<bool>,
    shutting_down: AtomicBool,
    executing: AtomicUsize,
    synth_mid: AtomicU64,
    hub_mid: AtomicU64,
}

impl DispatchCore {
    pub fn new(
        settings: DispatchSettings,
        registry: Arc<ConnectionRegistry>,
        validator: Arc<dyn Validator>,
        hub: Option<HubLink>,
    ) -> Arc<Self> {
        let sink: Arc<dyn ReplySink> = Arc::clone(&registry) as Arc<dyn ReplySink>;
        let broadcast = Command::broadcast(sink);
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        Arc::new_cyclic(|core: &Weak<Self>| {
            let context = ActorContext::new(
                settings.name.clone(),
                settings.version.clone(),
                broadcast.clone(),
                hub.clone(),
                core.clone(),
            );
            Self {
                settings,
                registry,
                validator,
                broadcast,
                context,
                hub,
                queue_tx,
                queue_rx,
                accepting: Mutex::new(true),
                shutting_down: AtomicBool::new(false),
                executing: AtomicUsize::new(0),
                synth_mid: AtomicU64::new(1),
                hub_mid: AtomicU64::new(1),
            }
        })
    }

    /// Context handed to handlers.
    #[must_use]
    pub fn context(&self) -> &ActorContext {
        &self.context
    }

    /// The actor's broadcast command.
    #[must_use]
    pub fn broadcast_command(&self) -> &Command {
        &self.broadcast
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        self.settings.mode
    }

    /// Commands waiting for the dispatch thread.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue_rx.len()
    }

    /// `Busy` means a command other than the caller's own is executing.
    #[must_use]
    pub fn state(&self) -> ActorState {
        if self.is_shutting_down() {
            return ActorState::Stopping;
        }
        let others = self
            .executing
            .load(Ordering::SeqCst)
            .saturating_sub(EXECUTING_HERE.with(Cell::get));
        if others > 0 {
            ActorState::Busy
        } else {
            ActorState::Idle
        }
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Accepts one command for execution.
    ///
    /// An empty command finishes at once without reaching the validator.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ShuttingDown`] once shutdown has begun and
    /// [`DispatchError::QueueClosed`] if the queue is gone.
    pub fn submit_command(&self, command: Command) -> Result<(), DispatchError> {
        info!(target: DISPATCH_TARGET, "new cmd: {command}");
        if command.raw().trim().is_empty() {
            command.finish("");
            return Ok(());
        }
        if self.is_shutting_down() {
            return Err(DispatchError::ShuttingDown);
        }
        match self.settings.mode {
            DispatchMode::Direct => {
                self.run_command(&command);
                Ok(())
            }
            DispatchMode::Queued => self.enqueue(command),
        }
    }

    /// Appends `command` to the dispatch queue unless the dispatch thread
    /// has already made its final drain.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ShuttingDown`] after the final drain and
    /// [`DispatchError::QueueClosed`] if the queue is gone.
    pub(crate) fn enqueue(&self, command: Command) -> Result<(), DispatchError> {
        let accepting = self
            .accepting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*accepting {
            return Err(DispatchError::ShuttingDown);
        }
        self.queue_tx
            .send(command)
            .map_err(|_| DispatchError::QueueClosed)
    }

    fn close_queue(&self) {
        *self
            .accepting
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Runs `text` as a command from the actor to itself, on the reserved
    /// self connection with its own message id counter.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchCore::submit_command`].
    pub fn call_command(&self, text: &str) -> Result<Command, DispatchError> {
        let message_id = self.synth_mid.fetch_add(1, Ordering::SeqCst);
        let sink: Arc<dyn ReplySink> = Arc::clone(&self.registry) as Arc<dyn ReplySink>;
        let command = Command::new(
            sink,
            format!("self.{SELF_CONNECTION_ID}"),
            SELF_CONNECTION_ID,
            message_id,
            text,
        );
        self.submit_command(command.clone())?;
        Ok(command)
    }

    /// Sends one reply to every session through the broadcast command.
    pub fn broadcast(&self, flag: ReplyFlag, text: &str) {
        match flag {
            ReplyFlag::Inform => self.broadcast.inform(text),
            ReplyFlag::Diagnostic => self.broadcast.diagnostic(text),
            ReplyFlag::Warn => self.broadcast.warn(text),
            ReplyFlag::Error => self.broadcast.error(text),
            ReplyFlag::Fail => self.broadcast.fail(text),
            ReplyFlag::Finish => self.broadcast.finish(text),
        }
    }

    /// Starts the dispatch thread in queued mode. Direct mode needs no thread
    /// and gets a handle that only carries the shutdown flag.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] when the thread cannot be created.
    pub fn start(self: &Arc<Self>) -> Result<DispatchHandle, DispatchError> {
        let thread = match self.settings.mode {
            DispatchMode::Direct => None,
            DispatchMode::Queued => {
                let core = Arc::clone(self);
                let handle = thread::Builder::new()
                    .name("dispatch".to_owned())
                    .spawn(move || core.dispatch_loop())
                    .map_err(|source| DispatchError::Spawn { source })?;
                Some(handle)
            }
        };
        Ok(DispatchHandle {
            core: Arc::clone(self),
            thread,
        })
    }

    fn dispatch_loop(&self) {
        info!(
            target: DISPATCH_TARGET,
            poll_ms = u64::try_from(self.settings.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "dispatch loop started"
        );
        loop {
            match self.queue_rx.recv_timeout(self.settings.poll_interval) {
                Ok(command) => self.run_command(&command),
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_shutting_down() {
                        self.close_queue();
                        for command in self.queue_rx.try_iter() {
                            self.run_command(&command);
                        }
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(target: DISPATCH_TARGET, "dispatch loop stopped");
    }

    /// Validates and executes one command. Every failure, including a panic
    /// in the validator or a handler, ends in a `fail` reply.
    pub(crate) fn run_command(&self, command: &Command) {
        let _running = ExecutingGuard::enter(&self.executing);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(command)));
        if let Err(payload) = outcome {
            let reason = panic_reason(payload.as_ref());
            error!(
                target: DISPATCH_TARGET,
                command = %command,
                reason = %reason,
                "unexpected failure while processing command"
            );
            command.fail(&text_key(&format!(
                "completely unexpected exception when processing a new command: {reason}"
            )));
        }
    }

    fn execute(&self, command: &Command) {
        let matched = match self.validator.match_command(command.raw()) {
            Ok(Some(matched)) => matched,
            Ok(None) => {
                command.fail(&text_key(&format!("Unrecognized command: {}", command.raw())));
                return;
            }
            Err(error) => {
                command.fail(&text_key(&format!(
                    "Unmatched command: {} (exception: {error})",
                    command.raw()
                )));
                return;
            }
        };

        command.set_matched_form(matched.canonical.clone());
        if matched.handlers.len() > 1 {
            warn!(
                target: DISPATCH_TARGET,
                command = %matched.canonical,
                handlers = matched.handlers.len(),
                "command has more than one callback"
            );
            command.warn(&text_key(&format!(
                "command has more than one callback ({}): {}",
                matched.handlers.len(),
                matched.canonical
            )));
        }

        for handler in &matched.handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.call(command, &matched.arguments, &self.context)
            }));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(payload) => panic_reason(payload.as_ref()),
            };
            warn!(
                target: DISPATCH_TARGET,
                command = %command,
                command_set = %handler.command_set,
                reason = %failure,
                "command failed"
            );
            command.fail(&text_key(&format!(
                "command failed: {failure} (in {}:{})",
                handler.command_set, matched.verb
            )));
            return;
        }
    }

    fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!(target: DISPATCH_TARGET, pending = self.pending(), "dispatch shutting down");
        }
    }
}

impl LineSubmitter for DispatchCore {
    fn submit_line(&self, connection_id: u32, line: &[u8]) {
        let command = match self.registry.decode(connection_id, line) {
            Ok(command) => command,
            Err(RegistryError::Decode { source, .. }) => {
                let text = String::from_utf8_lossy(line);
                warn!(
                    target: DISPATCH_TARGET,
                    connection_id,
                    error = %source,
                    line = %text,
                    "cannot parse command header"
                );
                self.broadcast.warn(&text_key(&source.to_string()));
                return;
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    connection_id,
                    error = %error,
                    "dropping line from unknown session"
                );
                return;
            }
        };
        let raw = command.raw().to_owned();
        if let Err(error) = self.submit_command(command) {
            self.broadcast.fail(&text_key(&format!(
                "cannot process command: {raw} (exception={error})"
            )));
        }
    }
}

impl HubCallbacks for DispatchCore {
    fn connection_changed(&self, connected: bool) {
        let name = &self.settings.name;
        if !connected {
            warn!(target: DISPATCH_TARGET, "{name} is disconnected from the hub.");
            self.broadcast
                .warn(&text_key(&format!("{name} is disconnected from the hub.")));
            return;
        }

        warn!(target: DISPATCH_TARGET, "{name} is connected to the hub.");
        self.broadcast
            .warn(&text_key(&format!("{name} is connected to the hub.")));
        self.broadcast.warn(&text_key(&format!(
            "{name} is asking the hub to connect back to us"
        )));
        let Some(hub) = self.hub.as_ref() else {
            return;
        };
        let message_id = self.hub_mid.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = hub.write_line(&format!("{name} {message_id} hub startNubs {name}")) {
            warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "failed to ask the hub to connect back"
            );
        }
    }

    fn reply_received(&self, line: &str) {
        debug!(target: DISPATCH_TARGET, "hub < {line}");
    }
}

/// Stops the dispatcher and waits for the dispatch thread.
pub struct DispatchHandle {
    core: Arc<DispatchCore>,
    thread: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Refuses new commands. The dispatch thread drains what is already
    /// queued at its next poll timeout, then exits.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    /// Waits for the dispatch thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ThreadPanic`] if the thread panicked.
    pub fn join(mut self) -> Result<(), DispatchError> {
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| DispatchError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for DispatchHandle {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

/// Counts one running command for the lifetime of the guard.
struct ExecutingGuard<'a> {
    executing: &'a AtomicUsize,
}

impl<'a> ExecutingGuard<'a> {
    fn enter(executing: &'a AtomicUsize) -> Self {
        executing.fetch_add(1, Ordering::SeqCst);
        EXECUTING_HERE.with(|depth| depth.set(depth.get() + 1));
        Self { executing }
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        EXECUTING_HERE.with(|depth| depth.set(depth.get().saturating_sub(1)));
        self.executing.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|reason| (*reason).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
