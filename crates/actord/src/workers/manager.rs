//! Named worker threads and their queues.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use actorcore_protocol::text_key;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::dispatch::ActorContext;
use crate::health::HealthReporter;

use super::WORKERS_TARGET;
use super::errors::WorkerError;
use super::msg::Msg;
use super::queue::WorkQueue;

const JOIN_POLL: Duration = Duration::from_millis(5);

/// Body of a worker thread. It owns the loop and should return after an
/// [`Msg::exit`] arrives.
pub type WorkerEntry = Arc<dyn Fn(WorkerContext) + Send + Sync>;

/// One entry in the fixed registry of worker roles.
#[derive(Clone)]
pub struct WorkerRole {
    id: String,
    entry: WorkerEntry,
}

impl WorkerRole {
    pub fn new(id: impl Into<String>, entry: impl Fn(WorkerContext) + Send + Sync + 'static) -> Self {
        Self {
            id: id.into(),
            entry: Arc::new(entry),
        }
    }

    /// Stable role id, also the base of the thread's display name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for WorkerRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WorkerRole")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Everything a worker thread gets at start-up.
pub struct WorkerContext {
    role: String,
    display_name: String,
    generation: u32,
    queue: WorkQueue,
    actor: ActorContext,
}

impl WorkerContext {
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Queue this generation reads from.
    #[must_use]
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    #[must_use]
    pub fn actor(&self) -> &ActorContext {
        &self.actor
    }
}

/// Which roles to (re)start and how.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    restart: bool,
    roles: Option<Vec<String>>,
}

impl StartOptions {
    /// First start of every role.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Restart of every role.
    #[must_use]
    pub fn restart() -> Self {
        Self {
            restart: true,
            roles: None,
        }
    }

    /// Limits the operation to the named roles.
    #[must_use]
    pub fn only<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

struct WorkerSlot {
    queue: WorkQueue,
    thread: Option<JoinHandle<()>>,
    generation: u32,
    display_name: String,
}

struct Retiring {
    display_name: String,
    thread: Option<JoinHandle<()>>,
}

/// Starts, restarts and stops the actor's worker threads.
pub struct WorkerManager {
    roles: Vec<WorkerRole>,
    slots: Mutex<BTreeMap<String, WorkerSlot>>,
    lifecycle: Mutex<()>,
    actor: ActorContext,
    join_timeout: Duration,
    reporter: Arc<dyn HealthReporter>,
}

impl WorkerManager {
    /// Builds a manager for a fixed set of roles. No thread runs until
    /// [`WorkerManager::start_threads`] is called.
    pub fn new(
        roles: Vec<WorkerRole>,
        actor: ActorContext,
        join_timeout: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            roles,
            slots: Mutex::new(BTreeMap::new()),
            lifecycle: Mutex::new(()),
            actor,
            join_timeout,
            reporter,
        }
    }

    /// Registered role ids, in registration order.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.roles.iter().map(WorkerRole::id).collect()
    }

    /// Starts or restarts worker threads and returns their display names.
    ///
    /// A fresh start creates every queue before any thread runs. A restart
    /// flushes each old queue, sends it a single exit request and waits up to
    /// the join timeout; threads that do not exit are reported through
    /// `command` (or the broadcast command) and abandoned. New queues replace
    /// the old ones together, after every old queue has its exit request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::UnknownRole`] for unregistered roles,
    /// [`WorkerError::AlreadyStarted`] when a fresh start targets a running
    /// role, and [`WorkerError::Spawn`] when a thread cannot be created.
    pub fn start_threads(
        &self,
        options: &StartOptions,
        command: Option<&Command>,
    ) -> Result<Vec<String>, WorkerError> {
        let _lifecycle = self
            .lifecycle
            .lock()
            .map_err(|_| WorkerError::LockPoisoned)?;
        let selected = self.select(options.roles.as_deref())?;

        let mut generations = BTreeMap::new();
        let mut retiring = Vec::new();
        {
            let mut slots = self.slots()?;
            for role in &selected {
                match slots.get_mut(role.id()) {
                    Some(_) if !options.restart => {
                        return Err(WorkerError::AlreadyStarted {
                            role: role.id().to_owned(),
                        });
                    }
                    Some(slot) => {
                        let flushed = slot.queue.flush();
                        slot.queue.put(Msg::exit());
                        debug!(
                            target: WORKERS_TARGET,
                            worker = %slot.display_name,
                            flushed,
                            "exit requested"
                        );
                        generations.insert(role.id(), slot.generation.saturating_add(1));
                        retiring.push(Retiring {
                            display_name: slot.display_name.clone(),
                            thread: slot.thread.take(),
                        });
                    }
                    None => {
                        generations.insert(role.id(), 0);
                    }
                }
            }
        }

        for old in retiring {
            if !self.join_with_timeout(old.thread, &old.display_name) {
                let reply_to = command.unwrap_or_else(|| self.actor.broadcast());
                reply_to.inform(&text_key(&format!("Failed to kill {}", old.display_name)));
                self.reporter.worker_kill_failed(&old.display_name);
            }
        }

        let fresh: Vec<(&WorkerRole, u32, String, WorkQueue)> = selected
            .iter()
            .map(|role| {
                let generation = generations.get(role.id()).copied().unwrap_or(0);
                let display_name = display_name(role.id(), generation);
                (*role, generation, display_name, WorkQueue::new())
            })
            .collect();
        {
            let mut slots = self.slots()?;
            for (role, generation, display_name, queue) in &fresh {
                slots.insert(
                    role.id().to_owned(),
                    WorkerSlot {
                        queue: queue.clone(),
                        thread: None,
                        generation: *generation,
                        display_name: display_name.clone(),
                    },
                );
            }
        }

        let mut started = Vec::with_capacity(fresh.len());
        for (role, generation, display_name, queue) in fresh {
            let handle = self.spawn(role, generation, &display_name, queue)?;
            if let Some(slot) = self.slots()?.get_mut(role.id()) {
                slot.thread = Some(handle);
            }
            info!(
                target: WORKERS_TARGET,
                worker = %display_name,
                generation,
                "worker started"
            );
            started.push(display_name);
        }
        Ok(started)
    }

    /// Delivers a message to the current queue of `role`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::UnknownRole`] or [`WorkerError::NotStarted`].
    pub fn send(&self, role: &str, msg: Msg) -> Result<(), WorkerError> {
        self.role(role)?;
        let slots = self.slots()?;
        let slot = slots.get(role).ok_or_else(|| WorkerError::NotStarted {
            role: role.to_owned(),
        })?;
        slot.queue.put(msg);
        Ok(())
    }

    /// Current queue of `role`.
    #[must_use]
    pub fn queue(&self, role: &str) -> Option<WorkQueue> {
        self.with_slot(role, |slot| slot.queue.clone())
    }

    /// Thread display name of the current generation of `role`.
    #[must_use]
    pub fn display_name(&self, role: &str) -> Option<String> {
        self.with_slot(role, |slot| slot.display_name.clone())
    }

    /// Restart count of `role`.
    #[must_use]
    pub fn generation(&self, role: &str) -> Option<u32> {
        self.with_slot(role, |slot| slot.generation)
    }

    /// Whether the current thread of `role` is still running.
    #[must_use]
    pub fn is_running(&self, role: &str) -> bool {
        self.with_slot(role, |slot| {
            slot.thread
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
        })
        .unwrap_or(false)
    }

    /// Asks every worker to exit after its pending work and waits for each
    /// with the join timeout.
    pub fn shutdown(&self) {
        let _lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let drained = match self.slots() {
            Ok(mut slots) => std::mem::take(&mut *slots),
            Err(error) => {
                warn!(target: WORKERS_TARGET, error = %error, "cannot stop workers");
                return;
            }
        };
        for slot in drained.values() {
            slot.queue.put(Msg::exit());
        }
        for (_, slot) in drained {
            if !self.join_with_timeout(slot.thread, &slot.display_name) {
                self.reporter.worker_kill_failed(&slot.display_name);
            }
        }
        info!(target: WORKERS_TARGET, "workers stopped");
    }

    fn spawn(
        &self,
        role: &WorkerRole,
        generation: u32,
        display_name: &str,
        queue: WorkQueue,
    ) -> Result<JoinHandle<()>, WorkerError> {
        let context = WorkerContext {
            role: role.id().to_owned(),
            display_name: display_name.to_owned(),
            generation,
            queue,
            actor: self.actor.clone(),
        };
        let entry = Arc::clone(&role.entry);
        thread::Builder::new()
            .name(display_name.to_owned())
            .spawn(move || entry(context))
            .map_err(|source| WorkerError::Spawn {
                name: display_name.to_owned(),
                source,
            })
    }

    fn join_with_timeout(&self, thread: Option<JoinHandle<()>>, display_name: &str) -> bool {
        let Some(handle) = thread else {
            return true;
        };
        let deadline = Instant::now() + self.join_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    target: WORKERS_TARGET,
                    worker = display_name,
                    timeout_ms = u64::try_from(self.join_timeout.as_millis()).unwrap_or(u64::MAX),
                    "failed to kill worker"
                );
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        if handle.join().is_err() {
            warn!(target: WORKERS_TARGET, worker = display_name, "worker panicked");
        }
        true
    }

    fn select(&self, roles: Option<&[String]>) -> Result<Vec<&WorkerRole>, WorkerError> {
        match roles {
            None => Ok(self.roles.iter().collect()),
            Some(ids) => ids.iter().map(|id| self.role(id)).collect(),
        }
    }

    fn role(&self, id: &str) -> Result<&WorkerRole, WorkerError> {
        self.roles
            .iter()
            .find(|role| role.id() == id)
            .ok_or_else(|| WorkerError::UnknownRole { role: id.to_owned() })
    }

    fn with_slot<T>(&self, role: &str, read: impl FnOnce(&WorkerSlot) -> T) -> Option<T> {
        self.slots().ok()?.get(role).map(read)
    }

    fn slots(&self) -> Result<MutexGuard<'_, BTreeMap<String, WorkerSlot>>, WorkerError> {
        self.slots.lock().map_err(|_| WorkerError::LockPoisoned)
    }
}

impl Drop for WorkerManager {
    fn drop(&mut self) {
        if self.slots.lock().is_ok_and(|slots| !slots.is_empty()) {
            self.shutdown();
        }
    }
}

fn display_name(role: &str, generation: u32) -> String {
    if generation == 0 {
        role.to_owned()
    } else {
        format!("{role}-{generation}")
    }
}
