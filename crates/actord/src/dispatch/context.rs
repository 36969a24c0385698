//! Explicit actor context handed to handlers and workers.

use std::fmt;
use std::sync::Weak;

use crate::command::Command;
use crate::hub::{HubError, HubLink};

use super::dispatcher::DispatchCore;
use super::errors::DispatchError;

/// Coarse actor state reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Nothing else is executing.
    Idle,
    /// Another command is executing.
    Busy,
    /// Shutdown has begun.
    Stopping,
}

impl fmt::Display for ActorState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Stopping => "stopping",
        })
    }
}

/// Actor-wide facts and entry points available to command handlers.
#[derive(Clone)]
pub struct ActorContext {
    name: String,
    version: String,
    broadcast: Command,
    hub: Option<HubLink>,
    core: Weak<DispatchCore>,
}

impl ActorContext {
    pub(crate) fn new(
        name: String,
        version: String,
        broadcast: Command,
        hub: Option<HubLink>,
        core: Weak<DispatchCore>,
    ) -> Self {
        Self {
            name,
            version,
            broadcast,
            hub,
            core,
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(broadcast: Command) -> Self {
        Self::new(
            "actor".to_owned(),
            "0.1.0".to_owned(),
            broadcast,
            None,
            Weak::new(),
        )
    }

    /// Name the actor is advertised under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The never-finishing command whose replies reach every session.
    #[must_use]
    pub fn broadcast(&self) -> &Command {
        &self.broadcast
    }

    /// Hub link, when the actor has one.
    #[must_use]
    pub fn hub(&self) -> Option<&HubLink> {
        self.hub.as_ref()
    }

    #[must_use]
    pub fn hub_connected(&self) -> bool {
        self.hub.as_ref().is_some_and(HubLink::is_connected)
    }

    /// Current dispatch state; `Stopping` once the dispatcher is gone.
    #[must_use]
    pub fn state(&self) -> ActorState {
        self.core
            .upgrade()
            .map_or(ActorState::Stopping, |core| core.state())
    }

    /// Runs `text` as a command the actor sends itself.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the actor is stopping or its queue is
    /// closed.
    pub fn call_command(&self, text: &str) -> Result<Command, DispatchError> {
        self.core
            .upgrade()
            .ok_or(DispatchError::ShuttingDown)?
            .call_command(text)
    }

    /// Writes a raw line to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotConnected`] when there is no live hub link.
    pub fn send_to_hub(&self, text: &str) -> Result<(), HubError> {
        self.hub
            .as_ref()
            .ok_or(HubError::NotConnected)?
            .write_line(text)
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ActorContext")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("hub_connected", &self.hub_connected())
            .finish_non_exhaustive()
    }
}
