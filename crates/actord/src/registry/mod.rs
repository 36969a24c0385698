//! Connection registry: every live inbound session, keyed by connection id.
//!
//! The registry hands out connection ids starting at 1 and never reuses them
//! while it is alive. It is also the [`ReplySink`] every command writes
//! through: replies for the broadcast pseudo-connection, or for connections
//! that no longer (or never did) exist, go to every session; all other
//! replies go back to the originating session only.

mod errors;
mod handler;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use actorcore_protocol::{
    BROADCAST_CONNECTION_ID, HANDSHAKE_KEY, ReplyFlag, ReplyLine, text_key,
};
use tracing::{info, warn};

pub use self::errors::RegistryError;
pub(crate) use self::handler::{LineSubmitter, SessionHandler};

use crate::command::{CMDS_TARGET, Command, ReplySink};
use crate::session::{Session, SessionTransport};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Tracks live sessions and fans replies out to them.
pub struct ConnectionRegistry {
    next_connection_id: AtomicU32,
    sessions: Mutex<BTreeMap<u32, Arc<Session>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_connection_id: AtomicU32::new(1),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Greets a new session with its connection id and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when the session table is
    /// unusable.
    pub fn attach(&self, transport: Box<dyn SessionTransport>) -> Result<u32, RegistryError> {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::new(connection_id, transport));

        let handshake = ReplyLine::new(
            connection_id,
            0,
            ReplyFlag::Inform,
            format!("{HANDSHAKE_KEY}={connection_id}"),
        );
        info!(target: CMDS_TARGET, "> {handshake}");
        if let Err(source) = session.send(handshake.to_wire()) {
            warn!(
                target: REGISTRY_TARGET,
                connection_id,
                error = %source,
                "failed to send handshake"
            );
        }

        self.sessions()?.insert(connection_id, session);
        info!(
            target: REGISTRY_TARGET,
            connection_id,
            "session registered"
        );
        Ok(connection_id)
    }

    /// Removes a session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] when the session was already
    /// removed.
    pub fn unregister(&self, connection_id: u32) -> Result<(), RegistryError> {
        match self.sessions()?.remove(&connection_id) {
            Some(_) => {
                info!(
                    target: REGISTRY_TARGET,
                    connection_id,
                    "session unregistered"
                );
                Ok(())
            }
            None => Err(RegistryError::NotRegistered { connection_id }),
        }
    }

    /// Connection ids of every live session, in ascending order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<u32> {
        self.sessions()
            .map(|sessions| sessions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a session with the given id is live.
    #[must_use]
    pub fn contains(&self, connection_id: u32) -> bool {
        self.sessions()
            .map(|sessions| sessions.contains_key(&connection_id))
            .unwrap_or(false)
    }

    /// Writes a reply to every live session.
    ///
    /// A session whose transport fails is logged and skipped; the others still
    /// receive the line. Returns the number of sessions written to.
    pub fn broadcast(&self, reply: &ReplyLine) -> usize {
        let wire = reply.to_wire();
        let mut delivered = 0_usize;
        for session in self.snapshot() {
            match session.send(wire.clone()) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(error) => warn!(
                    target: REGISTRY_TARGET,
                    connection_id = session.connection_id(),
                    error = %error,
                    "failed to deliver broadcast"
                ),
            }
        }
        delivered
    }

    /// Writes a reply to one session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] for unknown ids and
    /// [`RegistryError::Write`] when the transport fails.
    pub fn send_to(&self, connection_id: u32, reply: &ReplyLine) -> Result<(), RegistryError> {
        let session = self.session(connection_id)?;
        session
            .send(reply.to_wire())
            .map_err(|source| RegistryError::Write {
                connection_id,
                source,
            })
    }

    /// Announces and closes one session.
    ///
    /// The session leaves the registry once its reader notices the closed
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] for unknown ids and
    /// [`RegistryError::Write`] when the transport cannot be shut down.
    pub fn shutdown_session(&self, connection_id: u32, why: &str) -> Result<(), RegistryError> {
        let session = self.session(connection_id)?;
        self.broadcast(&ReplyLine::new(
            BROADCAST_CONNECTION_ID,
            0,
            ReplyFlag::Inform,
            text_key(&format!("shutting connection {connection_id} down")),
        ));
        info!(
            target: REGISTRY_TARGET,
            connection_id,
            reason = why,
            "shutting session down"
        );
        session.close().map_err(|source| RegistryError::Write {
            connection_id,
            source,
        })
    }

    /// Decodes one inbound line with the session's decoder.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] for unknown ids and
    /// [`RegistryError::Decode`] when the line is not a command.
    pub fn decode(
        self: &Arc<Self>,
        connection_id: u32,
        line: &[u8],
    ) -> Result<Command, RegistryError> {
        let session = self.session(connection_id)?;
        let sink: Arc<dyn ReplySink> = Arc::clone(self) as Arc<dyn ReplySink>;
        session
            .decode(line, &sink)
            .map_err(|source| RegistryError::Decode {
                connection_id,
                source,
            })
    }

    fn session(&self, connection_id: u32) -> Result<Arc<Session>, RegistryError> {
        self.sessions()?
            .get(&connection_id)
            .cloned()
            .ok_or(RegistryError::NotRegistered { connection_id })
    }

    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions()
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, BTreeMap<u32, Arc<Session>>>, RegistryError> {
        self.sessions
            .lock()
            .map_err(|_| RegistryError::LockPoisoned)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySink for ConnectionRegistry {
    fn send_reply(&self, reply: &ReplyLine) {
        if reply.connection_id == BROADCAST_CONNECTION_ID || !self.contains(reply.connection_id) {
            self.broadcast(reply);
            return;
        }
        if let Err(error) = self.send_to(reply.connection_id, reply) {
            warn!(
                target: REGISTRY_TARGET,
                connection_id = reply.connection_id,
                error = %error,
                "failed to deliver reply"
            );
        }
    }
}
