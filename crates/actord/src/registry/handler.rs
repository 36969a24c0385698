//! Per-connection reader loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::transport::{ConnectionHandler, ConnectionStream, LineReader, MAX_LINE_BYTES};

use super::{ConnectionRegistry, REGISTRY_TARGET};

/// Receives every raw line read from a session, in arrival order.
pub(crate) trait LineSubmitter: Send + Sync + 'static {
    /// Handles one line (delimiter already removed) from `connection_id`.
    fn submit_line(&self, connection_id: u32, line: &[u8]);
}

/// Connection handler that registers the session and feeds its lines to a
/// [`LineSubmitter`] until the peer goes away.
pub(crate) struct SessionHandler {
    registry: Arc<ConnectionRegistry>,
    submitter: Arc<dyn LineSubmitter>,
}

impl SessionHandler {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>, submitter: Arc<dyn LineSubmitter>) -> Self {
        Self {
            registry,
            submitter,
        }
    }

    fn serve(&self, stream: ConnectionStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(
                    target: REGISTRY_TARGET,
                    error = %error,
                    "failed to split connection stream"
                );
                return;
            }
        };
        let peer = stream.peer_addr();
        let connection_id = match self.registry.attach(Box::new(writer)) {
            Ok(connection_id) => connection_id,
            Err(error) => {
                warn!(
                    target: REGISTRY_TARGET,
                    error = %error,
                    "failed to register session"
                );
                return;
            }
        };
        debug!(
            target: REGISTRY_TARGET,
            connection_id,
            peer = ?peer,
            "session reader started"
        );

        let mut reader = LineReader::new(stream, MAX_LINE_BYTES);
        loop {
            match reader.next_line() {
                Ok(Some(line)) => self.submitter.submit_line(connection_id, &line),
                Ok(None) => break,
                Err(error) => {
                    warn!(
                        target: REGISTRY_TARGET,
                        connection_id,
                        error = %error,
                        "closing session after read error"
                    );
                    break;
                }
            }
        }

        if let Err(error) = self.registry.unregister(connection_id) {
            warn!(
                target: REGISTRY_TARGET,
                connection_id,
                error = %error,
                "session was already removed"
            );
        }
        info!(
            target: REGISTRY_TARGET,
            connection_id,
            "connection closed"
        );
    }
}

impl ConnectionHandler for SessionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}
