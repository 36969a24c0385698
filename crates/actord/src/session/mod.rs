//! Per-connection session state.
//!
//! A session buffers outbound reply lines and writes them in arrival order.
//! Enqueueing takes only a short buffer lock; the write lock is held while a
//! batch that is already buffered goes out, never across a blocking read.

mod decoder;

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

pub use self::decoder::DecodeError;
pub(crate) use self::decoder::SessionDecoder;

use crate::command::{Command, ReplySink};
use crate::transport::ConnectionStream;

/// Write half of a session transport.
pub trait SessionTransport: Write + Send {
    /// Closes the underlying connection in both directions.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the connection cannot be shut down.
    fn close(&mut self) -> io::Result<()>;
}

impl SessionTransport for ConnectionStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown()
    }
}

/// One inbound connection as seen by the registry.
pub(crate) struct Session {
    connection_id: u32,
    pending: Mutex<VecDeque<String>>,
    transport: Mutex<Box<dyn SessionTransport>>,
    decoder: Mutex<SessionDecoder>,
}

impl Session {
    pub(crate) fn new(connection_id: u32, transport: Box<dyn SessionTransport>) -> Self {
        Self {
            connection_id,
            pending: Mutex::new(VecDeque::new()),
            transport: Mutex::new(transport),
            decoder: Mutex::new(SessionDecoder::new(connection_id)),
        }
    }

    pub(crate) const fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Buffers a line and flushes everything buffered so far.
    pub(crate) fn send(&self, line: String) -> io::Result<()> {
        lock(&self.pending)?.push_back(line);
        self.flush()
    }

    fn flush(&self) -> io::Result<()> {
        let mut transport = lock(&self.transport)?;
        let batch: Vec<String> = lock(&self.pending)?.drain(..).collect();
        for line in &batch {
            transport.write_all(line.as_bytes())?;
        }
        transport.flush()
    }

    pub(crate) fn decode(
        &self,
        line: &[u8],
        sink: &Arc<dyn ReplySink>,
    ) -> Result<Command, DecodeError> {
        let mut decoder = self
            .decoder
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        decoder.decode(line, sink)
    }

    pub(crate) fn close(&self) -> io::Result<()> {
        lock(&self.transport)?.close()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other("session lock poisoned"))
}
