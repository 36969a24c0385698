//! Unbounded FIFO feeding one worker thread.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::msg::Msg;

/// Queue shared between the actor and one worker generation.
///
/// Both ends live in the queue, so sending never fails while any clone is
/// alive. Clones address the same queue.
#[derive(Clone)]
pub struct WorkQueue {
    tx: Sender<Msg>,
    rx: Receiver<Msg>,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Appends a message.
    pub fn put(&self, msg: Msg) {
        // Cannot fail: `self.rx` keeps the channel open.
        self.tx.send(msg).ok();
    }

    /// Discards every pending message and returns how many were dropped.
    pub fn flush(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Blocks until a message arrives.
    #[must_use]
    pub fn next(&self) -> Option<Msg> {
        self.rx.recv().ok()
    }

    /// Waits up to `timeout` for a message.
    #[must_use]
    pub fn next_timeout(&self, timeout: Duration) -> Option<Msg> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes a message if one is pending.
    #[must_use]
    pub fn try_next(&self) -> Option<Msg> {
        self.rx.try_recv().ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Whether both handles address the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
