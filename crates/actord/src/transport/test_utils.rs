//! Test helpers for the transport module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{ConnectionHandler, ConnectionStream, LineReader, MAX_LINE_BYTES};

/// Handler that numbers each accepted connection and records every line it
/// reads, tagged with that number.
#[derive(Default)]
pub(crate) struct LineRecordingHandler {
    accepted: AtomicUsize,
    lines: Mutex<Vec<(usize, String)>>,
}

impl LineRecordingHandler {
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn lines(&self) -> Vec<(usize, String)> {
        self.lines.lock().expect("line log lock").clone()
    }

    /// Polls until `check` holds or two seconds pass.
    pub(crate) fn wait_until(&self, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl ConnectionHandler for LineRecordingHandler {
    fn handle(&self, stream: ConnectionStream) {
        let ordinal = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        let mut reader = LineReader::new(stream, MAX_LINE_BYTES);
        while let Ok(Some(line)) = reader.next_line() {
            let text = String::from_utf8_lossy(&line).into_owned();
            self.lines
                .lock()
                .expect("line log lock")
                .push((ordinal, text));
        }
    }
}
