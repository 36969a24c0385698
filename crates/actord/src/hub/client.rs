//! Reconnecting client for the hub commander link.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use actorcore_config::Endpoint;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::transport::{LineReader, MAX_LINE_BYTES};

use super::HUB_TARGET;
use super::backoff::{Backoff, BackoffPolicy};
use super::errors::HubError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection state of the hub link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubLinkState {
    /// No connection and none in progress.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The link is up.
    Connected,
}

/// Observer of hub link events. Called on the link thread.
pub trait HubCallbacks: Send + Sync {
    /// The link came up (`true`) or went down (`false`).
    fn connection_changed(&self, connected: bool);

    /// A line arrived from the hub, delimiter removed.
    fn reply_received(&self, line: &str);
}

/// Cloneable handle used to inspect the link and write to it.
#[derive(Clone)]
pub struct HubLink {
    shared: Arc<LinkShared>,
}

struct LinkShared {
    endpoint: Endpoint,
    state: Mutex<HubLinkState>,
    writer: Mutex<Option<TcpStream>>,
}

impl HubLink {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            shared: Arc::new(LinkShared {
                endpoint,
                state: Mutex::new(HubLinkState::Disconnected),
                writer: Mutex::new(None),
            }),
        }
    }

    /// Hub endpoint this link targets.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> HubLinkState {
        self.shared
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(HubLinkState::Disconnected)
    }

    /// Whether the link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == HubLinkState::Connected
    }

    /// Sends one line to the hub. Writes are serialised.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotConnected`] while the link is down and
    /// [`HubError::Io`] when the write fails.
    pub fn write_line(&self, text: &str) -> Result<(), HubError> {
        let mut writer = self.writer()?;
        let stream = writer.as_mut().ok_or(HubError::NotConnected)?;
        info!(target: HUB_TARGET, "> {text}");
        stream
            .write_all(format!("{text}\n").as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|source| HubError::Io { source })
    }

    pub(crate) fn install(&self, stream: &TcpStream) -> Result<(), HubError> {
        let mut writer = self.writer()?;
        if writer.is_some() {
            return Err(HubError::AlreadyConnected);
        }
        *writer = Some(stream.try_clone().map_err(|source| HubError::Io { source })?);
        drop(writer);
        self.set_state(HubLinkState::Connected);
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut writer) = self.shared.writer.lock() {
            writer.take();
        }
        self.set_state(HubLinkState::Disconnected);
    }

    fn interrupt(&self) {
        if let Ok(writer) = self.shared.writer.lock()
            && let Some(stream) = writer.as_ref()
            && let Err(error) = stream.shutdown(std::net::Shutdown::Both)
        {
            debug!(target: HUB_TARGET, error = %error, "hub socket already closed");
        }
    }

    fn set_state(&self, next: HubLinkState) {
        if let Ok(mut state) = self.shared.state.lock() {
            *state = next;
        }
    }

    fn writer(&self) -> Result<MutexGuard<'_, Option<TcpStream>>, HubError> {
        self.shared
            .writer
            .lock()
            .map_err(|_| HubError::LockPoisoned)
    }
}

/// Hub client that has not been started yet.
pub struct HubClient {
    link: HubLink,
    policy: BackoffPolicy,
}

impl HubClient {
    /// Builds a client for the given endpoint and reconnect schedule.
    #[must_use]
    pub fn new(endpoint: Endpoint, policy: BackoffPolicy) -> Self {
        Self {
            link: HubLink::new(endpoint),
            policy,
        }
    }

    /// Handle to the link, usable before and after [`HubClient::start`].
    #[must_use]
    pub fn link(&self) -> HubLink {
        self.link.clone()
    }

    /// Starts the connect/read/backoff loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Spawn`] when the thread cannot be created.
    pub fn start(self, callbacks: Arc<dyn HubCallbacks>) -> Result<HubHandle, HubError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let link = self.link.clone();
        let loop_state = LinkLoop {
            link: self.link,
            policy: self.policy,
            callbacks,
            shutdown: Arc::clone(&shutdown),
            wake: wake_rx,
        };
        let handle = thread::Builder::new()
            .name("hub-link".to_owned())
            .spawn(move || loop_state.run())
            .map_err(|source| HubError::Spawn { source })?;
        Ok(HubHandle {
            link,
            shutdown,
            wake: wake_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to the running hub link thread.
pub struct HubHandle {
    link: HubLink,
    shutdown: Arc<AtomicBool>,
    wake: Sender<()>,
    handle: Option<thread::JoinHandle<Result<(), HubError>>>,
}

impl HubHandle {
    /// Handle to the link.
    #[must_use]
    pub fn link(&self) -> &HubLink {
        &self.link
    }

    /// Stops the loop, interrupting a blocked read or a backoff sleep.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.try_send(()).ok();
        self.link.interrupt();
    }

    /// Waits for the link thread to exit.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop, or
    /// [`HubError::ThreadPanic`].
    pub fn join(mut self) -> Result<(), HubError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| HubError::ThreadPanic)?,
            None => Ok(()),
        }
    }
}

impl Drop for HubHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct LinkLoop {
    link: HubLink,
    policy: BackoffPolicy,
    callbacks: Arc<dyn HubCallbacks>,
    shutdown: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl LinkLoop {
    fn run(self) -> Result<(), HubError> {
        let endpoint = self.link.endpoint().clone();
        let mut backoff = Backoff::new(self.policy);
        info!(target: HUB_TARGET, %endpoint, "hub link started");
        let result = loop {
            if self.stopping() {
                break Ok(());
            }
            self.link.set_state(HubLinkState::Connecting);
            match connect(&endpoint) {
                Ok(stream) => match self.link.install(&stream) {
                    Ok(()) => {
                        backoff.reset();
                        self.serve(stream, &endpoint);
                    }
                    Err(HubError::AlreadyConnected) => {
                        error!(
                            target: HUB_TARGET,
                            %endpoint,
                            "second hub connection built while one is active"
                        );
                        break Err(HubError::AlreadyConnected);
                    }
                    Err(error) => {
                        self.link.set_state(HubLinkState::Disconnected);
                        warn!(target: HUB_TARGET, %endpoint, error = %error, "hub link setup failed");
                    }
                },
                Err(error) => {
                    self.link.set_state(HubLinkState::Disconnected);
                    warn!(target: HUB_TARGET, error = %error, "hub connect failed");
                }
            }
            if self.stopping() {
                break Ok(());
            }
            let delay = backoff.next_delay();
            debug!(
                target: HUB_TARGET,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "waiting before hub reconnect"
            );
            // A wake message or a dropped handle both end the wait early.
            self.wake.recv_timeout(delay).ok();
        };
        self.link.clear();
        info!(target: HUB_TARGET, %endpoint, "hub link stopped");
        result
    }

    fn serve(&self, stream: TcpStream, endpoint: &Endpoint) {
        if self.stopping() {
            self.link.clear();
            return;
        }
        info!(target: HUB_TARGET, %endpoint, "connected to hub");
        self.callbacks.connection_changed(true);

        let mut reader = LineReader::new(stream, MAX_LINE_BYTES);
        loop {
            match reader.next_line() {
                Ok(Some(line)) => {
                    let text = String::from_utf8_lossy(&line);
                    self.callbacks.reply_received(text.trim_end_matches('\r'));
                }
                Ok(None) => break,
                Err(error) => {
                    if !self.stopping() {
                        warn!(target: HUB_TARGET, error = %error, "hub read failed");
                    }
                    break;
                }
            }
        }

        self.link.clear();
        info!(target: HUB_TARGET, %endpoint, "disconnected from hub");
        self.callbacks.connection_changed(false);
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

fn connect(endpoint: &Endpoint) -> Result<TcpStream, HubError> {
    let addr = (endpoint.host(), endpoint.port())
        .to_socket_addrs()
        .map_err(|source| HubError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| HubError::ResolveEmpty {
            endpoint: endpoint.to_string(),
        })?;
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|source| HubError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Instant;

    use rstest::{fixture, rstest};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum LinkEvent {
        Connected,
        Disconnected,
        Line(String),
    }

    #[derive(Default)]
    struct RecordingCallbacks {
        events: Mutex<Vec<LinkEvent>>,
    }

    impl RecordingCallbacks {
        fn events(&self) -> Vec<LinkEvent> {
            self.events.lock().expect("events lock").clone()
        }

        fn wait_for(&self, expected: &LinkEvent, occurrences: usize) -> bool {
            let deadline = Instant::now() + Duration::from_secs(3);
            while Instant::now() < deadline {
                let seen = self
                    .events()
                    .iter()
                    .filter(|event| *event == expected)
                    .count();
                if seen >= occurrences {
                    return true;
                }
                thread::sleep(Duration::from_millis(10));
            }
            false
        }
    }

    impl HubCallbacks for RecordingCallbacks {
        fn connection_changed(&self, connected: bool) {
            let event = if connected {
                LinkEvent::Connected
            } else {
                LinkEvent::Disconnected
            };
            self.events.lock().expect("events lock").push(event);
        }

        fn reply_received(&self, line: &str) {
            self.events
                .lock()
                .expect("events lock")
                .push(LinkEvent::Line(line.to_owned()));
        }
    }

    #[fixture]
    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(20),
            factor: 2.0,
            max: Duration::from_millis(100),
        }
    }

    fn hub_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind hub");
        let port = listener.local_addr().expect("hub addr").port();
        (listener, Endpoint::tcp("127.0.0.1", port))
    }

    #[rstest]
    fn writes_fail_while_disconnected(fast_policy: BackoffPolicy) {
        let client = HubClient::new(Endpoint::tcp("127.0.0.1", 9), fast_policy);
        let link = client.link();
        assert_eq!(link.state(), HubLinkState::Disconnected);
        assert!(matches!(
            link.write_line("actor 1 hub status"),
            Err(HubError::NotConnected)
        ));
    }

    #[rstest]
    fn a_second_connection_is_refused() {
        let (listener, endpoint) = hub_listener();
        let link = HubLink::new(endpoint);
        let first = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let second = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        link.install(&first).expect("first install");
        assert!(matches!(
            link.install(&second),
            Err(HubError::AlreadyConnected)
        ));
        assert!(link.is_connected());
    }

    #[rstest]
    fn link_relays_lines_and_reconnects(fast_policy: BackoffPolicy) {
        let (listener, endpoint) = hub_listener();
        let callbacks = Arc::new(RecordingCallbacks::default());
        let handle = HubClient::new(endpoint, fast_policy)
            .start(callbacks.clone())
            .expect("start hub link");

        let (mut hub_side, _) = listener.accept().expect("accept actor");
        assert!(callbacks.wait_for(&LinkEvent::Connected, 1));
        assert!(handle.link().is_connected());

        hub_side.write_all(b"hub 1 actor i x=1\r\n").expect("hub write");
        assert!(callbacks.wait_for(&LinkEvent::Line("hub 1 actor i x=1".to_owned()), 1));

        handle
            .link()
            .write_line("actor 1 hub status")
            .expect("actor write");
        let mut received = String::new();
        BufReader::new(hub_side.try_clone().expect("clone"))
            .read_line(&mut received)
            .expect("hub read");
        assert_eq!(received, "actor 1 hub status\n");

        drop(hub_side);
        assert!(callbacks.wait_for(&LinkEvent::Disconnected, 1));
        let (_again, _) = listener.accept().expect("accept reconnect");
        assert!(callbacks.wait_for(&LinkEvent::Connected, 2));

        handle.shutdown();
        handle.join().expect("join hub link");
    }

    #[rstest]
    fn shutdown_interrupts_the_backoff_sleep() {
        let (listener, endpoint) = hub_listener();
        drop(listener);
        let slow = BackoffPolicy {
            initial: Duration::from_secs(30),
            factor: 2.0,
            max: Duration::from_secs(60),
        };
        let callbacks = Arc::new(RecordingCallbacks::default());
        let handle = HubClient::new(endpoint, slow)
            .start(callbacks.clone())
            .expect("start hub link");
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        handle.shutdown();
        handle.join().expect("join hub link");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(callbacks.events().is_empty());
    }

    #[rstest]
    fn shutdown_interrupts_a_blocked_read(fast_policy: BackoffPolicy) {
        let (listener, endpoint) = hub_listener();
        let callbacks = Arc::new(RecordingCallbacks::default());
        let handle = HubClient::new(endpoint, fast_policy)
            .start(callbacks.clone())
            .expect("start hub link");
        let (_hub_side, _) = listener.accept().expect("accept actor");
        assert!(callbacks.wait_for(&LinkEvent::Connected, 1));

        handle.shutdown();
        handle.join().expect("join hub link");
        assert_eq!(
            callbacks.events(),
            vec![LinkEvent::Connected, LinkEvent::Disconnected]
        );
    }
}
