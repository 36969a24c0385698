//! BDD test world: loader, reporter, the running actor and a TCP client
//! shared by step functions.

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use actorcore_config::DispatchMode;

use crate::bootstrap::{Actor, ActorComponents, BootstrapError, ConfigLoader, bootstrap_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Line-oriented client connected to the actor's listener.
pub struct TestClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    /// Connects to `addr` with a bounded read timeout.
    ///
    /// # Panics
    ///
    /// Panics when the connection cannot be opened.
    #[must_use]
    pub fn connect(addr: std::net::SocketAddr) -> Self {
        let writer = TcpStream::connect(addr).expect("connect to actor");
        writer
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        let reader = BufReader::new(writer.try_clone().expect("clone stream"));
        Self { writer, reader }
    }

    pub fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .expect("write command");
        self.writer.flush().expect("flush command");
    }

    /// Reads one reply line without its terminator; `Ok(None)` on EOF.
    ///
    /// # Errors
    ///
    /// Returns the read error, including the timeout.
    pub fn try_read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    /// Reads one reply line; `None` on EOF or timeout.
    pub fn read_line(&mut self) -> Option<String> {
        self.try_read_line().ok().flatten()
    }
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    actor: Option<Actor>,
    bootstrap_error: Option<BootstrapError>,
    client: Option<TestClient>,
    pub replies: Vec<String>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            actor: None,
            bootstrap_error: None,
            client: None,
            replies: Vec::new(),
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds with the given dispatch mode.
    pub fn use_successful_loader(&mut self, mode: DispatchMode) {
        self.loader = Box::new(TestConfigLoader::new().with_mode(mode));
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.actor.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(
            &*self.loader,
            self.reporter.clone(),
            ActorComponents::new(),
        ) {
            Ok(actor) => self.actor = Some(actor),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Opens a client session and records its greeting.
    pub fn connect_client(&mut self) {
        let addr = self
            .actor
            .as_ref()
            .expect("actor should be running")
            .local_addr();
        let mut client = TestClient::connect(addr);
        if let Some(line) = client.read_line() {
            self.replies.push(line);
        }
        self.client = Some(client);
    }

    /// Sends a command and collects replies up to and including the
    /// terminal one.
    pub fn send_command(&mut self, line: &str) {
        let client = self.client.as_mut().expect("client should be connected");
        client.send(line);
        while let Some(reply) = client.read_line() {
            let terminal = is_terminal(&reply);
            self.replies.push(reply);
            if terminal {
                break;
            }
        }
    }

    /// Shuts the actor down, if it is running.
    pub fn stop(&mut self) {
        if let Some(actor) = self.actor.take() {
            actor.shutdown().expect("actor should stop cleanly");
        }
    }

    /// Collects the remaining replies and reports whether the server then
    /// closed the client session.
    pub fn client_sees_eof(&mut self) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        loop {
            match client.try_read_line() {
                Ok(Some(line)) => self.replies.push(line),
                Ok(None) => return true,
                Err(_) => return false,
            }
        }
    }

    fn reset_results(&mut self) {
        self.stop();
        self.bootstrap_error = None;
        self.client = None;
        self.replies.clear();
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.take() {
            let _ = actor.shutdown();
        }
    }
}

fn is_terminal(reply: &str) -> bool {
    matches!(reply.split(' ').nth(2), Some("F" | "f"))
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
