//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use actorcore_config::{Config, Endpoint};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The command listener is accepting on this address.
    ListenerBound(SocketAddr),
    /// The hub link came up.
    HubConnected(Endpoint),
    /// The hub link went down.
    HubDisconnected(Endpoint),
    /// A worker did not stop when asked to.
    WorkerKillFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported by the last `listener_bound` event.
    #[must_use]
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().rev().find_map(|event| match event {
            HealthEvent::ListenerBound(addr) => Some(addr),
            _ => None,
        })
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_bound(&self, addr: SocketAddr) {
        self.record(HealthEvent::ListenerBound(addr));
    }

    fn hub_connected(&self, endpoint: &Endpoint) {
        self.record(HealthEvent::HubConnected(endpoint.clone()));
    }

    fn hub_disconnected(&self, endpoint: &Endpoint) {
        self.record(HealthEvent::HubDisconnected(endpoint.clone()));
    }

    fn worker_kill_failed(&self, worker: &str) {
        self.record(HealthEvent::WorkerKillFailed(worker.to_owned()));
    }
}
