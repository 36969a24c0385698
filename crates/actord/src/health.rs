//! Structured health reporting for actor lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use actorcore_config::{Config, Endpoint};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the inbound command listener is bound.
    fn listener_bound(&self, addr: SocketAddr);

    /// Invoked when the hub link comes up.
    fn hub_connected(&self, endpoint: &Endpoint);

    /// Invoked when the hub link goes down.
    fn hub_disconnected(&self, endpoint: &Endpoint);

    /// Invoked when a worker thread ignored its exit request.
    fn worker_kill_failed(&self, worker: &str);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_bound(&self, addr: SocketAddr) {
        (**self).listener_bound(addr);
    }

    fn hub_connected(&self, endpoint: &Endpoint) {
        (**self).hub_connected(endpoint);
    }

    fn hub_disconnected(&self, endpoint: &Endpoint) {
        (**self).hub_disconnected(endpoint);
    }

    fn worker_kill_failed(&self, worker: &str) {
        (**self).worker_kill_failed(worker);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting actor bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            actor = %config.name(),
            listen = %config.listen(),
            hub = ?config.hub().map(ToString::to_string),
            dispatch_mode = %config.dispatch_mode(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "actor bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "actor bootstrap failed"
        );
    }

    fn listener_bound(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_bound",
            %addr,
            "accepting command connections"
        );
    }

    fn hub_connected(&self, endpoint: &Endpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "hub_connected",
            %endpoint,
            "hub link up"
        );
    }

    fn hub_disconnected(&self, endpoint: &Endpoint) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "hub_disconnected",
            %endpoint,
            "hub link down"
        );
    }

    fn worker_kill_failed(&self, worker: &str) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "worker_kill_failed",
            worker,
            "worker thread did not exit in time"
        );
    }
}
