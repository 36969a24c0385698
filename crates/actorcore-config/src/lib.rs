//! Layered configuration shared by the actor runtime and its binary.
//!
//! [`Config`] is assembled by `ortho_config` from built-in defaults, an
//! optional configuration file, `ACTORCORE_*` environment variables and
//! command-line flags, in increasing order of precedence. Load it through the
//! derived loader:
//!
//! ```no_run
//! use actorcore_config::Config;
//!
//! let config = Config::load().expect("configuration should load");
//! println!("listening on {}", config.listen());
//! ```

mod defaults;
mod dispatch_mode;
mod endpoint;
mod logging;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACTOR_NAME, DEFAULT_DISPATCH_POLL_MS, DEFAULT_HUB_PORT, DEFAULT_HUB_RECONNECT_FACTOR,
    DEFAULT_HUB_RECONNECT_INITIAL_MS, DEFAULT_HUB_RECONNECT_MAX_MS, DEFAULT_LOG_FILTER,
    DEFAULT_WORKER_JOIN_TIMEOUT_MS, default_actor_name, default_dispatch_mode,
    default_hub_enabled, default_hub_endpoint, default_listen_endpoint, default_log_filter,
    default_log_filter_string, default_log_format, default_version,
};
pub use dispatch_mode::DispatchMode;
pub use endpoint::{Endpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::{OrthoConfig, OrthoError};

/// Resolved actor configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ACTORCORE")]
pub struct Config {
    /// Name the actor is advertised under on the hub.
    #[serde(default = "defaults::default_actor_name")]
    pub name: String,
    /// Version string reported by the `version` command.
    #[serde(default = "defaults::default_version")]
    #[ortho_config(cli_long = "actor-version")]
    pub version: String,
    /// Endpoint the inbound command listener binds to.
    #[serde(default = "defaults::default_listen_endpoint")]
    pub listen: Endpoint,
    /// Whether the actor opens a commander link to the hub.
    #[serde(default = "defaults::default_hub_enabled")]
    pub hub_enabled: bool,
    /// Hub commander endpoint.
    #[serde(default = "defaults::default_hub_endpoint")]
    pub hub: Endpoint,
    /// Direct or queued command execution.
    #[serde(default = "defaults::default_dispatch_mode")]
    pub dispatch_mode: DispatchMode,
    /// Queue poll interval of the dispatch thread, in milliseconds.
    #[serde(default = "defaults::default_dispatch_poll_ms")]
    pub dispatch_poll_ms: u64,
    /// First hub reconnect delay, in milliseconds.
    #[serde(default = "defaults::default_hub_reconnect_initial_ms")]
    pub hub_reconnect_initial_ms: u64,
    /// Multiplier applied to the reconnect delay after each failure.
    #[serde(default = "defaults::default_hub_reconnect_factor")]
    pub hub_reconnect_factor: f64,
    /// Cap on the hub reconnect delay, in milliseconds.
    #[serde(default = "defaults::default_hub_reconnect_max_ms")]
    pub hub_reconnect_max_ms: u64,
    /// Join timeout applied to worker threads on restart, in milliseconds.
    #[serde(default = "defaults::default_worker_join_timeout_ms")]
    pub worker_join_timeout_ms: u64,
    /// `tracing-subscriber` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_actor_name(),
            version: default_version(),
            listen: default_listen_endpoint(),
            hub_enabled: default_hub_enabled(),
            hub: default_hub_endpoint(),
            dispatch_mode: default_dispatch_mode(),
            dispatch_poll_ms: defaults::default_dispatch_poll_ms(),
            hub_reconnect_initial_ms: defaults::default_hub_reconnect_initial_ms(),
            hub_reconnect_factor: defaults::default_hub_reconnect_factor(),
            hub_reconnect_max_ms: defaults::default_hub_reconnect_max_ms(),
            worker_join_timeout_ms: defaults::default_worker_join_timeout_ms(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Actor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Actor version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Inbound listener endpoint.
    #[must_use]
    pub fn listen(&self) -> &Endpoint {
        &self.listen
    }

    /// Hub endpoint, or `None` when the hub link is disabled.
    #[must_use]
    pub fn hub(&self) -> Option<&Endpoint> {
        self.hub_enabled.then_some(&self.hub)
    }

    /// Dispatch execution mode.
    #[must_use]
    pub const fn dispatch_mode(&self) -> DispatchMode {
        self.dispatch_mode
    }

    /// Poll interval of the queued dispatch loop.
    #[must_use]
    pub const fn dispatch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_ms)
    }

    /// First hub reconnect delay.
    #[must_use]
    pub const fn hub_reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.hub_reconnect_initial_ms)
    }

    /// Reconnect delay multiplier.
    #[must_use]
    pub const fn hub_reconnect_factor(&self) -> f64 {
        self.hub_reconnect_factor
    }

    /// Reconnect delay cap.
    #[must_use]
    pub const fn hub_reconnect_max(&self) -> Duration {
        Duration::from_millis(self.hub_reconnect_max_ms)
    }

    /// Join timeout applied when restarting worker threads.
    #[must_use]
    pub const fn worker_join_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_join_timeout_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hub_conventions() {
        let config = Config::default();
        assert_eq!(config.name(), DEFAULT_ACTOR_NAME);
        assert_eq!(config.hub().map(Endpoint::port), Some(DEFAULT_HUB_PORT));
        assert_eq!(config.dispatch_mode(), DispatchMode::Queued);
        assert_eq!(config.dispatch_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.hub_reconnect_initial(), Duration::from_millis(500));
        assert_eq!(config.hub_reconnect_max(), Duration::from_secs(60));
        assert_eq!(config.log_filter(), default_log_filter());
    }

    #[test]
    fn disabling_the_hub_hides_its_endpoint() {
        let config = Config {
            hub_enabled: false,
            ..Config::default()
        };
        assert!(config.hub().is_none());
    }
}
