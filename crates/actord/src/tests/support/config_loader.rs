//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use actorcore_config::{Config, DispatchMode, Endpoint, LogFormat, OrthoConfig, OrthoError};

use crate::bootstrap::ConfigLoader;

/// Loader that binds the listener to an ephemeral loopback port.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    mode: DispatchMode,
    hub: Option<Endpoint>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: DispatchMode::Queued,
            hub: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables the hub link towards `endpoint`.
    #[must_use]
    pub fn with_hub(mut self, endpoint: Endpoint) -> Self {
        self.hub = Some(endpoint);
        self
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let defaults = Config::default();
        Ok(Config {
            name: "tester".to_owned(),
            listen: Endpoint::tcp("127.0.0.1", 0),
            hub_enabled: self.hub.is_some(),
            hub: self.hub.clone().unwrap_or_else(|| defaults.hub.clone()),
            dispatch_mode: self.mode,
            dispatch_poll_ms: 20,
            hub_reconnect_initial_ms: 20,
            hub_reconnect_max_ms: 200,
            worker_join_timeout_ms: 200,
            log_format: LogFormat::Compact,
            ..defaults
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("actord"),
            OsString::from("--listen"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
