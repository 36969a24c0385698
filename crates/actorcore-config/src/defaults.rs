use crate::dispatch_mode::DispatchMode;
use crate::endpoint::Endpoint;
use crate::logging::LogFormat;

/// Port the hub listens on for commander connections.
pub const DEFAULT_HUB_PORT: u16 = 6093;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Name advertised to the hub when none is configured.
pub const DEFAULT_ACTOR_NAME: &str = "actor";

/// How long the dispatch thread blocks on an empty queue before rechecking
/// the shutdown flag.
pub const DEFAULT_DISPATCH_POLL_MS: u64 = 3_000;

/// First delay before reconnecting to the hub.
pub const DEFAULT_HUB_RECONNECT_INITIAL_MS: u64 = 500;

/// Multiplier applied to the reconnect delay after each failure.
pub const DEFAULT_HUB_RECONNECT_FACTOR: f64 = 2.0;

/// Upper bound on the reconnect delay.
pub const DEFAULT_HUB_RECONNECT_MAX_MS: u64 = 60_000;

/// How long a worker restart waits for the previous thread to exit.
pub const DEFAULT_WORKER_JOIN_TIMEOUT_MS: u64 = 1_000;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default actor name.
pub fn default_actor_name() -> String {
    DEFAULT_ACTOR_NAME.to_owned()
}

/// Version reported when the actor does not configure one.
pub fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

/// Inbound listener: every interface, ephemeral port.
pub fn default_listen_endpoint() -> Endpoint {
    Endpoint::tcp("0.0.0.0", 0)
}

/// Hub commander port on the local host.
pub fn default_hub_endpoint() -> Endpoint {
    Endpoint::tcp("127.0.0.1", DEFAULT_HUB_PORT)
}

/// The hub link is opened unless explicitly disabled.
pub const fn default_hub_enabled() -> bool {
    true
}

/// Queued dispatch keeps socket reads responsive while commands run.
pub fn default_dispatch_mode() -> DispatchMode {
    DispatchMode::Queued
}

pub(crate) const fn default_dispatch_poll_ms() -> u64 {
    DEFAULT_DISPATCH_POLL_MS
}

pub(crate) const fn default_hub_reconnect_initial_ms() -> u64 {
    DEFAULT_HUB_RECONNECT_INITIAL_MS
}

pub(crate) const fn default_hub_reconnect_factor() -> f64 {
    DEFAULT_HUB_RECONNECT_FACTOR
}

pub(crate) const fn default_hub_reconnect_max_ms() -> u64 {
    DEFAULT_HUB_RECONNECT_MAX_MS
}

pub(crate) const fn default_worker_join_timeout_ms() -> u64 {
    DEFAULT_WORKER_JOIN_TIMEOUT_MS
}
