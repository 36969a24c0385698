//! Outbound commander link to the hub.
//!
//! The actor keeps exactly one TCP connection to the hub. A background thread
//! connects, reads reply lines until the link drops, then waits out an
//! exponential backoff and tries again.

mod backoff;
mod client;
mod errors;

pub use self::backoff::BackoffPolicy;
pub use self::client::{HubCallbacks, HubClient, HubHandle, HubLink, HubLinkState};
pub use self::errors::HubError;

const HUB_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::hub");
