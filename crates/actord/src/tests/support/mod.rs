//! Test harness utilities for the actor behavioural suites.

mod config_loader;
mod reporter;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestClient, TestWorld, world};
