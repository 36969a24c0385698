use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where accepted commands are executed.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DispatchMode {
    /// Validate and run each command on the thread that read it from the wire.
    Direct,
    /// Push commands onto a FIFO drained by one dedicated dispatch thread.
    #[default]
    Queued,
}
