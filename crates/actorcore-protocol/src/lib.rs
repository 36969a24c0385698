//! Wire types for the actor line protocol.
//!
//! Peers send one command per line:
//!
//! ```text
//! [<commanderName> ]?[<messageId> ]?<commandString>
//! ```
//!
//! and the actor answers with any number of reply lines per command:
//!
//! ```text
//! <connectionId> <messageId> <flag> <responseText>
//! ```
//!
//! Everything in this crate is pure: parsing and formatting only, no I/O and
//! no per-connection state. The stateful parts of the protocol (self-assigned
//! message ids, reply routing) live in the runtime crate.

mod flag;
mod header;
mod keys;
mod reply;

pub use flag::{ReplyFlag, UnknownFlagError};
pub use header::{CommandHeader, HeaderError};
pub use keys::{quoted, text_key};
pub use reply::{ReplyLine, ReplyParseError};

/// Connection id of the actor's broadcast pseudo-session.
pub const BROADCAST_CONNECTION_ID: u32 = 0;

/// Key sent to a freshly accepted connection to tell it its connection id.
pub const HANDSHAKE_KEY: &str = "yourUserNum";
