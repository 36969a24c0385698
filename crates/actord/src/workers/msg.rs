//! Envelope carried on worker queues.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::command::Command;

/// Urgency attached to a message. Queues stay FIFO; the priority is metadata
/// for the receiving worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Routine work.
    #[default]
    Normal,
    /// Somewhat urgent work.
    Medium,
    /// Urgent work.
    High,
    /// Work that must preempt everything else.
    Critical,
}

/// Message type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// Asks the receiving worker to exit its loop.
    Exit,
    /// A unit of work has completed.
    Done,
    /// Carries a reply for a command.
    Reply,
    /// Application-defined tag.
    App(String),
}

impl fmt::Display for MsgKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit => formatter.write_str("EXIT"),
            Self::Done => formatter.write_str("DONE"),
            Self::Reply => formatter.write_str("REPLY"),
            Self::App(tag) => formatter.write_str(tag),
        }
    }
}

/// Message delivered to a worker thread.
#[derive(Debug, Clone)]
pub struct Msg {
    kind: MsgKind,
    command: Option<Command>,
    priority: Priority,
    estimated_duration: Option<Duration>,
    payload: BTreeMap<String, Value>,
}

impl Msg {
    /// Creates a message of the given kind with normal priority.
    #[must_use]
    pub fn new(kind: MsgKind) -> Self {
        Self {
            kind,
            command: None,
            priority: Priority::Normal,
            estimated_duration: None,
            payload: BTreeMap::new(),
        }
    }

    /// The exit request, sent at critical priority.
    #[must_use]
    pub fn exit() -> Self {
        Self::new(MsgKind::Exit).with_priority(Priority::Critical)
    }

    /// Application message with the given tag.
    #[must_use]
    pub fn app(tag: impl Into<String>) -> Self {
        Self::new(MsgKind::App(tag.into()))
    }

    /// Attaches the command this message works on behalf of.
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = Some(duration);
        self
    }

    /// Adds one payload entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &MsgKind {
        &self.kind
    }

    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.kind == MsgKind::Exit
    }

    #[must_use]
    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn estimated_duration(&self) -> Option<Duration> {
        self.estimated_duration
    }

    #[must_use]
    pub fn payload(&self) -> &BTreeMap<String, Value> {
        &self.payload
    }

    /// Payload value stored under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
