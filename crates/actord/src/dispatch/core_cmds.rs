//! Vocabulary every actor answers.

use actorcore_protocol::{quoted, text_key};

use crate::command::Command;

use super::context::ActorContext;
use super::errors::HandlerError;
use super::validator::Arguments;
use super::verbs::{CommandSet, VocabEntry};

/// `ping`, `version` and `status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreCommands;

impl CommandSet for CoreCommands {
    fn name(&self) -> &str {
        "core"
    }

    fn vocabulary(&self) -> Vec<VocabEntry> {
        vec![
            VocabEntry::new("ping", "", ping),
            VocabEntry::new("version", "", version),
            VocabEntry::new("status", "", status),
        ]
    }

    fn keyword_schemas(&self) -> Vec<String> {
        vec!["core".to_owned()]
    }
}

fn ping(command: &Command, _: &Arguments, _: &ActorContext) -> Result<(), HandlerError> {
    command.finish(&text_key("Pong."));
    Ok(())
}

fn version(command: &Command, _: &Arguments, context: &ActorContext) -> Result<(), HandlerError> {
    send_version_key(command, context.version());
    command.finish("");
    Ok(())
}

fn status(command: &Command, _: &Arguments, context: &ActorContext) -> Result<(), HandlerError> {
    command.finish(&format!("state={}", context.state()));
    Ok(())
}

fn send_version_key(command: &Command, version: &str) {
    if version.is_empty() || version == "unknown" {
        command.warn(&text_key(&format!("pathetic version string: {version}")));
    }
    command.inform(&format!("version={}", quoted(version)));
}
