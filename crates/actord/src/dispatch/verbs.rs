//! Verb-keyed vocabulary assembled from command sets.

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::command::Command;

use super::DISPATCH_TARGET;
use super::context::ActorContext;
use super::errors::{CommandSetError, HandlerError, MatchError};
use super::validator::{
    ArgumentSpec, Arguments, CommandHandler, MatchedCommand, MatchedHandler, Validator,
};

/// One `(verb, argument spec, handler)` entry of a command set.
#[derive(Clone)]
pub struct VocabEntry {
    verb: String,
    spec: String,
    handler: CommandHandler,
}

impl VocabEntry {
    pub fn new<F>(verb: impl Into<String>, spec: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Command, &Arguments, &ActorContext) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            verb: verb.into(),
            spec: spec.into(),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }
}

impl fmt::Debug for VocabEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("VocabEntry")
            .field("verb", &self.verb)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// A named group of vocabulary entries plus the keyword schemas it needs.
pub trait CommandSet: Send + Sync {
    /// Name used to replace the set when it is attached again.
    fn name(&self) -> &str;

    /// Entries contributed by this set.
    fn vocabulary(&self) -> Vec<VocabEntry>;

    /// Names of keyword schemas the set's replies use.
    fn keyword_schemas(&self) -> Vec<String> {
        Vec::new()
    }
}

struct BoundEntry {
    verb: String,
    spec: ArgumentSpec,
    handler: CommandHandler,
}

struct AttachedSet {
    name: String,
    entries: Vec<BoundEntry>,
    keyword_schemas: Vec<String>,
}

/// Default [`Validator`]: matches the first word of a command against the
/// verbs of every attached command set.
///
/// Several entries may claim the same verb; every entry whose argument spec
/// binds contributes its handler, in attachment order.
#[derive(Default)]
pub struct VerbTable {
    sets: RwLock<Vec<AttachedSet>>,
}

impl VerbTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command set, replacing any set attached under the same name.
    ///
    /// # Errors
    ///
    /// Returns [`CommandSetError`] when an entry has no verb or a malformed
    /// argument spec; the table is left unchanged.
    pub fn attach_command_set(&self, set: &dyn CommandSet) -> Result<(), CommandSetError> {
        let name = set.name().to_owned();
        let entries = set
            .vocabulary()
            .into_iter()
            .map(|entry| bind_entry(&name, entry))
            .collect::<Result<Vec<_>, _>>()?;
        let verbs = entries.len();
        let attached = AttachedSet {
            name: name.clone(),
            entries,
            keyword_schemas: set.keyword_schemas(),
        };

        let mut sets = self.sets.write().map_err(|_| CommandSetError::LockPoisoned)?;
        let replaced = sets.iter().any(|known| known.name == name);
        sets.retain(|known| known.name != name);
        sets.push(attached);
        info!(
            target: DISPATCH_TARGET,
            command_set = %name,
            verbs,
            replaced,
            "command set attached"
        );
        Ok(())
    }

    /// Removes a command set. Returns whether it was attached.
    pub fn detach_command_set(&self, name: &str) -> bool {
        self.sets.write().is_ok_and(|mut sets| {
            let before = sets.len();
            sets.retain(|known| known.name != name);
            sets.len() != before
        })
    }

    /// Names of attached command sets, in attachment order.
    #[must_use]
    pub fn command_sets(&self) -> Vec<String> {
        self.sets
            .read()
            .map(|sets| sets.iter().map(|set| set.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Keyword schema names required by every attached set, deduplicated.
    #[must_use]
    pub fn keyword_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self
            .sets
            .read()
            .map(|sets| {
                sets.iter()
                    .flat_map(|set| set.keyword_schemas.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();
        schemas.sort();
        schemas.dedup();
        schemas
    }
}

impl Validator for VerbTable {
    fn match_command(&self, text: &str) -> Result<Option<MatchedCommand>, MatchError> {
        let mut tokens = text.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let arguments: Vec<&str> = tokens.collect();
        let sets = self.sets.read().map_err(|_| MatchError::LockPoisoned)?;

        let mut matched: Option<MatchedCommand> = None;
        let mut first_error = None;
        for (set_name, entry) in sets
            .iter()
            .flat_map(|set| set.entries.iter().map(move |entry| (&set.name, entry)))
            .filter(|(_, entry)| entry.verb == verb)
        {
            let handler = MatchedHandler::new(set_name.as_str(), Arc::clone(&entry.handler));
            match entry.spec.bind(verb, &arguments) {
                Ok(bound) => match matched.as_mut() {
                    Some(found) => found.handlers.push(handler),
                    None => {
                        matched = Some(MatchedCommand {
                            canonical: entry.spec.canonical(verb, &bound),
                            verb: verb.to_owned(),
                            arguments: bound,
                            handlers: vec![handler],
                        });
                    }
                },
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        match (matched, first_error) {
            (Some(found), _) => Ok(Some(found)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(None),
        }
    }
}

fn bind_entry(set: &str, entry: VocabEntry) -> Result<BoundEntry, CommandSetError> {
    if entry.verb.trim().is_empty() {
        return Err(CommandSetError::EmptyVerb {
            set: set.to_owned(),
        });
    }
    let spec = entry
        .spec
        .parse::<ArgumentSpec>()
        .map_err(|source| CommandSetError::Spec {
            set: set.to_owned(),
            verb: entry.verb.clone(),
            source,
        })?;
    Ok(BoundEntry {
        verb: entry.verb,
        spec,
        handler: entry.handler,
    })
}
