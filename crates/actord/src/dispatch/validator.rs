//! Validator seam and the argument model it produces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::command::Command;

use super::context::ActorContext;
use super::errors::{ArgumentSpecError, HandlerError, MatchError};

/// Callback bound to a vocabulary entry.
pub type CommandHandler =
    Arc<dyn Fn(&Command, &Arguments, &ActorContext) -> Result<(), HandlerError> + Send + Sync>;

/// Matches command text against the actor's vocabulary.
#[cfg_attr(test, mockall::automock)]
pub trait Validator: Send + Sync {
    /// Returns `Ok(None)` when no verb matches, `Ok(Some(..))` with every
    /// handler bound to the match, or an error when a verb matches but its
    /// arguments do not.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] when the text names a known verb with
    /// arguments the verb does not accept.
    fn match_command(&self, text: &str) -> Result<Option<MatchedCommand>, MatchError>;
}

/// Outcome of a successful match.
#[derive(Clone)]
pub struct MatchedCommand {
    /// Normalised form recorded on the command.
    pub canonical: String,
    /// Matched verb.
    pub verb: String,
    /// Bound arguments.
    pub arguments: Arguments,
    /// Handlers to invoke, in registration order.
    pub handlers: Vec<MatchedHandler>,
}

/// A handler together with the command set that registered it.
#[derive(Clone)]
pub struct MatchedHandler {
    pub command_set: String,
    pub handler: CommandHandler,
}

impl MatchedHandler {
    #[must_use]
    pub fn new(command_set: impl Into<String>, handler: CommandHandler) -> Self {
        Self {
            command_set: command_set.into(),
            handler,
        }
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever [`HandlerError`] the handler reports.
    pub fn call(
        &self,
        command: &Command,
        arguments: &Arguments,
        context: &ActorContext,
    ) -> Result<(), HandlerError> {
        (self.handler)(command, arguments, context)
    }
}

impl fmt::Debug for MatchedHandler {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MatchedHandler")
            .field("command_set", &self.command_set)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MatchedCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MatchedCommand")
            .field("canonical", &self.canonical)
            .field("verb", &self.verb)
            .field("arguments", &self.arguments)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Keyword arguments bound to a matched command.
///
/// Bare keywords (`abort`) have no value; `key=value` pairs keep theirs with
/// surrounding double quotes removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: BTreeMap<String, Option<String>>,
}

impl Arguments {
    /// Whether the keyword was given, with or without a value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Value given for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|value| value.as_deref())
    }

    /// Parses the value given for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidArgument`] when the value is absent or
    /// does not parse.
    pub fn parse<T>(&self, name: &str) -> Result<T, HandlerError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(name).ok_or_else(|| HandlerError::InvalidArgument {
            name: name.to_owned(),
            reason: "a value is required".to_owned(),
        })?;
        raw.parse().map_err(|error: T::Err| HandlerError::InvalidArgument {
            name: name.to_owned(),
            reason: error.to_string(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parameter {
    name: String,
    required: bool,
}

/// Keyword signature of one vocabulary entry, e.g. `<exptime> [<filter>]`.
///
/// `<name>` is required, `[<name>]` or `[name]` optional. An empty spec
/// accepts no arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSpec {
    parameters: Vec<Parameter>,
}

impl ArgumentSpec {
    /// Binds the argument tokens that followed `verb`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] for unknown, repeated or missing keywords.
    pub fn bind(&self, verb: &str, tokens: &[&str]) -> Result<Arguments, MatchError> {
        let mut values = BTreeMap::new();
        for token in tokens {
            let (name, value) = match token.split_once('=') {
                Some((name, value)) => (name, Some(unquote(value).to_owned())),
                None => (*token, None),
            };
            if !self.accepts(name) {
                return Err(MatchError::Unexpected {
                    verb: verb.to_owned(),
                    name: name.to_owned(),
                });
            }
            if values.insert(name.to_owned(), value).is_some() {
                return Err(MatchError::Duplicate {
                    verb: verb.to_owned(),
                    name: name.to_owned(),
                });
            }
        }
        if let Some(missing) = self
            .parameters
            .iter()
            .find(|parameter| parameter.required && !values.contains_key(&parameter.name))
        {
            return Err(MatchError::Missing {
                verb: verb.to_owned(),
                name: missing.name.clone(),
            });
        }
        Ok(Arguments { values })
    }

    /// Normalised text of a bound command: the verb followed by the given
    /// keywords in declaration order.
    #[must_use]
    pub fn canonical(&self, verb: &str, arguments: &Arguments) -> String {
        let mut canonical = verb.to_owned();
        for parameter in &self.parameters {
            match arguments.values.get(&parameter.name) {
                Some(Some(value)) => {
                    canonical.push(' ');
                    canonical.push_str(&parameter.name);
                    canonical.push('=');
                    canonical.push_str(value);
                }
                Some(None) => {
                    canonical.push(' ');
                    canonical.push_str(&parameter.name);
                }
                None => {}
            }
        }
        canonical
    }

    fn accepts(&self, name: &str) -> bool {
        self.parameters
            .iter()
            .any(|parameter| parameter.name == name)
    }
}

impl FromStr for ArgumentSpec {
    type Err = ArgumentSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parameters: Vec<Parameter> = Vec::new();
        for token in spec.split_whitespace() {
            let parameter = parse_parameter(token).ok_or_else(|| ArgumentSpecError::Malformed {
                token: token.to_owned(),
            })?;
            if parameters.iter().any(|known| known.name == parameter.name) {
                return Err(ArgumentSpecError::Duplicate {
                    name: parameter.name,
                });
            }
            parameters.push(parameter);
        }
        Ok(Self { parameters })
    }
}

fn parse_parameter(token: &str) -> Option<Parameter> {
    let (inner, required) = match token.strip_prefix('[') {
        Some(rest) => (rest.strip_suffix(']')?, false),
        None => (token, true),
    };
    let name = match inner.strip_prefix('<') {
        Some(rest) => rest.strip_suffix('>')?,
        None if !required => inner,
        None => return None,
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    valid.then(|| Parameter {
        name: name.to_owned(),
        required,
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
