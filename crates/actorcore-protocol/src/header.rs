use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// Commander segments after the first dot may start with a digit so that
// synthesized names such as `self.3` parse back. A non-empty command must
// start with a word character.
#[expect(clippy::expect_used, reason = "the grammar is a compile-time constant")]
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^
        (?: (?P<cmdr> [a-z][a-z0-9_]* (?: \.[a-z0-9_]+ )+ ) (?: \s+ | $ ) )?
        (?: (?P<mid> [0-9]+ ) (?: \s+ | $ ) )?
        (?P<cmd> [a-z0-9_] .* )?
        $",
    )
    .expect("valid regex")
});

/// Structured form of an inbound command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHeader {
    /// Dotted commander identity, when the sender supplied one.
    pub commander: Option<String>,
    /// Message id, when the sender supplied one.
    pub message_id: Option<u64>,
    /// The command text; empty when the line carried only a header.
    pub command: String,
}

/// Reasons an inbound line is rejected before a command is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The line does not follow the header grammar at all.
    #[error("cannot parse header for {line}")]
    Unparseable {
        /// The offending line.
        line: String,
    },
    /// The message id is made of digits but does not fit a message id.
    #[error("command ignored: MID is not an integer in {line}")]
    MalformedMessageId {
        /// The offending line.
        line: String,
        /// The raw message id text.
        raw: String,
    },
}

impl CommandHeader {
    /// Parses one line (without its delimiter) into a header.
    ///
    /// Surrounding whitespace, including a trailing carriage return, is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Unparseable`] when the line does not match the
    /// grammar and [`HeaderError::MalformedMessageId`] when the message id
    /// overflows.
    pub fn parse(line: &str) -> Result<Self, HeaderError> {
        let trimmed = line.trim();
        let Some(captures) = HEADER_RE.captures(trimmed) else {
            return Err(HeaderError::Unparseable {
                line: trimmed.to_owned(),
            });
        };

        let message_id = match captures.name("mid") {
            Some(raw) => Some(raw.as_str().parse::<u64>().map_err(|_| {
                HeaderError::MalformedMessageId {
                    line: trimmed.to_owned(),
                    raw: raw.as_str().to_owned(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            commander: captures.name("cmdr").map(|m| m.as_str().to_owned()),
            message_id,
            command: captures
                .name("cmd")
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default(),
        })
    }
}
