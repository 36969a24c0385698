use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::flag::{ReplyFlag, UnknownFlagError};

/// One reply line, tagged so peers can demultiplex interleaved streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Connection the originating command arrived on (0 for broadcasts).
    pub connection_id: u32,
    /// Message id of the originating command.
    pub message_id: u64,
    /// Reply severity and terminality.
    pub flag: ReplyFlag,
    /// Keyword text of the reply; may be empty.
    pub text: String,
}

impl ReplyLine {
    /// Builds a reply line.
    #[must_use]
    pub fn new(connection_id: u32, message_id: u64, flag: ReplyFlag, text: impl Into<String>) -> Self {
        Self {
            connection_id,
            message_id,
            flag,
            text: text.into(),
        }
    }

    /// Serialises the line with its trailing newline, ready for a socket.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ReplyLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} {} {}",
            self.connection_id, self.message_id, self.flag, self.text
        )
    }
}

/// Errors raised while parsing a reply line received from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyParseError {
    /// Fewer than three header fields were present.
    #[error("reply line '{0}' is missing header fields")]
    Truncated(String),
    /// Connection id or message id was not an integer.
    #[error("reply line '{line}' has a non-numeric {field}")]
    NotNumeric {
        /// The full line.
        line: String,
        /// Which header field failed.
        field: &'static str,
    },
    /// Flag field was not a single known character.
    #[error("reply line '{line}' has an invalid flag: {source}")]
    Flag {
        /// The full line.
        line: String,
        /// Underlying flag error.
        #[source]
        source: UnknownFlagError,
    },
}

impl FromStr for ReplyLine {
    type Err = ReplyParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let line = input.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(4, ' ');
        let (Some(cid), Some(mid), Some(flag)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ReplyParseError::Truncated(line.to_owned()));
        };
        let connection_id = cid.parse().map_err(|_| ReplyParseError::NotNumeric {
            line: line.to_owned(),
            field: "connection id",
        })?;
        let message_id = mid.parse().map_err(|_| ReplyParseError::NotNumeric {
            line: line.to_owned(),
            field: "message id",
        })?;
        let mut chars = flag.chars();
        let flag = match (chars.next(), chars.next()) {
            (Some(only), None) => {
                ReplyFlag::try_from(only).map_err(|source| ReplyParseError::Flag {
                    line: line.to_owned(),
                    source,
                })?
            }
            _ => {
                return Err(ReplyParseError::Flag {
                    line: line.to_owned(),
                    source: UnknownFlagError(flag.chars().next().unwrap_or(' ')),
                });
            }
        };
        Ok(Self::new(
            connection_id,
            message_id,
            flag,
            parts.next().unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn wire_format_matches_handshake_example() {
        let line = ReplyLine::new(1, 0, ReplyFlag::Inform, "yourUserNum=1");
        assert_eq!(line.to_wire(), "1 0 i yourUserNum=1\n");
    }

    #[test]
    fn empty_text_keeps_the_separator() {
        let line = ReplyLine::new(3, 9, ReplyFlag::Finish, "");
        assert_eq!(line.to_string(), "3 9 F ");
    }

    #[rstest]
    #[case("1 1 F state=idle\n", 1, 1, ReplyFlag::Finish, "state=idle")]
    #[case("0 0 w text=\"a b c\"", 0, 0, ReplyFlag::Warn, "text=\"a b c\"")]
    #[case("4 17 f", 4, 17, ReplyFlag::Fail, "")]
    fn parses_peer_lines(
        #[case] input: &str,
        #[case] cid: u32,
        #[case] mid: u64,
        #[case] flag: ReplyFlag,
        #[case] text: &str,
    ) {
        let line: ReplyLine = input.parse().expect("reply should parse");
        assert_eq!(line, ReplyLine::new(cid, mid, flag, text));
    }

    #[rstest]
    #[case("1 2")]
    #[case("x 2 i text")]
    #[case("1 2 Q text")]
    #[case("1 2 ii text")]
    fn rejects_malformed_lines(#[case] input: &str) {
        assert!(input.parse::<ReplyLine>().is_err());
    }
}
