use std::fmt;

use thiserror::Error;

/// Severity/terminality marker carried by every reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyFlag {
    /// Informational progress reply (`i`).
    Inform,
    /// Diagnostic progress reply (`d`).
    Diagnostic,
    /// Warning progress reply (`w`).
    Warn,
    /// Non-terminal error reply (`e`).
    Error,
    /// Terminal failure (`f`).
    Fail,
    /// Terminal success (`F`).
    Finish,
}

impl ReplyFlag {
    /// Wire character for the flag.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Inform => 'i',
            Self::Diagnostic => 'd',
            Self::Warn => 'w',
            Self::Error => 'e',
            Self::Fail => 'f',
            Self::Finish => 'F',
        }
    }

    /// Whether the flag ends the reply stream of a command.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fail | Self::Finish)
    }
}

impl fmt::Display for ReplyFlag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_char())
    }
}

/// Raised when a character is not one of `i d w e f F`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reply flag '{0}'")]
pub struct UnknownFlagError(
    /// The character that was not recognised.
    pub char,
);

impl TryFrom<char> for ReplyFlag {
    type Error = UnknownFlagError;

    fn try_from(value: char) -> Result<Self, UnknownFlagError> {
        match value {
            'i' => Ok(Self::Inform),
            'd' => Ok(Self::Diagnostic),
            'w' => Ok(Self::Warn),
            'e' => Ok(Self::Error),
            'f' => Ok(Self::Fail),
            'F' => Ok(Self::Finish),
            other => Err(UnknownFlagError(other)),
        }
    }
}
