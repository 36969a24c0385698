//! Per-session line decoder.

use std::str::Utf8Error;
use std::sync::Arc;

use actorcore_protocol::{CommandHeader, HeaderError};
use thiserror::Error;

use crate::command::{Command, ReplySink};

/// Reasons an inbound line does not become a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The line is not valid UTF-8.
    #[error("cannot decode line as UTF-8: {source}")]
    Encoding {
        /// Decoder error.
        #[source]
        source: Utf8Error,
    },
    /// The line does not follow the command header grammar.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Turns the raw lines of one session into commands.
///
/// Tracks the message id the session will self-assign next: the counter
/// starts at 1 and is pushed past any explicit id the peer sends.
#[derive(Debug)]
pub(crate) struct SessionDecoder {
    connection_id: u32,
    next_message_id: u64,
}

impl SessionDecoder {
    pub(crate) const fn new(connection_id: u32) -> Self {
        Self {
            connection_id,
            next_message_id: 1,
        }
    }

    pub(crate) fn decode(
        &mut self,
        line: &[u8],
        sink: &Arc<dyn ReplySink>,
    ) -> Result<Command, DecodeError> {
        let text = std::str::from_utf8(line).map_err(|source| DecodeError::Encoding { source })?;
        let header = CommandHeader::parse(text)?;
        let message_id = self.assign_message_id(header.message_id);
        let commander = header
            .commander
            .unwrap_or_else(|| format!("self.{}", self.connection_id));
        Ok(Command::new(
            Arc::clone(sink),
            commander,
            self.connection_id,
            message_id,
            header.command,
        ))
    }

    fn assign_message_id(&mut self, explicit: Option<u64>) -> u64 {
        match explicit {
            Some(message_id) => {
                if message_id >= self.next_message_id {
                    self.next_message_id = message_id.saturating_add(1);
                }
                message_id
            }
            None => {
                let message_id = self.next_message_id;
                self.next_message_id = self.next_message_id.saturating_add(1);
                message_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::command::test_support::RecordingSink;

    use super::*;

    #[fixture]
    fn sink() -> Arc<dyn ReplySink> {
        Arc::new(RecordingSink::default())
    }

    #[rstest]
    fn explicit_header_fields_are_kept(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(4);
        let command = decoder.decode(b"a.b 7 status", &sink).expect("decode");
        assert_eq!(command.commander(), "a.b");
        assert_eq!(command.message_id(), 7);
        assert_eq!(command.raw(), "status");
        assert_eq!(command.connection_id(), 4);
    }

    #[rstest]
    fn missing_message_ids_are_self_assigned_from_one(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        let ids: Vec<u64> = ["ping", "status", "version"]
            .iter()
            .map(|line| {
                decoder
                    .decode(line.as_bytes(), &sink)
                    .expect("decode")
                    .message_id()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[rstest]
    fn explicit_ids_push_the_counter_forward(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        decoder.decode(b"50 ping", &sink).expect("decode");
        let next = decoder.decode(b"ping", &sink).expect("decode");
        assert_eq!(next.message_id(), 51);
    }

    #[rstest]
    fn lower_explicit_ids_leave_the_counter_alone(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        decoder.decode(b"ping", &sink).expect("decode");
        decoder.decode(b"ping", &sink).expect("decode");
        decoder.decode(b"1 ping", &sink).expect("decode");
        let next = decoder.decode(b"ping", &sink).expect("decode");
        assert_eq!(next.message_id(), 3);
    }

    #[rstest]
    fn missing_commander_names_the_session(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(9);
        let command = decoder.decode(b"ping", &sink).expect("decode");
        assert_eq!(command.commander(), "self.9");
    }

    #[rstest]
    fn unparseable_lines_are_rejected(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        let error = decoder.decode(b"###", &sink).expect_err("should fail");
        assert!(matches!(
            error,
            DecodeError::Header(HeaderError::Unparseable { .. })
        ));
    }

    #[rstest]
    fn invalid_utf8_is_rejected(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        let error = decoder.decode(&[0xff, 0xfe], &sink).expect_err("should fail");
        assert!(matches!(error, DecodeError::Encoding { .. }));
    }

    #[rstest]
    fn overflowing_message_ids_are_rejected(sink: Arc<dyn ReplySink>) {
        let mut decoder = SessionDecoder::new(1);
        let error = decoder
            .decode(b"a.b 99999999999999999999999 ping", &sink)
            .expect_err("should fail");
        assert!(matches!(
            error,
            DecodeError::Header(HeaderError::MalformedMessageId { .. })
        ));
    }
}
