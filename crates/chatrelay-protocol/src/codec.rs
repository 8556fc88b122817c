//! Codec trait and the delimited-line implementation.
//!
//! A "codec" converts between a line of text and the typed [`Inbound`] /
//! [`Outbound`] messages. The relay only talks to the [`Codec`] trait, so
//! the field separator (or the whole format) can change without touching
//! dispatch or broadcast code.

use crate::{ClientId, Inbound, Outbound, ProtocolError, RoomId, RoomName};

/// The field separator used when none is configured.
pub const DEFAULT_DELIMITER: char = '|';

/// Number of fields an inbound line must split into.
const REQUIRED_FIELDS: usize = 4;

/// Converts lines to messages and back.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task for the life of the server.
pub trait Codec: Send + Sync + 'static {
    /// Parses one inbound line (without its terminator).
    ///
    /// # Errors
    /// Returns [`ProtocolError`] when the line does not have the required
    /// fields. Callers drop such lines silently.
    fn decode(&self, line: &str) -> Result<Inbound, ProtocolError>;

    /// Renders an outbound message as one line (without terminator).
    fn encode(&self, msg: &Outbound) -> String;
}

/// A [`Codec`] for lines made of fields separated by one character.
///
/// Only the first three separators split: the fourth field runs to the end
/// of the line, so chat text may contain the separator freely.
///
/// ```rust
/// use chatrelay_protocol::{Codec, DelimitedCodec, Outbound, Roster};
///
/// let codec = DelimitedCodec::default();
/// let inbound = codec.decode("A|R1|General|hi | there").unwrap();
/// assert_eq!(inbound.text, "hi | there");
///
/// let out = Outbound::echo(&inbound, Roster::new(vec!["A".into(), "B".into()]));
/// assert_eq!(codec.encode(&out), "A|R1|General|hi | there|A,B");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    delimiter: char,
}

impl DelimitedCodec {
    /// Creates a codec that splits on `delimiter`.
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// The configured field separator.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl Codec for DelimitedCodec {
    fn decode(&self, line: &str) -> Result<Inbound, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> =
            line.splitn(REQUIRED_FIELDS, self.delimiter).collect();

        let &[sender, room, room_name, text] = &fields[..] else {
            return Err(ProtocolError::Malformed {
                fields: fields.len(),
            });
        };

        if sender.is_empty() {
            return Err(ProtocolError::EmptySender);
        }

        Ok(Inbound {
            sender: ClientId::from(sender),
            room: RoomId::from(room),
            room_name: RoomName::from(room_name),
            text: text.to_owned(),
        })
    }

    fn encode(&self, msg: &Outbound) -> String {
        let d = self.delimiter;
        format!(
            "{}{d}{}{d}{}{d}{}{d}{}",
            msg.sender, msg.room, msg.room_name, msg.text, msg.roster
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Roster;

    #[test]
    fn test_decode_four_fields_match_literals() {
        let codec = DelimitedCodec::default();
        let msg = codec.decode("alice|R1|General|hello").unwrap();
        assert_eq!(msg.sender.as_str(), "alice");
        assert_eq!(msg.room.as_str(), "R1");
        assert_eq!(msg.room_name.as_str(), "General");
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn test_decode_keeps_delimiter_in_payload() {
        let codec = DelimitedCodec::default();
        let msg = codec.decode("A|R1|General|a|b|c").unwrap();
        assert_eq!(msg.text, "a|b|c");
    }

    #[test]
    fn test_decode_fewer_than_four_fields_is_malformed() {
        let codec = DelimitedCodec::default();
        assert_eq!(
            codec.decode("A|R1|General"),
            Err(ProtocolError::Malformed { fields: 3 })
        );
        assert_eq!(
            codec.decode("just text"),
            Err(ProtocolError::Malformed { fields: 1 })
        );
        assert_eq!(
            codec.decode(""),
            Err(ProtocolError::Malformed { fields: 1 })
        );
    }

    #[test]
    fn test_decode_empty_fields_are_still_fields() {
        let codec = DelimitedCodec::default();
        let msg = codec.decode("A|||").unwrap();
        assert_eq!(msg.room.as_str(), "");
        assert_eq!(msg.room_name.as_str(), "");
        assert_eq!(msg.text, "");
    }

    #[test]
    fn test_decode_empty_sender_is_rejected() {
        let codec = DelimitedCodec::default();
        assert_eq!(
            codec.decode("|R1|General|hello"),
            Err(ProtocolError::EmptySender)
        );
    }

    #[test]
    fn test_decode_strips_carriage_return() {
        let codec = DelimitedCodec::default();
        let msg = codec.decode("A|R1|General|hello\r").unwrap();
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn test_custom_delimiter() {
        let codec = DelimitedCodec::new('/');
        let msg = codec.decode("A/R1/General/입장").unwrap();
        assert_eq!(msg.text, "입장");
        // The default delimiter is plain text under another codec.
        let msg = codec.decode("A/R1/General/x|y").unwrap();
        assert_eq!(msg.text, "x|y");
        assert_eq!(codec.delimiter(), '/');
    }

    #[test]
    fn test_encode_appends_roster_field() {
        let codec = DelimitedCodec::default();
        let msg = Outbound {
            sender: "A".into(),
            room: "R1".into(),
            room_name: "General".into(),
            text: "enter".into(),
            roster: Roster::new(vec!["A".into(), "B".into()]),
        };
        assert_eq!(codec.encode(&msg), "A|R1|General|enter|A,B");
    }

    #[test]
    fn test_encode_empty_roster_leaves_trailing_field_empty() {
        let codec = DelimitedCodec::new('/');
        let msg = Outbound {
            sender: "A".into(),
            room: "R1".into(),
            room_name: "General".into(),
            text: "leave".into(),
            roster: Roster::default(),
        };
        assert_eq!(codec.encode(&msg), "A/R1/General/leave/");
    }
}
