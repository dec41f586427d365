//! `tokio_util::codec` framing over the wire [`Message`] type: splits
//! inbound bytes on `\r\n`/`\n`, parses each line, and serializes outbound
//! messages back to `CRLF`-terminated lines.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, MessageParseError};
use crate::message::Message;

/// Maximum accepted line length before tags, matching the 512-octet wire
/// budget; tag blocks get their own allowance inside [`Message::parse`].
const MAX_LINE_LEN: usize = 8192;

/// A `tokio_util` codec parsing/serializing one [`Message`] per line.
#[derive(Debug, Default)]
pub struct IrcCodec {
    _private: (),
}

impl IrcCodec {
    /// A new codec instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Error> {
        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LINE_LEN {
                return Err(Error::ProtocolParse(MessageParseError::TagsTooLong(src.len())));
            }
            return Ok(None);
        };

        let line = src.split_to(newline + 1);
        src.reserve(0);
        let text = String::from_utf8_lossy(&line[..newline]);
        let message = Message::parse(text.trim_end_matches('\r'))?;
        Ok(Some(message))
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = Error;

    fn encode(&mut self, mut item: Message, dst: &mut BytesMut) -> Result<(), Error> {
        item.sanitize();
        let wire = item.to_wire()?;
        dst.reserve(wire.len() + 2);
        dst.put_slice(wire.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_line_at_a_time() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("PING :abc\r\nPING :def\r\n");

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.trailing.as_deref(), Some("abc"));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.trailing.as_deref(), Some("def"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_returns_none_on_partial_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("PING :ab");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.remaining(), 8);
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::new("PING", vec!["abc".into()]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PING abc\r\n");
    }

    #[test]
    fn encode_sanitizes_embedded_crlf_before_writing() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::with_trailing("PRIVMSG", vec!["#ch".into()], "hi\r\nQUIT :bye");
        codec.encode(msg, &mut buf).unwrap();
        let text = String::from_utf8(buf.to_vec()).unwrap();
        assert_eq!(text, "PRIVMSG #ch :hiQUIT :bye\r\n");
    }
}
