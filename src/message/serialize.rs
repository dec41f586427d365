//! Render a [`Message`] back to its wire form.

use std::fmt::Write as _;

use super::tags;
use super::Message;
use crate::error::MessageParseError;
use crate::util::truncate_utf8_safe;

/// Wire line budget, excluding the `\r\n` the codec appends.
const MAX_WIRE_LEN: usize = 510;

impl Message {
    /// Render this message as a wire line, without the trailing `\r\n`.
    ///
    /// Returns an error if the encoded tag block would exceed the wire
    /// limit. The resulting line is truncated to [`MAX_WIRE_LEN`] octets,
    /// on a UTF-8 boundary, if it would otherwise exceed it.
    pub fn to_wire(&self) -> Result<String, MessageParseError> {
        let mut out = String::new();

        if !self.tags.is_empty() {
            out.push('@');
            out.push_str(&tags::encode_tags(&self.tags)?);
            out.push(' ');
        }

        if let Some(source) = &self.source {
            write!(out, ":{source} ").expect("String writer is infallible");
        }

        out.push_str(&self.command);

        for param in &self.params {
            out.push(' ');
            out.push_str(param);
        }

        if let Some(trailing) = &self.trailing {
            out.push_str(" :");
            out.push_str(trailing);
        }

        if out.len() > MAX_WIRE_LEN {
            out.truncate(truncate_utf8_safe(&out, MAX_WIRE_LEN).len());
        }

        Ok(out)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_wire() {
            Ok(wire) => f.write_str(&wire),
            Err(e) => write!(f, "<unencodable message: {e}>"),
        }
    }
}
