//! The wire-format [`Message`] type: a tolerant IRCv3 codec built on
//! [`nom`](nom_parser) for parsing and hand-written serialization.

mod ctcp;
mod nom_parser;
mod parse;
mod serialize;
pub mod tags;

pub use ctcp::{decode as decode_ctcp, encode as encode_ctcp, Ctcp};
pub use tags::Tag;

use std::borrow::Cow;

use crate::prefix::Source;
use crate::validation::strip_protocol_control_chars;

/// A single IRC protocol message: an optional tag block, an optional
/// source, a command, positional parameters, and an optional trailing
/// parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// IRCv3 message tags, in wire order.
    pub tags: Vec<Tag>,
    /// The `:nick!user@host` or `:server` prefix, if present.
    pub source: Option<Source>,
    /// The command name or three-digit numeric, upper-cased.
    pub command: String,
    /// Space-separated parameters, not including the trailing parameter.
    pub params: Vec<String>,
    /// The `:`-introduced trailing parameter, if present.
    pub trailing: Option<String>,
    /// Whether `trailing` was present and empty (`PRIVMSG #ch :`), as
    /// opposed to absent entirely.
    pub empty_trailing: bool,
    /// Whether this message carries credentials and should be redacted
    /// from logs (`PASS`, `AUTHENTICATE`, `OPER`).
    pub sensitive: bool,
    /// Whether this message is an echo of our own outbound message,
    /// reflected back under the `echo-message` capability.
    pub echo: bool,
    /// The original wire line, if this message was parsed rather than
    /// constructed.
    pub raw: Option<String>,
}

impl Message {
    /// Build a message with just a command and parameters, no tags, source,
    /// or trailing.
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Message {
        Message {
            tags: Vec::new(),
            source: None,
            command: command.into(),
            params,
            trailing: None,
            empty_trailing: false,
            sensitive: false,
            echo: false,
            raw: None,
        }
    }

    /// Build a message with a trailing parameter.
    pub fn with_trailing(
        command: impl Into<String>,
        params: Vec<String>,
        trailing: impl Into<String>,
    ) -> Message {
        let trailing = trailing.into();
        let empty_trailing = trailing.is_empty();
        Message {
            trailing: Some(trailing),
            empty_trailing,
            ..Message::new(command, params)
        }
    }

    /// Look up a tag's value by key (ignoring the `client_only` marker).
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .and_then(|t| t.value.as_deref())
    }

    /// Whether this message carries the named tag at all (valueless or
    /// not).
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.iter().any(|t| t.key == key)
    }

    /// All parameters, including the trailing one if present, in wire
    /// order. Useful when a caller doesn't care about the middle/trailing
    /// distinction.
    pub fn all_params(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.params.iter().map(String::as_str).collect();
        if let Some(trailing) = &self.trailing {
            out.push(trailing);
        }
        out
    }

    /// If this is a `PRIVMSG`/`NOTICE` whose trailing parameter is a CTCP
    /// envelope, decode it.
    pub fn ctcp(&self) -> Option<Ctcp> {
        self.trailing.as_deref().and_then(decode_ctcp)
    }

    /// Strip NUL/CR/LF from parameters and the trailing parameter in
    /// place. Outbound messages built from untrusted text (handler-supplied
    /// PRIVMSG bodies, topics, ...) should be sanitized before encoding so
    /// a caller can never smuggle a second line onto the wire.
    pub fn sanitize(&mut self) {
        for param in &mut self.params {
            if let Cow::Owned(cleaned) = strip_protocol_control_chars(param) {
                *param = cleaned;
            }
        }
        if let Some(trailing) = &mut self.trailing {
            if let Cow::Owned(cleaned) = strip_protocol_control_chars(trailing) {
                *trailing = cleaned;
            }
        }
    }
}
