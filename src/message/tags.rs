//! IRCv3 message tag escaping and the `Tag` wire representation.

use std::fmt::{Result as FmtResult, Write};

use crate::error::MessageParseError;

/// Maximum size of the tag block, including the leading `@` and the
/// trailing space separating it from the rest of the line.
pub const MAX_TAGS_LEN: usize = 511;

/// Maximum length of the encoded tag body (what [`encode_tags`] produces),
/// accounting for the `@` and trailing space that frame it on the wire.
const MAX_TAGS_BODY_LEN: usize = MAX_TAGS_LEN - 2;

/// A single IRCv3 message tag.
///
/// `key` includes any vendor prefix (`vendor.example.com/foo`) but not the
/// leading `+` client-tag marker, which is tracked separately in
/// [`Tag::client_only`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Whether the key carried a leading `+` (a client-only tag).
    pub client_only: bool,
    /// The tag key, including any `vendor/` prefix.
    pub key: String,
    /// The tag value, if the key had an `=` (an empty string after `=` is
    /// `Some(String::new())`, distinct from a bare key which is `None`).
    pub value: Option<String>,
}

impl Tag {
    /// Build a valueless tag.
    pub fn new(key: impl Into<String>) -> Self {
        Tag {
            client_only: false,
            key: key.into(),
            value: None,
        }
    }

    /// Build a tag carrying a value.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            client_only: false,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    fn write_wire(&self, f: &mut dyn Write) -> FmtResult {
        if self.client_only {
            f.write_char('+')?;
        }
        f.write_str(&self.key)?;
        if let Some(value) = &self.value {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
        Ok(())
    }
}

/// Parse the raw tag block (without the leading `@`) into a tag list.
///
/// Tags are `;`-separated `[+]key[=value]` tokens, per the IRCv3
/// message-tags spec.
pub fn parse_tags(raw: &str) -> Result<Vec<Tag>, MessageParseError> {
    let mut tags = Vec::new();
    for token in raw.split(';') {
        if token.is_empty() {
            continue;
        }
        let (key_part, value) = match token.split_once('=') {
            Some((k, v)) => (k, Some(unescape_tag_value(v))),
            None => (token, None),
        };
        let (client_only, key) = match key_part.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, key_part),
        };
        if key.is_empty() || !is_valid_tag_key(key) {
            return Err(MessageParseError::InvalidTagKey(key_part.to_string()));
        }
        tags.push(Tag {
            client_only,
            key: key.to_string(),
            value,
        });
    }
    Ok(tags)
}

/// Serialize a tag list back to its wire form (without the leading `@`).
pub fn encode_tags(tags: &[Tag]) -> Result<String, MessageParseError> {
    let mut out = String::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        tag.write_wire(&mut out).expect("String writer is infallible");
    }
    if out.len() > MAX_TAGS_BODY_LEN {
        return Err(MessageParseError::TagsTooLong(out.len()));
    }
    Ok(out)
}

fn is_valid_tag_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/' || c == '.' || c == '_')
}

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`].
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

#[cfg(test)]
mod tag_tests {
    use super::*;

    #[test]
    fn escape_round_trips() {
        let mut out = String::new();
        escape_tag_value(&mut out, "a;b c\\d\r\n").unwrap();
        assert_eq!(out, "a\\:b\\sc\\\\d\\r\\n");
        assert_eq!(unescape_tag_value(&out), "a;b c\\d\r\n");
    }

    #[test]
    fn parses_bare_and_valued_tags() {
        let tags = parse_tags("time=2023-01-01T00:00:00Z;+draft/reply;id=abc123").unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].key, "time");
        assert_eq!(tags[0].value.as_deref(), Some("2023-01-01T00:00:00Z"));
        assert!(tags[1].client_only);
        assert_eq!(tags[1].key, "draft/reply");
        assert!(tags[1].value.is_none());
    }

    #[test]
    fn rejects_invalid_key() {
        assert!(parse_tags("bad key=1").is_err());
    }

    #[test]
    fn encode_round_trips_through_parse() {
        let tags = vec![
            Tag::with_value("time", "now"),
            Tag {
                client_only: true,
                key: "draft/typing".to_string(),
                value: None,
            },
        ];
        let encoded = encode_tags(&tags).unwrap();
        assert_eq!(encoded, "time=now;+draft/typing");
        let reparsed = parse_tags(&encoded).unwrap();
        assert_eq!(reparsed, tags);
    }

    #[test]
    fn accepts_underscore_in_key() {
        let tags = parse_tags("foo_bar=x").unwrap();
        assert_eq!(tags[0].key, "foo_bar");
        assert_eq!(tags[0].value.as_deref(), Some("x"));
    }
}
