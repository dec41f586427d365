//! CTCP (Client-To-Client Protocol) envelope encode/decode.
//!
//! A CTCP message is carried inside a `PRIVMSG`/`NOTICE` trailing parameter,
//! delimited by `\x01` (SOH), with the verb and optional argument
//! space-separated: `\x01ACTION waves\x01`.

const DELIM: char = '\x01';

/// A decoded CTCP request/reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctcp {
    /// The verb, e.g. `ACTION`, `VERSION`, `PING`.
    pub verb: String,
    /// The remainder of the envelope after the verb, if any.
    pub arg: Option<String>,
}

/// If `text` is a complete CTCP envelope, decode it.
pub fn decode(text: &str) -> Option<Ctcp> {
    let inner = text.strip_prefix(DELIM)?.strip_suffix(DELIM)?;
    let (verb, arg) = match inner.split_once(' ') {
        Some((v, a)) => (v, Some(a.to_string())),
        None => (inner, None),
    };
    if verb.is_empty() {
        return None;
    }
    Some(Ctcp {
        verb: verb.to_string(),
        arg,
    })
}

/// Encode a CTCP verb/argument pair into its wire envelope.
pub fn encode(verb: &str, arg: Option<&str>) -> String {
    let mut out = String::new();
    out.push(DELIM);
    out.push_str(verb);
    if let Some(arg) = arg {
        out.push(' ');
        out.push_str(arg);
    }
    out.push(DELIM);
    out
}
