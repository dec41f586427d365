//! `Cmd.*` family: well-formed command builders with input validation.
//!
//! These mirror the idiomatic `ClientExt` pattern of building a [`Message`]
//! from friendly arguments, but validate targets up front and return
//! [`Error::InvalidTarget`] synchronously rather than producing a message
//! the server will reject.

use crate::error::{Error, Result};
use crate::message::{encode_ctcp, Message};
use crate::validation::{validate_channel_name, validate_nickname};

const MAX_LINE_LEN: usize = 512;
/// Conservative budget reserved for the worst-case `:nick!user@host ` source
/// prefix a server might prepend before relaying our own PRIVMSG back to us,
/// leaving room under the 512-octet wire limit without needing to know the
/// server's actual NICKLEN/USERLEN/HOSTLEN until a connection is live.
const SOURCE_PREFIX_BUDGET: usize = 100;

fn require_target(target: &str) -> Result<()> {
    if target.is_empty() {
        return Err(Error::InvalidTarget(target.to_string()));
    }
    let is_channel = target
        .chars()
        .next()
        .map(|c| "#&+!*".contains(c))
        .unwrap_or(false);
    let validated = if is_channel {
        validate_channel_name(target)
    } else {
        validate_nickname(target)
    };
    validated.map_err(|e| Error::InvalidTarget(format!("{target}: {e}")))
}

/// Well-formed command constructors, named after the wire command they
/// build. Each validates its target(s) and returns [`Error::InvalidTarget`]
/// on malformed input rather than building an invalid message.
pub struct Cmd;

impl Cmd {
    /// `NICK newnick`
    pub fn nick(nickname: &str) -> Result<Message> {
        validate_nickname(nickname).map_err(|e| Error::InvalidTarget(format!("{nickname}: {e}")))?;
        Ok(Message::new("NICK", vec![nickname.to_string()]))
    }

    /// `JOIN #chan1,#chan2`
    pub fn join(channels: &[&str]) -> Result<Message> {
        for c in channels {
            require_target(c)?;
        }
        Ok(Message::new("JOIN", vec![channels.join(",")]))
    }

    /// `JOIN #chan1,#chan2 key1,key2`
    pub fn join_key(channels: &[&str], keys: &[&str]) -> Result<Message> {
        for c in channels {
            require_target(c)?;
        }
        Ok(Message::new(
            "JOIN",
            vec![channels.join(","), keys.join(",")],
        ))
    }

    /// `PART #chan1,#chan2 [:reason]`
    ///
    /// Always emits `PART`, never `JOIN`; some client libraries have
    /// historically mixed these up when the reason argument is omitted.
    pub fn part(channels: &[&str], reason: Option<&str>) -> Result<Message> {
        for c in channels {
            require_target(c)?;
        }
        let chanlist = channels.join(",");
        Ok(match reason {
            Some(r) if !r.is_empty() => {
                Message::with_trailing("PART", vec![chanlist], r.to_string())
            }
            _ => Message::new("PART", vec![chanlist]),
        })
    }

    /// `PRIVMSG target :text`, split into multiple messages if `text` would
    /// not fit on one wire line.
    pub fn message(target: &str, text: &str) -> Result<Vec<Message>> {
        require_target(target)?;
        Ok(split_message("PRIVMSG", target, text))
    }

    /// `PRIVMSG target :\x01ACTION text\x01`
    pub fn action(target: &str, text: &str) -> Result<Message> {
        require_target(target)?;
        Ok(Message::with_trailing(
            "PRIVMSG",
            vec![target.to_string()],
            encode_ctcp("ACTION", Some(text)),
        ))
    }

    /// `NOTICE target :text`, split across multiple lines if needed.
    pub fn notice(target: &str, text: &str) -> Result<Vec<Message>> {
        require_target(target)?;
        Ok(split_message("NOTICE", target, text))
    }

    /// `TOPIC #chan` (query) or `TOPIC #chan :new topic` (set).
    pub fn topic(channel: &str, new_topic: Option<&str>) -> Result<Message> {
        require_target(channel)?;
        Ok(match new_topic {
            Some(t) => Message::with_trailing("TOPIC", vec![channel.to_string()], t.to_string()),
            None => Message::new("TOPIC", vec![channel.to_string()]),
        })
    }

    /// `WHO mask`
    pub fn who(mask: &str) -> Message {
        Message::new("WHO", vec![mask.to_string()])
    }

    /// `WHOIS nick`
    pub fn whois(nick: &str) -> Result<Message> {
        validate_nickname(nick).map_err(|e| Error::InvalidTarget(format!("{nick}: {e}")))?;
        Ok(Message::new("WHOIS", vec![nick.to_string()]))
    }

    /// `WHOWAS nick`
    pub fn whowas(nick: &str) -> Result<Message> {
        validate_nickname(nick).map_err(|e| Error::InvalidTarget(format!("{nick}: {e}")))?;
        Ok(Message::new("WHOWAS", vec![nick.to_string()]))
    }

    /// `PING token`
    pub fn ping(token: &str) -> Message {
        Message::new("PING", vec![token.to_string()])
    }

    /// `PONG token`
    pub fn pong(token: &str) -> Message {
        Message::new("PONG", vec![token.to_string()])
    }

    /// `OPER name password`
    pub fn oper(name: &str, password: &str) -> Message {
        Message::new("OPER", vec![name.to_string(), password.to_string()])
    }

    /// `KICK #chan nick [:comment]`
    pub fn kick(channel: &str, nick: &str, comment: Option<&str>) -> Result<Message> {
        require_target(channel)?;
        validate_nickname(nick).map_err(|e| Error::InvalidTarget(format!("{nick}: {e}")))?;
        Ok(match comment {
            Some(c) if !c.is_empty() => Message::with_trailing(
                "KICK",
                vec![channel.to_string(), nick.to_string()],
                c.to_string(),
            ),
            _ => Message::new("KICK", vec![channel.to_string(), nick.to_string()]),
        })
    }

    /// `INVITE nick #chan`
    pub fn invite(nick: &str, channel: &str) -> Result<Message> {
        validate_nickname(nick).map_err(|e| Error::InvalidTarget(format!("{nick}: {e}")))?;
        require_target(channel)?;
        Ok(Message::new(
            "INVITE",
            vec![nick.to_string(), channel.to_string()],
        ))
    }

    /// `AWAY :reason`, or plain `AWAY` to unset (same as [`Cmd::back`]).
    pub fn away(reason: &str) -> Message {
        if reason.is_empty() {
            Message::new("AWAY", vec![])
        } else {
            Message::with_trailing("AWAY", vec![], reason.to_string())
        }
    }

    /// `AWAY` with no argument, clearing away status.
    pub fn back() -> Message {
        Message::new("AWAY", vec![])
    }

    /// `LIST [#chan1,#chan2]`
    pub fn list(channels: &[&str]) -> Message {
        if channels.is_empty() {
            Message::new("LIST", vec![])
        } else {
            Message::new("LIST", vec![channels.join(",")])
        }
    }

    /// Send an arbitrary CTCP query wrapped in a `PRIVMSG`.
    pub fn send_ctcp(target: &str, verb: &str, arg: Option<&str>) -> Result<Message> {
        require_target(target)?;
        Ok(Message::with_trailing(
            "PRIVMSG",
            vec![target.to_string()],
            encode_ctcp(verb, arg),
        ))
    }

    /// Send a CTCP reply wrapped in a `NOTICE`, per convention.
    pub fn send_ctcp_reply(target: &str, verb: &str, arg: Option<&str>) -> Result<Message> {
        require_target(target)?;
        Ok(Message::with_trailing(
            "NOTICE",
            vec![target.to_string()],
            encode_ctcp(verb, arg),
        ))
    }
}

/// Split `text` into one or more `command target :chunk` messages, each
/// serialising to at most [`MAX_LINE_LEN`] octets once a worst-case source
/// prefix is accounted for. Splits prefer the last whitespace boundary
/// within the window, falling back to the last valid `char` boundary.
fn split_message(command: &str, target: &str, text: &str) -> Vec<Message> {
    let overhead = command.len() + 1 + target.len() + 2 + 2; // "CMD target :" + CRLF
    let budget = MAX_LINE_LEN
        .saturating_sub(SOURCE_PREFIX_BUDGET)
        .saturating_sub(overhead);

    if text.len() <= budget || budget == 0 {
        return vec![Message::with_trailing(
            command,
            vec![target.to_string()],
            text.to_string(),
        )];
    }

    let mut messages = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= budget {
            messages.push(Message::with_trailing(
                command,
                vec![target.to_string()],
                remaining.to_string(),
            ));
            break;
        }

        let mut split_at = floor_char_boundary(remaining, budget);
        if let Some(space) = remaining[..split_at].rfind(' ') {
            if space > 0 {
                split_at = space;
            }
        }
        if split_at == 0 {
            split_at = floor_char_boundary(remaining, budget.max(1));
        }

        let (chunk, rest) = remaining.split_at(split_at);
        messages.push(Message::with_trailing(
            command,
            vec![target.to_string()],
            chunk.to_string(),
        ));
        remaining = rest.trim_start_matches(' ');
    }

    messages
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
