//! The `Source` (message prefix) type: `nick!user@host` or a bare server
//! name.

use crate::casemap::irc_eq;

/// The sender of a message, as carried in the optional `:prefix` before the
/// command.
///
/// A source is either a server name (`irc.example.net`) or a full or partial
/// hostmask (`nick`, `nick@host`, `nick!user@host`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Nickname, or the server name for server-originated messages.
    pub name: String,
    /// Username/ident, if present.
    pub user: Option<String>,
    /// Hostname, if present.
    pub host: Option<String>,
}

impl Source {
    /// Parse a raw prefix string (the part after `:`, before the first
    /// space) into its name/user/host components.
    pub fn parse(raw: &str) -> Source {
        let (name_and_user, host) = match raw.split_once('@') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (raw, None),
        };
        let (name, user) = match name_and_user.split_once('!') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (name_and_user, None),
        };
        Source {
            name: name.to_string(),
            user,
            host,
        }
    }

    /// Whether this source looks like a server name rather than a client
    /// hostmask: no `user`/`host` split occurred and the name contains a
    /// dot, per the heuristic RFC 2812 clients use to tell servers apart
    /// from nicknames (which cannot contain `.`).
    pub fn is_server(&self) -> bool {
        self.user.is_none() && self.host.is_none() && self.name.contains('.')
    }

    /// Whether this source carries a full `nick!user@host` hostmask.
    pub fn is_hostmask(&self) -> bool {
        self.user.is_some() && self.host.is_some()
    }

    /// Compare names under RFC 1459 case mapping, ignoring user/host.
    pub fn nick_eq(&self, nick: &str) -> bool {
        irc_eq(&self.name, nick)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_hostmask() {
        let s = Source::parse("nick!user@host.example.com");
        assert_eq!(s.name, "nick");
        assert_eq!(s.user.as_deref(), Some("user"));
        assert_eq!(s.host.as_deref(), Some("host.example.com"));
        assert!(s.is_hostmask());
        assert!(!s.is_server());
    }

    #[test]
    fn parses_bare_nick() {
        let s = Source::parse("nick");
        assert_eq!(s.name, "nick");
        assert!(s.user.is_none());
        assert!(s.host.is_none());
    }

    #[test]
    fn recognizes_server_name() {
        let s = Source::parse("irc.example.net");
        assert!(s.is_server());
    }

    #[test]
    fn round_trips_display() {
        let s = Source::parse("nick!user@host");
        assert_eq!(s.to_string(), "nick!user@host");
    }
}
