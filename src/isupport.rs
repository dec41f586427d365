//! ISUPPORT (numeric 005) token tracking.
//!
//! Servers announce capabilities across one or more `005` lines as the
//! connection registers; tokens accumulate into a single owned map so later
//! lines can refine or add to earlier ones (per RFC, a token may be
//! re-announced, and the latest value wins).

use std::collections::HashMap;

use crate::message::Message;

/// Accumulated ISUPPORT tokens for the current connection.
#[derive(Debug, Clone, Default)]
pub struct Isupport {
    tokens: HashMap<String, Option<String>>,
}

impl Isupport {
    /// Fresh, empty tracker (the RFC 2812 defaults apply until the server
    /// says otherwise).
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the tokens carried by a `005` (RPL_ISUPPORT) message.
    ///
    /// Per convention the first parameter is the target nick and the last
    /// is the human-readable "are supported by this server" trailing; both
    /// are ignored.
    pub fn apply(&mut self, msg: &Message) {
        if msg.command != "005" {
            return;
        }
        let params = &msg.params;
        if params.len() < 2 {
            return;
        }
        for token in &params[1..] {
            if token.starts_with('-') {
                self.tokens.remove(&token[1..].to_ascii_uppercase());
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v.to_string())),
                None => (token.as_str(), None),
            };
            self.tokens.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// Look up a raw token value. `Some(None)` means the token is present
    /// but valueless; `None` means the token was never announced.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.tokens
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// Whether a token was announced at all.
    pub fn has(&self, key: &str) -> bool {
        self.tokens.contains_key(&key.to_ascii_uppercase())
    }

    /// `CASEMAPPING`, e.g. `"rfc1459"` or `"ascii"`.
    pub fn casemapping(&self) -> Option<&str> {
        self.get("CASEMAPPING").flatten()
    }

    /// `CHANTYPES`, the set of valid channel-name prefix characters.
    pub fn chantypes(&self) -> &str {
        self.get("CHANTYPES").flatten().unwrap_or("#&")
    }

    /// `NETWORK`, the server-declared network name.
    pub fn network(&self) -> Option<&str> {
        self.get("NETWORK").flatten()
    }

    /// `PREFIX`, the channel-membership-mode/display-symbol mapping.
    pub fn prefix(&self) -> PrefixSpec {
        self.get("PREFIX")
            .flatten()
            .and_then(PrefixSpec::parse)
            .unwrap_or(PrefixSpec {
                modes: "ov".to_string(),
                prefixes: "@+".to_string(),
            })
    }

    /// `CHANMODES`, the four mode categories (list/always-arg/set-arg/flag).
    pub fn chanmodes(&self) -> Option<ChanModes> {
        self.get("CHANMODES").flatten().and_then(ChanModes::parse)
    }

    /// Whether ban-exception (`EXCEPTS`) support was announced, and which
    /// letter it uses (default `e`).
    pub fn excepts_mode(&self) -> Option<char> {
        self.get("EXCEPTS")
            .map(|v| v.and_then(|s| s.chars().next()).unwrap_or('e'))
    }

    /// Whether invite-exception (`INVEX`) support was announced, and which
    /// letter it uses (default `I`).
    pub fn invex_mode(&self) -> Option<char> {
        self.get("INVEX")
            .map(|v| v.and_then(|s| s.chars().next()).unwrap_or('I'))
    }

    /// `NICKLEN`, the maximum nickname length (default 9, per RFC 2812).
    pub fn nick_len(&self) -> usize {
        self.get("NICKLEN")
            .flatten()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9)
    }

    /// `CHANNELLEN`, the maximum channel name length (default 50).
    pub fn channel_len(&self) -> usize {
        self.get("CHANNELLEN")
            .flatten()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50)
    }

    /// `TARGMAX`, the per-command maximum target count.
    pub fn targmax(&self) -> Option<TargMax> {
        self.get("TARGMAX").flatten().and_then(TargMax::parse)
    }

    /// `MAXLIST`, the per-mode-letter list-size cap.
    pub fn maxlist(&self) -> Option<MaxList> {
        self.get("MAXLIST").flatten().and_then(MaxList::parse)
    }
}

/// Parsed `PREFIX` token: membership mode letters paired with their
/// display-symbol prefixes, ordered from highest to lowest privilege.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixSpec {
    /// Mode letters, e.g. `"ov"`.
    pub modes: String,
    /// Display prefixes, e.g. `"@+"`, aligned index-for-index with `modes`.
    pub prefixes: String,
}

impl PrefixSpec {
    /// Parse a `(modes)prefixes` token, e.g. `"(ov)@+"`.
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let close = open + 1 + s[open + 1..].find(')')?;
        let modes = &s[open + 1..close];
        let prefixes = &s[close + 1..];
        if modes.is_empty() || prefixes.len() != modes.len() {
            return None;
        }
        Some(PrefixSpec {
            modes: modes.to_string(),
            prefixes: prefixes.to_string(),
        })
    }

    /// The display prefix for a membership mode letter, if any (e.g. `'o'`
    /// -> `Some('@')`).
    pub fn prefix_for(&self, mode: char) -> Option<char> {
        self.modes
            .chars()
            .position(|m| m == mode)
            .and_then(|i| self.prefixes.chars().nth(i))
    }

    /// The membership mode letter for a display prefix, if any (e.g. `'@'`
    /// -> `Some('o')`).
    pub fn mode_for(&self, prefix: char) -> Option<char> {
        self.prefixes
            .chars()
            .position(|p| p == prefix)
            .and_then(|i| self.modes.chars().nth(i))
    }
}

/// Parsed `CHANMODES` token: the four RFC-defined mode categories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanModes {
    /// Type A: always takes an argument, and adds to a list (bans, etc).
    pub a: String,
    /// Type B: always takes an argument (key, etc).
    pub b: String,
    /// Type C: takes an argument only when being set.
    pub c: String,
    /// Type D: never takes an argument.
    pub d: String,
}

impl ChanModes {
    /// Parse a comma-separated four-field `CHANMODES` token.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(4, ',');
        Some(ChanModes {
            a: parts.next()?.to_string(),
            b: parts.next()?.to_string(),
            c: parts.next()?.to_string(),
            d: parts.next()?.to_string(),
        })
    }

    /// Whether `mode` requires an argument when being set.
    pub fn takes_arg_on_set(&self, mode: char) -> bool {
        self.a.contains(mode) || self.b.contains(mode) || self.c.contains(mode)
    }

    /// Whether `mode` requires an argument when being unset.
    pub fn takes_arg_on_unset(&self, mode: char) -> bool {
        self.a.contains(mode) || self.b.contains(mode)
    }
}

/// Parsed `TARGMAX` token: per-command maximum target counts.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TargMax {
    entries: Vec<(String, Option<usize>)>,
}

impl TargMax {
    /// Parse a comma-separated `CMD:N` list.
    pub fn parse(s: &str) -> Option<Self> {
        let mut entries = Vec::new();
        for part in s.split(',') {
            if part.is_empty() {
                continue;
            }
            match part.split_once(':') {
                Some((cmd, num)) if !cmd.is_empty() => {
                    entries.push((cmd.to_ascii_uppercase(), num.parse().ok()));
                }
                _ => {}
            }
        }
        Some(TargMax { entries })
    }

    /// The maximum target count for a command, if a limit is known.
    /// `Some(None)` means the command was listed with no numeric limit
    /// (unlimited).
    pub fn get(&self, cmd: &str) -> Option<Option<usize>> {
        let cmd = cmd.to_ascii_uppercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == cmd)
            .map(|(_, v)| *v)
    }
}

/// Parsed `MAXLIST` token: per-mode-letter list size caps.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MaxList {
    entries: Vec<(char, usize)>,
}

impl MaxList {
    /// Parse a comma-separated `modes:N` list.
    pub fn parse(s: &str) -> Option<Self> {
        let mut entries: Vec<(char, usize)> = Vec::new();
        for part in s.split(',') {
            if part.is_empty() {
                continue;
            }
            let (modes, limit_str) = part.split_once(':')?;
            let Ok(limit) = limit_str.parse::<usize>() else {
                continue;
            };
            for ch in modes.chars() {
                entries.retain(|(c, _)| *c != ch);
                entries.push((ch, limit));
            }
        }
        Some(MaxList { entries })
    }

    /// The list-size cap for a mode letter, if known.
    pub fn limit_for(&self, mode: char) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|(c, _)| *c == mode)
            .map(|(_, n)| *n)
    }
}

/// Builds synthetic `005` lines for tests.
#[derive(Debug, Clone, Default)]
pub struct IsupportBuilder {
    tokens: Vec<String>,
}

impl IsupportBuilder {
    /// Start with no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `NETWORK=name`.
    pub fn network(mut self, name: &str) -> Self {
        self.tokens.push(format!("NETWORK={name}"));
        self
    }

    /// Append `CHANTYPES=types`.
    pub fn chantypes(mut self, types: &str) -> Self {
        self.tokens.push(format!("CHANTYPES={types}"));
        self
    }

    /// Append `CHANMODES=a,b,c,d`.
    pub fn chanmodes(mut self, modes: &str) -> Self {
        self.tokens.push(format!("CHANMODES={modes}"));
        self
    }

    /// Append `PREFIX=(letters)symbols`.
    pub fn prefix(mut self, letters: &str, symbols: &str) -> Self {
        self.tokens.push(format!("PREFIX=({letters}){symbols}"));
        self
    }

    /// Append `CASEMAPPING=mapping`.
    pub fn casemapping(mut self, mapping: &str) -> Self {
        self.tokens.push(format!("CASEMAPPING={mapping}"));
        self
    }

    /// Append a bare or valued custom token.
    pub fn custom(mut self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.tokens.push(format!("{key}={v}")),
            None => self.tokens.push(key.to_string()),
        }
        self
    }

    /// Build a complete `005` message addressed to `nick`.
    pub fn build(self, nick: &str) -> Message {
        let mut params = vec![nick.to_string()];
        params.extend(self.tokens);
        Message::with_trailing("005", params, "are supported by this server")
    }
}
