//! IRCv3 capability negotiation: known capability names and the client-side
//! tracking of available/enabled sets as `CAP LS`/`ACK`/`NAK`/`NEW`/`DEL`
//! arrive.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>
//! - Individual capability specifications: <https://ircv3.net/irc/>

use std::collections::{HashMap, HashSet};

/// Known IRCv3 capability types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Show all user prefix modes in NAMES
    MultiPrefix,
    /// SASL authentication
    Sasl,
    /// Notify of account login/logout
    AccountNotify,
    /// Notify of away status changes
    AwayNotify,
    /// Extended JOIN with account and realname
    ExtendedJoin,
    /// MONITOR command for presence tracking
    Monitor,
    /// Add account tag to messages
    AccountTag,
    /// Message batching
    Batch,
    /// Notify of capability changes
    CapNotify,
    /// Notify of hostname changes
    ChgHost,
    /// Echo messages back to sender
    EchoMessage,
    /// Notify of channel invites
    InviteNotify,
    /// Server-time message tags
    ServerTime,
    /// Full nick!user@host in NAMES
    UserhostInNames,
    /// SETNAME command for changing realname
    SetName,
    /// Client message tags support
    MessageTags,
    /// Unique message IDs
    Msgid,
    /// Label request/response correlation
    LabeledResponse,
    /// FAIL/WARN/NOTE standard replies
    StandardReplies,
    /// Strict Transport Security
    Sts,
    /// Unknown/custom capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MultiPrefix => "multi-prefix",
            Self::Sasl => "sasl",
            Self::AccountNotify => "account-notify",
            Self::AwayNotify => "away-notify",
            Self::ExtendedJoin => "extended-join",
            Self::Monitor => "monitor",
            Self::AccountTag => "account-tag",
            Self::Batch => "batch",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::EchoMessage => "echo-message",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::UserhostInNames => "userhost-in-names",
            Self::SetName => "setname",
            Self::MessageTags => "message-tags",
            Self::Msgid => "msgid",
            Self::LabeledResponse => "labeled-response",
            Self::StandardReplies => "standard-replies",
            Self::Sts => "sts",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Self::MultiPrefix,
            "sasl" => Self::Sasl,
            "account-notify" => Self::AccountNotify,
            "away-notify" => Self::AwayNotify,
            "extended-join" => Self::ExtendedJoin,
            "monitor" => Self::Monitor,
            "account-tag" => Self::AccountTag,
            "batch" => Self::Batch,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "echo-message" => Self::EchoMessage,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            "userhost-in-names" => Self::UserhostInNames,
            "setname" => Self::SetName,
            "message-tags" => Self::MessageTags,
            "msgid" => Self::Msgid,
            "labeled-response" => Self::LabeledResponse,
            "standard-replies" => Self::StandardReplies,
            "sts" => Self::Sts,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Apply a space-separated list of `CAP` changes (`-name` removes, bare or
/// `name=value` adds) to an active set. Returns `true` if anything changed.
pub fn apply_changes(capabilities: &mut HashSet<String>, changes: &str) -> bool {
    let mut modified = false;
    for token in changes.split_whitespace() {
        if let Some(name) = token.strip_prefix('-') {
            if capabilities.remove(name) {
                modified = true;
            }
        } else {
            let name = token.split('=').next().unwrap_or(token);
            if capabilities.insert(name.to_string()) {
                modified = true;
            }
        }
    }
    modified
}

/// An STS (`draft/sts` / `sts`) policy announced by the server, tracked
/// in-memory for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StsPolicy {
    /// TLS port to upgrade to.
    pub port: Option<u16>,
    /// How long (seconds) this policy should be remembered.
    pub duration: Option<u64>,
}

impl StsPolicy {
    /// Parse an `sts` capability value, e.g. `"port=6697,duration=2592000"`.
    pub fn parse(value: &str) -> StsPolicy {
        let mut port = None;
        let mut duration = None;
        for field in value.split(',') {
            if let Some(v) = field.strip_prefix("port=") {
                port = v.parse().ok();
            } else if let Some(v) = field.strip_prefix("duration=") {
                duration = v.parse().ok();
            }
        }
        StsPolicy { port, duration }
    }
}

/// Client-side view of capability negotiation: the advertised set, the
/// enabled set, and any values carried on advertised capabilities (e.g.
/// `sasl=PLAIN,EXTERNAL`, `sts=port=6697,...`).
#[derive(Debug, Clone, Default)]
pub struct CapState {
    available: HashMap<String, Option<String>>,
    enabled: HashSet<String>,
}

impl CapState {
    /// An empty, freshly-negotiating state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `LS`/`NEW` line's worth of `name[=value]` tokens as
    /// available.
    pub fn note_available(&mut self, tokens: &str) {
        for token in tokens.split_whitespace() {
            let (name, value) = match token.split_once('=') {
                Some((n, v)) => (n, Some(v.to_string())),
                None => (token, None),
            };
            self.available.insert(name.to_string(), value);
        }
    }

    /// Remove capabilities named in a `DEL` line.
    pub fn note_removed(&mut self, tokens: &str) {
        for name in tokens.split_whitespace() {
            self.available.remove(name);
            self.enabled.remove(name);
        }
    }

    /// Record an `ACK` line: each bare name is enabled, each `-name` is
    /// disabled.
    pub fn note_ack(&mut self, tokens: &str) {
        apply_changes(&mut self.enabled, tokens);
    }

    /// Whether a capability is currently advertised by the server.
    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    /// The value carried by an advertised capability, if any.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.available.get(name).and_then(|v| v.as_deref())
    }

    /// Whether a capability is currently enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// All currently enabled capability names.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    /// The server's advertised `sasl` mechanisms, if the capability was
    /// announced with a value (e.g. `sasl=PLAIN,EXTERNAL`).
    pub fn sasl_mechanisms(&self) -> Option<Vec<crate::sasl::SaslMechanism>> {
        self.value_of("sasl")
            .map(|v| crate::sasl::parse_mechanisms(v))
    }

    /// The server's announced STS policy, if any.
    pub fn sts_policy(&self) -> Option<StsPolicy> {
        self.value_of("sts").map(StsPolicy::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_round_trips_through_as_ref_and_from() {
        assert_eq!(Capability::MultiPrefix.as_ref(), "multi-prefix");
        assert_eq!(Capability::from("multi-prefix"), Capability::MultiPrefix);
        assert_eq!(
            Capability::from("unknown-cap"),
            Capability::Custom("unknown-cap".to_string())
        );
    }

    #[test]
    fn apply_changes_adds_and_removes() {
        let mut caps = HashSet::new();
        assert!(apply_changes(&mut caps, "multi-prefix sasl"));
        assert!(caps.contains("multi-prefix"));
        assert!(apply_changes(&mut caps, "-sasl"));
        assert!(!caps.contains("sasl"));
    }

    #[test]
    fn cap_state_tracks_ls_and_ack() {
        let mut state = CapState::new();
        state.note_available("multi-prefix sasl=PLAIN,EXTERNAL");
        assert!(state.is_available("sasl"));
        assert_eq!(state.value_of("sasl"), Some("PLAIN,EXTERNAL"));

        state.note_ack("multi-prefix sasl");
        assert!(state.is_enabled("multi-prefix"));
        assert!(state.is_enabled("sasl"));
    }

    #[test]
    fn cap_state_handles_new_and_del() {
        let mut state = CapState::new();
        state.note_available("account-notify");
        state.note_ack("account-notify");
        state.note_removed("account-notify");
        assert!(!state.is_available("account-notify"));
        assert!(!state.is_enabled("account-notify"));
    }

    #[test]
    fn sasl_mechanisms_parsed_from_value() {
        let mut state = CapState::new();
        state.note_available("sasl=PLAIN,EXTERNAL");
        let mechs = state.sasl_mechanisms().unwrap();
        assert_eq!(mechs.len(), 2);
    }

    #[test]
    fn sts_policy_parses_port_and_duration() {
        let policy = StsPolicy::parse("port=6697,duration=2592000");
        assert_eq!(policy.port, Some(6697));
        assert_eq!(policy.duration, Some(2592000));
    }
}
