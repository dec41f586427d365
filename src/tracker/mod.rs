//! State tracker: the single-writer view of channels and users built up
//! from server traffic, per built-in handlers consuming JOIN/PART/NICK/
//! MODE/NAMES/WHO/TOPIC/CHGHOST/AWAY/ACCOUNT and friends.
//!
//! Callers feed parsed [`Message`]s to [`Tracker::apply`], which mutates
//! tracked state in place and returns any follow-up messages the tracker
//! wants sent (e.g. the self-JOIN WHO/MODE probe). The tracker itself never
//! touches a transport; it is plain synchronous state transition, same as
//! [`crate::state::HandshakeMachine`].

pub mod channel;
pub mod perms;
pub mod user;

use std::collections::HashMap;

use crate::casemap::irc_to_lower;
use crate::isupport::Isupport;
use crate::message::Message;
use crate::mode::parse_channel_modes;

pub use channel::Channel;
pub use perms::PermSet;
pub use user::User;

/// The WHOX token the tracker stamps on its own self-JOIN WHO probe, so the
/// resulting 354 replies can be told apart from a user-initiated WHO (which
/// should use any other token, conventionally `2`).
pub const TRACKER_WHOX_TOKEN: &str = "1";

/// Distinguishes a general metadata update (network name, MOTD, ISUPPORT)
/// from a state update (users/channels), so observers can filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    /// Server-level metadata changed.
    General,
    /// Channel/user state changed.
    State,
}

/// Aggregated view of the connection built from server traffic.
#[derive(Debug, Default)]
pub struct Tracker {
    /// ISUPPORT token map and derived accessors.
    pub isupport: Isupport,
    /// Our own current nickname, once 001 has been received.
    pub nick: Option<String>,
    /// Network name, harvested from ISUPPORT or the 001 greeting.
    pub network: Option<String>,
    /// Accumulated MOTD text.
    pub motd: String,
    channels: HashMap<String, Channel>,
    users: HashMap<String, User>,
}

impl Tracker {
    /// A freshly initialized tracker, before registration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a channel by name (case-insensitively).
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&irc_to_lower(name))
    }

    /// Look up a user by nick (case-insensitively).
    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(&irc_to_lower(nick))
    }

    /// All tracked channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// All tracked users.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Whether we are currently a member of the given channel.
    pub fn is_in_channel(&self, name: &str) -> bool {
        self.channels.contains_key(&irc_to_lower(name))
    }

    fn ensure_channel(&mut self, name: &str) -> &mut Channel {
        self.channels
            .entry(irc_to_lower(name))
            .or_insert_with(|| Channel::new(name))
    }

    fn ensure_user(&mut self, nick: &str) -> &mut User {
        self.users
            .entry(irc_to_lower(nick))
            .or_insert_with(|| User::new(nick))
    }

    fn is_self(&self, nick: &str) -> bool {
        self.nick
            .as_deref()
            .map(|me| irc_to_lower(me) == irc_to_lower(nick))
            .unwrap_or(false)
    }

    /// Feed a parsed message to the tracker, mutating state and returning
    /// any follow-up messages the tracker wants sent (currently: the
    /// self-JOIN `WHO`/`MODE` probe) plus what kind of change occurred, if
    /// any.
    pub fn apply(&mut self, msg: &Message) -> (Vec<Message>, Option<NotifyKind>) {
        match msg.command.as_str() {
            "001" => self.handle_welcome(msg),
            "005" => {
                self.isupport.apply(msg);
                (vec![], Some(NotifyKind::General))
            }
            "375" => {
                self.motd.clear();
                (vec![], Some(NotifyKind::General))
            }
            "372" => {
                if let Some(line) = &msg.trailing {
                    self.motd.push_str(line);
                    self.motd.push('\n');
                }
                (vec![], Some(NotifyKind::General))
            }
            "JOIN" => self.handle_join(msg),
            "PART" => {
                self.handle_part(msg);
                (vec![], Some(NotifyKind::State))
            }
            "KICK" => {
                self.handle_kick(msg);
                (vec![], Some(NotifyKind::State))
            }
            "QUIT" => {
                self.handle_quit(msg);
                (vec![], Some(NotifyKind::State))
            }
            "NICK" => {
                self.handle_nick(msg);
                (vec![], Some(NotifyKind::State))
            }
            "353" => {
                self.handle_names(msg);
                (vec![], Some(NotifyKind::State))
            }
            "352" => {
                self.handle_who(msg);
                (vec![], Some(NotifyKind::State))
            }
            "354" => {
                self.handle_whox(msg);
                (vec![], Some(NotifyKind::State))
            }
            "MODE" | "324" => {
                self.handle_mode(msg);
                (vec![], Some(NotifyKind::State))
            }
            "TOPIC" | "332" => {
                self.handle_topic(msg);
                (vec![], Some(NotifyKind::State))
            }
            "CHGHOST" => {
                self.handle_chghost(msg);
                (vec![], Some(NotifyKind::State))
            }
            "AWAY" => {
                self.handle_away(msg);
                (vec![], Some(NotifyKind::State))
            }
            "ACCOUNT" => {
                self.handle_account(msg);
                (vec![], Some(NotifyKind::State))
            }
            _ => (vec![], None),
        }
    }

    fn handle_welcome(&mut self, msg: &Message) -> (Vec<Message>, Option<NotifyKind>) {
        if let Some(nick) = msg.params.first() {
            self.nick = Some(nick.clone());
        }
        if let Some(greeting) = &msg.trailing {
            if let Some(network) = extract_network_name(greeting) {
                self.network = Some(network);
            }
        }
        (vec![], Some(NotifyKind::General))
    }

    fn handle_join(&mut self, msg: &Message) -> (Vec<Message>, Option<NotifyKind>) {
        let Some(channel) = msg.params.first().or(msg.trailing.as_ref()) else {
            return (vec![], None);
        };
        let Some(source) = &msg.source else {
            return (vec![], None);
        };

        let nick = source.name.clone();
        let key = irc_to_lower(&nick);
        self.ensure_channel(channel).ensure_member(&key);
        let user = self.ensure_user(&nick);
        if let Some(ident) = &source.user {
            user.ident = Some(ident.clone());
        }
        if let Some(host) = &source.host {
            user.host = Some(host.clone());
        }
        // extended-join: `JOIN #chan account :realname`
        if let Some(account) = msg.params.get(1) {
            user.set_account(account);
        }
        if msg.params.len() > 1 {
            if let Some(realname) = &msg.trailing {
                user.realname = Some(realname.clone());
            }
        }

        let is_self = self.is_self(&nick);
        let mut actions = Vec::new();
        if is_self {
            actions.push(Message::new(
                "WHO",
                vec![channel.clone(), format!("%tacuhnr,{TRACKER_WHOX_TOKEN}")],
            ));
            actions.push(Message::new("MODE", vec![channel.clone()]));
        }

        (actions, Some(NotifyKind::State))
    }

    fn handle_part(&mut self, msg: &Message) {
        let Some(channel) = msg.params.first() else {
            return;
        };
        let Some(source) = &msg.source else {
            return;
        };
        let key = irc_to_lower(&source.name);
        let self_left = self.is_self(&source.name);

        if let Some(chan) = self.channels.get_mut(&irc_to_lower(channel)) {
            chan.remove_member(&key);
        }
        if self_left {
            self.channels.remove(&irc_to_lower(channel));
        }
    }

    fn handle_kick(&mut self, msg: &Message) {
        let (Some(channel), Some(kicked)) = (msg.params.first(), msg.params.get(1)) else {
            return;
        };
        let key = irc_to_lower(kicked);
        let self_kicked = self.is_self(kicked);

        if let Some(chan) = self.channels.get_mut(&irc_to_lower(channel)) {
            chan.remove_member(&key);
        }
        if self_kicked {
            self.channels.remove(&irc_to_lower(channel));
        }
    }

    fn handle_quit(&mut self, msg: &Message) {
        let Some(source) = &msg.source else {
            return;
        };
        let key = irc_to_lower(&source.name);
        for chan in self.channels.values_mut() {
            chan.remove_member(&key);
        }
        self.users.remove(&key);
    }

    fn handle_nick(&mut self, msg: &Message) {
        let Some(source) = &msg.source else {
            return;
        };
        let Some(new_nick) = msg.params.first().or(msg.trailing.as_ref()) else {
            return;
        };
        let old_key = irc_to_lower(&source.name);
        let new_key = irc_to_lower(new_nick);

        for chan in self.channels.values_mut() {
            chan.rename_member(&old_key, &new_key);
        }
        if let Some(mut user) = self.users.remove(&old_key) {
            user.nick = new_nick.clone();
            self.users.insert(new_key, user);
        }
        if self.is_self(&source.name) {
            self.nick = Some(new_nick.clone());
        }
    }

    fn handle_names(&mut self, msg: &Message) {
        let Some(channel) = msg.params.get(2) else {
            return;
        };
        let Some(names) = &msg.trailing else {
            return;
        };
        let prefix = self.isupport.prefix();

        for entry in names.split_whitespace() {
            let sigil_len = entry
                .chars()
                .take_while(|c| prefix.prefixes.contains(*c))
                .count();
            let (sigils, rest) = entry.split_at(sigil_len);
            // userhost-in-names: "nick!user@host"; otherwise bare nick.
            let nick = rest.split(['!', '@']).next().unwrap_or(rest);
            if nick.is_empty() {
                continue;
            }
            let key = irc_to_lower(nick);
            let perms = self.ensure_channel(channel).ensure_member(&key);
            perms.apply_sigils(sigils, &prefix);
            self.ensure_user(nick);
        }
    }

    fn handle_who(&mut self, msg: &Message) {
        let (Some(channel), Some(ident), Some(host), Some(nick)) = (
            msg.params.get(1),
            msg.params.get(2),
            msg.params.get(3),
            msg.params.get(5),
        ) else {
            return;
        };
        let _ = channel;
        let realname = msg
            .trailing
            .as_deref()
            .and_then(|t| t.splitn(2, ' ').nth(1));

        let user = self.ensure_user(nick);
        user.ident = Some(ident.clone());
        user.host = Some(host.clone());
        if let Some(realname) = realname {
            user.realname = Some(realname.to_string());
        }
    }

    fn handle_whox(&mut self, msg: &Message) {
        let Some(token) = msg.params.get(1) else {
            return;
        };
        if token != TRACKER_WHOX_TOKEN {
            return;
        }
        let (Some(account), Some(ident), Some(host), Some(nick)) = (
            msg.params.get(2),
            msg.params.get(3),
            msg.params.get(4),
            msg.params.get(5),
        ) else {
            return;
        };

        let user = self.ensure_user(nick);
        user.ident = Some(ident.clone());
        user.host = Some(host.clone());
        user.set_account(account);
        if let Some(realname) = &msg.trailing {
            user.realname = Some(realname.clone());
        }
    }

    fn handle_mode(&mut self, msg: &Message) {
        let Some(target) = msg.params.first() else {
            return;
        };
        if !self.isupport.chantypes().contains(
            target
                .chars()
                .next()
                .unwrap_or(' '),
        ) {
            return; // user mode, not channel mode; not tracked per-user here.
        }

        let Some(chanmodes) = self.isupport.chanmodes() else {
            return;
        };
        let prefix = self.isupport.prefix();
        let pieces: Vec<&str> = msg.params[1..].iter().map(String::as_str).collect();
        let Ok(changes) = parse_channel_modes(&pieces, &chanmodes, &prefix) else {
            return;
        };

        let mut non_member_changes = Vec::new();
        {
            let chan = self.ensure_channel(target);
            for change in &changes {
                if prefix.modes.contains(change.letter()) {
                    if let Some(arg) = change.arg() {
                        let key = irc_to_lower(arg);
                        let perms = chan.ensure_member(&key);
                        if change.is_set() {
                            perms.grant(change.letter());
                        } else {
                            perms.revoke(change.letter());
                        }
                    }
                } else {
                    non_member_changes.push(change.clone());
                }
            }
        }
        self.ensure_channel(target).modes.apply(&non_member_changes);
    }

    fn handle_topic(&mut self, msg: &Message) {
        let channel = if msg.command == "332" {
            msg.params.get(1)
        } else {
            msg.params.first()
        };
        let Some(channel) = channel else {
            return;
        };
        let Some(topic) = &msg.trailing else {
            return;
        };
        self.ensure_channel(channel).topic = Some(topic.clone());
    }

    fn handle_chghost(&mut self, msg: &Message) {
        let Some(source) = &msg.source else {
            return;
        };
        let (Some(new_ident), Some(new_host)) = (msg.params.first(), msg.params.get(1)) else {
            return;
        };
        let nick = source.name.clone();
        let user = self.ensure_user(&nick);
        user.ident = Some(new_ident.clone());
        user.host = Some(new_host.clone());
    }

    fn handle_away(&mut self, msg: &Message) {
        let Some(source) = &msg.source else {
            return;
        };
        let text = msg.trailing.as_deref().unwrap_or("");
        let nick = source.name.clone();
        self.ensure_user(&nick).set_away(text);
    }

    fn handle_account(&mut self, msg: &Message) {
        let Some(source) = &msg.source else {
            return;
        };
        let Some(account) = msg.params.first().or(msg.trailing.as_ref()) else {
            return;
        };
        let nick = source.name.clone();
        self.ensure_user(&nick).set_account(account);
    }
}

/// Best-effort extraction of a network name from the 001 greeting, e.g.
/// `"Welcome to the ExampleNet IRC Network nick!user@host"` -> `"ExampleNet"`.
fn extract_network_name(greeting: &str) -> Option<String> {
    let words: Vec<&str> = greeting.split_whitespace().collect();
    let pos = words.iter().position(|w| *w == "to")?;
    let the = words.get(pos + 1)?;
    if *the != "the" {
        return None;
    }
    words.get(pos + 2).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isupport_lines() -> Vec<Message> {
        vec![Message::with_trailing(
            "005",
            vec![
                "me".to_string(),
                "PREFIX=(ov)@+".to_string(),
                "CHANMODES=eIb,k,l,imnpst".to_string(),
            ],
            "are supported by this server".to_string(),
        )]
    }

    #[test]
    fn welcome_sets_nick_and_network() {
        let mut tracker = Tracker::new();
        let msg = Message::with_trailing(
            "001",
            vec!["bot".to_string()],
            "Welcome to the ExampleNet IRC Network bot!user@host".to_string(),
        );
        tracker.apply(&msg);
        assert_eq!(tracker.nick.as_deref(), Some("bot"));
        assert_eq!(tracker.network.as_deref(), Some("ExampleNet"));
    }

    #[test]
    fn self_join_emits_who_and_mode_probe() {
        let mut tracker = Tracker::new();
        tracker.nick = Some("bot".to_string());
        let join = Message::parse(":bot!user@host JOIN #rust").unwrap();
        let (actions, _) = tracker.apply(&join);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].command, "WHO");
        assert!(actions[0].params[1].ends_with(",1"));
        assert!(tracker.is_in_channel("#rust"));
    }

    #[test]
    fn other_join_does_not_emit_probe() {
        let mut tracker = Tracker::new();
        tracker.nick = Some("bot".to_string());
        let join = Message::parse(":alice!user@host JOIN #rust").unwrap();
        let (actions, _) = tracker.apply(&join);
        assert!(actions.is_empty());
        assert!(tracker.channel("#rust").unwrap().members.contains_key("alice"));
    }

    #[test]
    fn part_removes_member_and_self_part_drops_channel() {
        let mut tracker = Tracker::new();
        tracker.nick = Some("bot".to_string());
        let _ = tracker.apply(&Message::parse(":bot!u@h JOIN #rust").unwrap());
        let _ = tracker.apply(&Message::parse(":alice!u@h JOIN #rust").unwrap());
        let _ = tracker.apply(&Message::parse(":alice!u@h PART #rust").unwrap());
        assert!(!tracker.channel("#rust").unwrap().members.contains_key("alice"));

        let _ = tracker.apply(&Message::parse(":bot!u@h PART #rust :bye").unwrap());
        assert!(tracker.channel("#rust").is_none());
    }

    #[test]
    fn nick_change_renames_user_and_membership() {
        let mut tracker = Tracker::new();
        let _ = tracker.apply(&Message::parse(":alice!u@h JOIN #rust").unwrap());
        let _ = tracker.apply(&Message::parse(":alice!u@h NICK alice2").unwrap());
        assert!(tracker.user("alice").is_none());
        assert!(tracker.user("alice2").is_some());
        assert!(tracker
            .channel("#rust")
            .unwrap()
            .members
            .contains_key("alice2"));
    }

    #[test]
    fn names_reply_parses_stacked_sigils() {
        let mut tracker = Tracker::new();
        for line in isupport_lines() {
            tracker.apply(&line);
        }
        let names = Message::with_trailing(
            "353",
            vec!["bot".to_string(), "=".to_string(), "#rust".to_string()],
            "@+alice bob".to_string(),
        );
        tracker.apply(&names);
        let chan = tracker.channel("#rust").unwrap();
        assert!(chan.members.get("alice").unwrap().has('o'));
        assert!(chan.members.get("alice").unwrap().has('v'));
        assert!(chan.members.contains_key("bob"));
    }

    #[test]
    fn names_reply_with_qaohv_prefix_sets_exactly_owner_and_admin() {
        let mut tracker = Tracker::new();
        let isupport = Message::with_trailing(
            "005",
            vec!["me".to_string(), "PREFIX=(qaohv)~&@%+".to_string()],
            "are supported by this server".to_string(),
        );
        tracker.apply(&isupport);

        let names = Message::with_trailing(
            "353",
            vec!["bot".to_string(), "=".to_string(), "#rust".to_string()],
            "~&me @other +third".to_string(),
        );
        tracker.apply(&names);

        let chan = tracker.channel("#rust").unwrap();
        let me = chan.members.get("me").unwrap();
        assert!(me.owner);
        assert!(me.admin);
        assert!(!me.op);
        assert!(!me.halfop);
        assert!(!me.voice);
    }

    #[test]
    fn mode_updates_member_perms_and_channel_modes() {
        let mut tracker = Tracker::new();
        for line in isupport_lines() {
            tracker.apply(&line);
        }
        let _ = tracker.apply(&Message::parse(":alice!u@h JOIN #rust").unwrap());
        let mode = Message::new(
            "MODE",
            vec!["#rust".to_string(), "+ov".to_string(), "alice".to_string(), "alice".to_string()],
        );
        tracker.apply(&mode);
        let chan = tracker.channel("#rust").unwrap();
        assert!(chan.members.get("alice").unwrap().has('o'));
        assert!(chan.members.get("alice").unwrap().has('v'));

        let mode2 = Message::new("MODE", vec!["#rust".to_string(), "+nt".to_string()]);
        tracker.apply(&mode2);
        assert!(tracker.channel("#rust").unwrap().modes.has('n'));
    }

    #[test]
    fn whox_ignores_non_tracker_token() {
        let mut tracker = Tracker::new();
        let whox = Message::with_trailing(
            "354",
            vec![
                "bot".to_string(),
                "2".to_string(),
                "acct".to_string(),
                "user".to_string(),
                "host".to_string(),
                "alice".to_string(),
            ],
            "Alice Example".to_string(),
        );
        tracker.apply(&whox);
        assert!(tracker.user("alice").is_none());
    }

    #[test]
    fn whox_applies_tracker_token() {
        let mut tracker = Tracker::new();
        let whox = Message::with_trailing(
            "354",
            vec![
                "bot".to_string(),
                "1".to_string(),
                "acct".to_string(),
                "user".to_string(),
                "host".to_string(),
                "alice".to_string(),
            ],
            "Alice Example".to_string(),
        );
        tracker.apply(&whox);
        let user = tracker.user("alice").unwrap();
        assert_eq!(user.account.as_deref(), Some("acct"));
        assert_eq!(user.realname.as_deref(), Some("Alice Example"));
    }

    #[test]
    fn away_and_account_update_user() {
        let mut tracker = Tracker::new();
        let _ = tracker.apply(&Message::parse(":alice!u@h JOIN #rust").unwrap());
        let _ = tracker.apply(&Message::parse(":alice!u@h AWAY :brb").unwrap());
        assert!(tracker.user("alice").unwrap().is_away());

        let _ = tracker.apply(&Message::parse(":alice!u@h ACCOUNT acct").unwrap());
        assert_eq!(tracker.user("alice").unwrap().account.as_deref(), Some("acct"));
    }

    #[test]
    fn quit_removes_user_from_all_channels() {
        let mut tracker = Tracker::new();
        let _ = tracker.apply(&Message::parse(":alice!u@h JOIN #rust").unwrap());
        let _ = tracker.apply(&Message::parse(":alice!u@h QUIT :gone").unwrap());
        assert!(tracker.user("alice").is_none());
        assert!(!tracker.channel("#rust").unwrap().members.contains_key("alice"));
    }
}
