//! Sans-IO connection state machine for IRC protocol handling.
//!
//! This module provides a "sans-IO" state machine for managing IRC connection
//! lifecycle. It does not perform actual I/O — instead, it consumes events
//! (parsed messages) and produces actions (messages to send).
//!
//! # Design Philosophy
//!
//! The state machine is designed to be:
//! - **Sans-IO**: No network calls, timers, or blocking. Pure state transitions.
//! - **Runtime-agnostic**: Works with tokio, async-std, or blocking code.
//! - **Testable**: Easy to unit test without mocking network.
//!
//! Unlike a one-shot handshake, this machine stays live after registration:
//! a `cap-notify`-enabled server may send `CAP NEW`/`CAP DEL` at any time,
//! and an `sts`-capable server may ask us to upgrade mid-session.

use crate::caps::{CapState, StsPolicy};
use crate::message::Message;
use crate::sasl::{self, SaslMechanism};

/// Current state of the IRC connection handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, not yet connected.
    Disconnected,
    /// Sent CAP LS, awaiting capability list.
    CapabilityNegotiation,
    /// Performing SASL authentication.
    Authenticating,
    /// Sent CAP END, awaiting welcome (001).
    Registering,
    /// Received 001, fully connected.
    Connected,
    /// Connection terminated (QUIT sent or ERROR received).
    Terminated,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Configuration for the handshake state machine.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    /// Desired nickname.
    pub nickname: String,
    /// Username (ident).
    pub username: String,
    /// Real name / GECOS.
    pub realname: String,
    /// Server password, if required.
    pub password: Option<String>,
    /// Capabilities to request, beyond `sasl` (which is requested
    /// automatically when `sasl_credentials` is set).
    pub request_caps: Vec<String>,
    /// SASL credentials, if SASL authentication is desired.
    pub sasl_credentials: Option<SaslCredentials>,
    /// If false, a failed STS upgrade is not retried as plaintext; the
    /// connection attempt fails outright instead.
    pub allow_sts_fallback: bool,
}

/// SASL authentication credentials.
#[derive(Clone, Debug)]
pub struct SaslCredentials {
    /// Preferred mechanism; if the server doesn't advertise it, the
    /// strongest mutually supported mechanism is used instead.
    pub mechanism: SaslMechanism,
    /// Account name (often same as nickname).
    pub account: String,
    /// Password (ignored for `EXTERNAL`).
    pub password: String,
}

/// Actions produced by the handshake state machine.
///
/// The caller is responsible for sending these messages to the server.
#[derive(Clone, Debug)]
pub enum HandshakeAction {
    /// Send this message to the server.
    ///
    /// Boxed to reduce enum size variance (Message is large).
    Send(Box<Message>),
    /// Registration is complete, proceed to normal operation.
    Complete,
    /// The server announced an STS policy requiring a TLS reconnect to the
    /// given port before registration can proceed.
    UpgradeToTls {
        /// Port to reconnect to over TLS.
        port: u16,
    },
    /// An error occurred during handshake.
    Error(HandshakeError),
}

/// Errors that can occur during handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// SASL authentication failed.
    SaslFailed(String),
    /// Nickname collision.
    NicknameInUse(String),
    /// Server sent ERROR.
    ServerError(String),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SaslFailed(reason) => write!(f, "SASL authentication failed: {reason}"),
            Self::NicknameInUse(nick) => write!(f, "nickname in use: {nick}"),
            Self::ServerError(msg) => write!(f, "server error: {msg}"),
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Sans-IO state machine for IRC connection handshake.
///
/// This handles the CAP -> AUTHENTICATE -> NICK/USER -> 001 flow, plus
/// post-registration `CAP NEW`/`CAP DEL` tracking.
#[derive(Clone, Debug)]
pub struct HandshakeMachine {
    config: HandshakeConfig,
    state: ConnectionState,
    caps: CapState,
    registration_sent: bool,
    waiting_for_more_caps: bool,
    sts_fallback_used: bool,
}

impl HandshakeMachine {
    /// Create a new handshake state machine with the given configuration.
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            caps: CapState::new(),
            registration_sent: false,
            waiting_for_more_caps: false,
            sts_fallback_used: false,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Get the capability tracker.
    pub fn caps(&self) -> &CapState {
        &self.caps
    }

    /// Start the handshake. Returns initial messages to send.
    pub fn start(&mut self) -> Vec<HandshakeAction> {
        self.state = ConnectionState::CapabilityNegotiation;
        let mut actions = Vec::new();

        if let Some(pass) = &self.config.password {
            actions.push(send(Message::new("PASS", vec![pass.clone()])));
        }

        actions.push(send(Message::with_trailing(
            "CAP",
            vec![],
            "LS 302".to_string(),
        )));

        actions
    }

    /// Feed a parsed message to the state machine.
    pub fn feed(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        if msg.command == "CAP" {
            return self.handle_cap(msg);
        }

        match self.state {
            ConnectionState::Disconnected | ConnectionState::CapabilityNegotiation => vec![],
            ConnectionState::Authenticating => self.handle_authentication(msg),
            ConnectionState::Registering => self.handle_registration(msg),
            ConnectionState::Connected | ConnectionState::Terminated => vec![],
        }
    }

    fn handle_cap(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let subcmd = msg.params.get(1).map(String::as_str).unwrap_or("");
        let tokens = msg.trailing.as_deref().unwrap_or("");

        match subcmd.to_ascii_uppercase().as_str() {
            "LS" => self.handle_cap_ls(msg, tokens),
            "ACK" => self.handle_cap_ack(tokens),
            "NAK" => {
                // Not fatal; proceed as if those caps were never requested.
                if self.state == ConnectionState::CapabilityNegotiation {
                    self.finish_cap_negotiation()
                } else {
                    vec![]
                }
            }
            "NEW" => {
                self.caps.note_available(tokens);
                if let Some(port) = self.maybe_sts_upgrade() {
                    return vec![HandshakeAction::UpgradeToTls { port }];
                }
                vec![]
            }
            "DEL" => {
                self.caps.note_removed(tokens);
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_cap_ls(&mut self, msg: &Message, tokens: &str) -> Vec<HandshakeAction> {
        // Multiline LS: `CAP * LS * :tokens...`, final line omits the `*`.
        let is_multiline = msg.params.get(2).map(String::as_str) == Some("*");
        self.caps.note_available(tokens);

        if is_multiline {
            self.waiting_for_more_caps = true;
            return vec![];
        }
        self.waiting_for_more_caps = false;

        if self.state != ConnectionState::CapabilityNegotiation {
            // Unsolicited full LS refresh post-registration; nothing to request.
            return vec![];
        }

        if let Some(port) = self.maybe_sts_upgrade() {
            return vec![HandshakeAction::UpgradeToTls { port }];
        }

        let mut wanted: Vec<String> = self
            .config
            .request_caps
            .iter()
            .filter(|c| self.caps.is_available(c))
            .cloned()
            .collect();

        if self.config.sasl_credentials.is_some() && self.caps.is_available("sasl") {
            wanted.push("sasl".to_string());
        }

        if wanted.is_empty() {
            return self.finish_cap_negotiation();
        }

        vec![send(Message::with_trailing(
            "CAP",
            vec![],
            wanted.join(" "),
        ))]
    }

    fn handle_cap_ack(&mut self, tokens: &str) -> Vec<HandshakeAction> {
        self.caps.note_ack(tokens);

        if self.state != ConnectionState::CapabilityNegotiation {
            return vec![];
        }

        if self.caps.is_enabled("sasl") {
            if let Some(creds) = &self.config.sasl_credentials {
                let mechanism = self.chosen_mechanism(creds);
                self.state = ConnectionState::Authenticating;
                return vec![send(Message::new(
                    "AUTHENTICATE",
                    vec![mechanism.as_str().to_string()],
                ))];
            }
        }

        self.finish_cap_negotiation()
    }

    fn chosen_mechanism(&self, creds: &SaslCredentials) -> SaslMechanism {
        match self.caps.sasl_mechanisms() {
            Some(offered) if offered.contains(&creds.mechanism) => creds.mechanism.clone(),
            Some(offered) if offered.contains(&SaslMechanism::Plain) => SaslMechanism::Plain,
            _ => creds.mechanism.clone(),
        }
    }

    fn maybe_sts_upgrade(&mut self) -> Option<u16> {
        if self.sts_fallback_used {
            return None;
        }
        let policy: StsPolicy = self.caps.sts_policy()?;
        policy.port
    }

    fn handle_authentication(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let mut actions = Vec::new();

        if msg.command == "AUTHENTICATE" {
            let param = msg.params.first().map(String::as_str).unwrap_or("");
            if param == "+" {
                if let Some(creds) = self.config.sasl_credentials.clone() {
                    let mechanism = self.chosen_mechanism(&creds);
                    let payload = match mechanism {
                        SaslMechanism::External => sasl::encode_external(None),
                        _ => sasl::encode_plain(&creds.account, &creds.password),
                    };
                    for chunk in sasl::chunk_response(&payload) {
                        actions.push(send(Message::new(
                            "AUTHENTICATE",
                            vec![chunk.to_string()],
                        )));
                    }
                }
            }
            return actions;
        }

        if let Ok(numeric) = msg.command.parse::<u16>() {
            match numeric {
                903 => {
                    // RPL_SASLSUCCESS
                    actions.extend(self.finish_cap_negotiation());
                }
                902 | 904 | 905 | 906 | 907 => {
                    let reason = msg
                        .trailing
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string());
                    actions.push(HandshakeAction::Error(HandshakeError::SaslFailed(reason)));
                    actions.extend(self.finish_cap_negotiation());
                }
                _ => {}
            }
        }

        actions
    }

    fn handle_registration(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        match msg.command.as_str() {
            "001" => {
                self.state = ConnectionState::Connected;
                vec![HandshakeAction::Complete]
            }
            "433" | "432" => {
                let nick = msg
                    .params
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| self.config.nickname.clone());
                vec![HandshakeAction::Error(HandshakeError::NicknameInUse(nick))]
            }
            "ERROR" => {
                let reason = msg
                    .trailing
                    .clone()
                    .unwrap_or_else(|| "connection closed".to_string());
                self.state = ConnectionState::Terminated;
                vec![HandshakeAction::Error(HandshakeError::ServerError(reason))]
            }
            _ => vec![],
        }
    }

    fn finish_cap_negotiation(&mut self) -> Vec<HandshakeAction> {
        self.state = ConnectionState::Registering;
        let mut actions = vec![send(Message::new("CAP", vec!["END".to_string()]))];

        if !self.registration_sent {
            self.registration_sent = true;
            actions.push(send(Message::new(
                "NICK",
                vec![self.config.nickname.clone()],
            )));
            actions.push(send(Message::with_trailing(
                "USER",
                vec![
                    self.config.username.clone(),
                    "0".to_string(),
                    "*".to_string(),
                ],
                self.config.realname.clone(),
            )));
        }

        actions
    }
}

fn send(msg: Message) -> HandshakeAction {
    HandshakeAction::Send(Box::new(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> HandshakeConfig {
        HandshakeConfig {
            nickname: "testbot".to_string(),
            username: "bot".to_string(),
            realname: "Test Bot".to_string(),
            password: None,
            request_caps: vec!["multi-prefix".to_string()],
            sasl_credentials: None,
            allow_sts_fallback: true,
        }
    }

    #[test]
    fn start_sends_cap_ls() {
        let mut machine = HandshakeMachine::new(make_config());
        let actions = machine.start();

        assert_eq!(machine.state(), &ConnectionState::CapabilityNegotiation);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], HandshakeAction::Send(m) if m.command == "CAP"));
    }

    #[test]
    fn cap_ls_then_req() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let cap_ls = Message::parse(":server CAP * LS :multi-prefix sasl").unwrap();
        let actions = machine.feed(&cap_ls);

        assert!(machine.caps().is_available("multi-prefix"));
        assert!(machine.caps().is_available("sasl"));

        assert_eq!(actions.len(), 1);
        let HandshakeAction::Send(m) = &actions[0] else {
            panic!("expected Send");
        };
        assert_eq!(m.command, "CAP");
        assert_eq!(m.trailing.as_deref(), Some("multi-prefix"));
    }

    #[test]
    fn cap_ack_then_end() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let _ = machine.feed(&Message::parse(":server CAP * LS :multi-prefix").unwrap());
        let actions = machine.feed(&Message::parse(":server CAP * ACK :multi-prefix").unwrap());

        assert!(machine.caps().is_enabled("multi-prefix"));
        assert_eq!(machine.state(), &ConnectionState::Registering);
        assert_eq!(actions.len(), 3); // CAP END, NICK, USER
    }

    #[test]
    fn welcome_completes_registration() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&Message::parse(":server CAP * LS :").unwrap());

        let actions = machine.feed(&Message::parse(":server 001 testbot :Welcome").unwrap());

        assert_eq!(machine.state(), &ConnectionState::Connected);
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Complete)));
    }

    #[test]
    fn sasl_flow_authenticates_then_registers() {
        let mut config = make_config();
        config.sasl_credentials = Some(SaslCredentials {
            mechanism: SaslMechanism::Plain,
            account: "acct".to_string(),
            password: "hunter2".to_string(),
        });
        let mut machine = HandshakeMachine::new(config);
        let _ = machine.start();

        let actions = machine.feed(&Message::parse(":server CAP * LS :sasl=PLAIN").unwrap());
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Send(m) if m.trailing.as_deref() == Some("sasl"))));

        let actions = machine.feed(&Message::parse(":server CAP * ACK :sasl").unwrap());
        assert_eq!(machine.state(), &ConnectionState::Authenticating);
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Send(m) if m.command == "AUTHENTICATE")));

        let actions = machine.feed(&Message::parse("AUTHENTICATE +").unwrap());
        assert!(!actions.is_empty());

        let actions = machine.feed(&Message::parse(":server 903 testbot :SASL success").unwrap());
        assert_eq!(machine.state(), &ConnectionState::Registering);
        assert!(actions.iter().any(|a| matches!(a, HandshakeAction::Send(m) if m.command == "CAP")));
    }

    #[test]
    fn cap_new_and_del_after_registration() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&Message::parse(":server CAP * LS :").unwrap());
        let _ = machine.feed(&Message::parse(":server 001 testbot :Welcome").unwrap());

        let _ = machine.feed(&Message::parse(":server CAP testbot NEW :away-notify").unwrap());
        assert!(machine.caps().is_available("away-notify"));

        let _ = machine.feed(&Message::parse(":server CAP testbot DEL :away-notify").unwrap());
        assert!(!machine.caps().is_available("away-notify"));
    }

    #[test]
    fn nickname_in_use_reports_error() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&Message::parse(":server CAP * LS :").unwrap());

        let actions = machine.feed(&Message::parse(":server 433 * testbot :Nickname in use").unwrap());
        assert!(matches!(
            &actions[0],
            HandshakeAction::Error(HandshakeError::NicknameInUse(n)) if n == "testbot"
        ));
    }
}
