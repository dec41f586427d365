//! Client configuration: everything needed to dial, register, and keep a
//! session alive, validated up front so construction fails fast rather than
//! surfacing `ConfigInvalid` partway through a connection attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::state::SaslCredentials;
use crate::validation::{validate_nickname, validate_username};

/// Minimum allowed [`Config::ping_delay`].
pub const MIN_PING_DELAY: Duration = Duration::from_secs(20);
/// Maximum allowed [`Config::ping_delay`].
pub const MAX_PING_DELAY: Duration = Duration::from_secs(600);
/// Floor on the reconnect backoff, regardless of configuration.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A WEBIRC spoof identity forwarded to gateways that support it.
#[derive(Clone)]
pub struct WebIrc {
    /// Shared gateway password.
    pub password: String,
    /// Gateway's own identifying name.
    pub gateway: String,
    /// The real client's hostname.
    pub hostname: String,
    /// The real client's address.
    pub address: String,
}

/// Callback invoked when the server reports a nickname collision; returning
/// an empty string tells the client to take no action.
pub type NickCollideFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Connection, identity, and policy configuration for a [`crate::client::Client`].
#[derive(Clone)]
pub struct Config {
    /// Server hostname or address.
    pub server: String,
    /// Server port.
    pub port: u16,
    /// Local address to bind the outbound socket to, if any.
    pub bind: Option<std::net::SocketAddr>,
    /// Whether to dial with TLS.
    pub ssl: bool,
    /// Server name for certificate verification; defaults to `server`.
    pub tls_server_name: Option<String>,
    /// `PASS` sent immediately after connecting, if any.
    pub server_pass: Option<String>,
    /// Initial nickname.
    pub nick: String,
    /// Ident/username.
    pub user: String,
    /// Real name (`GECOS`).
    pub name: String,
    /// SASL credentials, if authentication is desired.
    pub sasl: Option<SaslCredentials>,
    /// WEBIRC spoof identity.
    pub webirc: Option<WebIrc>,
    /// Capabilities to request in addition to the ones the client always
    /// asks for (message-tags, sasl when configured, etc).
    pub supported_caps: Vec<String>,
    /// Bypass the rate limiter for every outbound event.
    pub allow_flood: bool,
    /// Keepalive PING cadence; clamped to `[20s, 600s]`. `None` disables
    /// the ping loop entirely.
    pub ping_delay: Option<Duration>,
    /// Maximum reconnect attempts; `None` means retry forever.
    pub retries: Option<u32>,
    /// Base reconnect backoff; floored at 5 s.
    pub reconnect_delay: Duration,
    /// Disable the built-in state tracker.
    pub disable_tracking: bool,
    /// Disable STS upgrade handling entirely.
    pub disable_sts: bool,
    /// Accept an STS policy but never fall back to it without `sts` itself.
    pub disable_sts_fallback: bool,
    /// Disable `STARTTLS` negotiation.
    pub disable_starttls: bool,
    /// Nick collision handler.
    pub handle_nick_collide: Option<NickCollideFn>,
    /// `CTCP VERSION` reply payload.
    pub version: String,
    /// `CTCP CLIENTINFO` reply payload.
    pub client_info: String,
    /// `CTCP USERINFO` reply payload.
    pub user_info: String,
    /// `CTCP FINGER` reply payload.
    pub finger: String,
    /// `CTCP SOURCE` reply payload.
    pub source: String,
    /// Apply [`crate::colors::Fmt`]-style formatting to outbound
    /// PRIVMSG/NOTICE/TOPIC trailings before they hit the wire.
    pub global_format: bool,
}

impl Config {
    /// A config with every field at its documented default except the
    /// identity fields, which the caller must supply.
    pub fn new(server: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        let nick = nick.into();
        Config {
            server: server.into(),
            port,
            bind: None,
            ssl: false,
            tls_server_name: None,
            server_pass: None,
            user: nick.clone(),
            name: nick.clone(),
            nick,
            sasl: None,
            webirc: None,
            supported_caps: Vec::new(),
            allow_flood: false,
            ping_delay: Some(Duration::from_secs(90)),
            retries: Some(10),
            reconnect_delay: Duration::from_secs(10),
            disable_tracking: false,
            disable_sts: false,
            disable_sts_fallback: false,
            disable_starttls: false,
            handle_nick_collide: None,
            version: "ircflow".to_string(),
            client_info: "ircflow CTCP handler".to_string(),
            user_info: String::new(),
            finger: String::new(),
            source: "https://github.com/sid3xyz/ircflow".to_string(),
            global_format: false,
        }
    }

    /// The hostname used for TLS certificate verification.
    pub fn verify_name(&self) -> &str {
        self.tls_server_name.as_deref().unwrap_or(&self.server)
    }

    /// Clamp a requested ping delay into the allowed range.
    pub fn effective_ping_delay(&self) -> Option<Duration> {
        self.ping_delay
            .map(|d| d.clamp(MIN_PING_DELAY, MAX_PING_DELAY))
    }

    /// Floor the configured reconnect delay at the documented minimum.
    pub fn effective_reconnect_delay(&self) -> Duration {
        self.reconnect_delay.max(MIN_RECONNECT_DELAY)
    }

    /// Validate identity fields; called before a connection attempt is made.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::ConfigInvalid("server must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::ConfigInvalid("port must be nonzero".to_string()));
        }
        validate_nickname(&self.nick)
            .map_err(|e| Error::ConfigInvalid(format!("nick: {e}")))?;
        validate_username(&self.user)
            .map_err(|e| Error::ConfigInvalid(format!("user: {e}")))?;
        if self.name.trim().is_empty() {
            return Err(Error::ConfigInvalid("name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_populates_user_and_name_from_nick() {
        let cfg = Config::new("irc.example.net", 6697, "nick");
        assert_eq!(cfg.user, "nick");
        assert_eq!(cfg.name, "nick");
    }

    #[test]
    fn validate_rejects_invalid_nick() {
        let mut cfg = Config::new("irc.example.net", 6697, "bad nick");
        cfg.nick = "bad nick".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_server() {
        let cfg = Config::new("", 6697, "nick");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ping_delay_is_clamped() {
        let mut cfg = Config::new("irc.example.net", 6697, "nick");
        cfg.ping_delay = Some(Duration::from_secs(5));
        assert_eq!(cfg.effective_ping_delay(), Some(MIN_PING_DELAY));
        cfg.ping_delay = Some(Duration::from_secs(10_000));
        assert_eq!(cfg.effective_ping_delay(), Some(MAX_PING_DELAY));
    }

    #[test]
    fn reconnect_delay_has_a_floor() {
        let mut cfg = Config::new("irc.example.net", 6697, "nick");
        cfg.reconnect_delay = Duration::from_secs(1);
        assert_eq!(cfg.effective_reconnect_delay(), MIN_RECONNECT_DELAY);
    }
}
