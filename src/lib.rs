//! # ircflow
//!
//! A sans-IO IRC protocol library: message parsing and serialization, IRCv3
//! capability/SASL negotiation, ISUPPORT-driven mode parsing, and state
//! tracking, with an async client built on top.
//!
//! ## Features
//!
//! - Tolerant IRCv3 message parsing and serialization (tags, source,
//!   command, parameters, trailing)
//! - Capability negotiation (`CAP LS`/`REQ`/`ACK`/`NAK`/`NEW`/`DEL`) and
//!   SASL (`PLAIN`, `EXTERNAL`)
//! - ISUPPORT-driven channel mode parsing, rather than a fixed RFC 2812 enum
//! - A state tracker building up channel/user state from server traffic
//! - `Cmd.*` builders for well-formed outbound commands, with message
//!   splitting for long lines
//!
//! ## Quick start
//!
//! ```rust
//! use ircflow::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message = Message::parse(raw).expect("valid IRC message");
//! assert_eq!(message.command, "PRIVMSG");
//! assert_eq!(message.tag("time"), Some("2023-01-01T12:00:00Z"));
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod caps;
pub mod casemap;
pub mod client;
pub mod codec;
pub mod colors;
pub mod command;
pub mod error;
pub mod handler;
pub mod ircv3;
pub mod isupport;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod sasl;
pub mod state;
pub mod tracker;
pub mod transport;
pub mod util;
pub mod validation;

pub use self::caps::{CapState, Capability};
pub use self::casemap::{irc_eq, irc_to_lower};
pub use self::client::config::{NickCollideFn, WebIrc};
pub use self::client::{Client, Config};
pub use self::command::Cmd;
pub use self::error::{Error, MessageParseError, ModeParseError, Result};
pub use self::handler::{HandlerId, Registry};
pub use self::isupport::{ChanModes, Isupport, MaxList, PrefixSpec, TargMax};
pub use self::message::{Ctcp, Message, Tag};
pub use self::mode::{ModeChange, ModeSet};
pub use self::prefix::Source;
pub use self::sasl::{encode_external, encode_plain, SaslMechanism, SaslState};
pub use self::state::{HandshakeAction, HandshakeConfig, HandshakeMachine};
pub use self::tracker::{Channel, Tracker, User};
pub use self::transport::Transport;
