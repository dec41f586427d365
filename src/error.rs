//! Error types for the IRC client library.
//!
//! Mirrors the error kinds enumerated by the connection supervisor, the
//! codec, and the handler registry into a single top-level [`Error`] so
//! applications have one type to match on, while each subsystem keeps its
//! own precise error enum for internal propagation.

use thiserror::Error;

use crate::handler::HandlerId;

/// Convenience alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration failed validation before a connection was attempted.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A command was issued while no connection was established.
    #[error("not connected")]
    NotConnected,

    /// `Connect()` was called while a connection attempt was already in flight.
    #[error("already connecting")]
    AlreadyConnecting,

    /// A command helper rejected a malformed target (nick/channel/user).
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The connection was closed, gracefully or otherwise.
    #[error("connection closed")]
    ConnectionClosed,

    /// An operation exceeded its deadline.
    #[error("timed out")]
    TimedOut,

    /// TLS was requested on a plaintext connection, or vice versa.
    #[error("connection is not using TLS")]
    NotTls,

    /// The wire codec failed to parse a line.
    #[error("protocol parse error: {0}")]
    ProtocolParse(#[from] MessageParseError),

    /// The server sent an `ERROR` frame.
    #[error("server error: {0}")]
    ServerError(String),

    /// A registered handler panicked.
    #[error("handler {handler_id} panicked at {location}: {message}")]
    HandlerPanic {
        /// The id of the handler that panicked.
        handler_id: HandlerId,
        /// Best-effort panic payload message.
        message: String,
        /// Caller-reported source location.
        location: String,
    },

    /// A temporary handler's deadline elapsed before it signalled completion.
    #[error("handler {handler_id} exceeded its deadline")]
    CallbackDeadlineExceeded {
        /// The id of the handler that timed out.
        handler_id: HandlerId,
    },

    /// Transport-level I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors encountered while parsing a single IRC wire line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The input line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// A `:source` indicator was present but the source itself was empty.
    #[error("empty source")]
    EmptySource,

    /// No command token could be found.
    #[error("missing command")]
    MissingCommand,

    /// The command token was not alphabetic and not exactly three digits.
    #[error("invalid command token: {0}")]
    InvalidCommand(String),

    /// A tag key failed validation.
    #[error("invalid tag key: {0}")]
    InvalidTagKey(String),

    /// The encoded tag block would exceed the 511 octet wire limit.
    #[error("tag block too long: {0} bytes")]
    TagsTooLong(usize),
}

/// Errors encountered while parsing a MODE string against CHANMODES.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModeParseError {
    /// A mode letter that requires an argument had none available.
    #[error("mode '{0}' requires an argument")]
    MissingArgument(char),

    /// More argument tokens were supplied than modes consumed.
    #[error("unused mode arguments")]
    UnusedArguments,
}
