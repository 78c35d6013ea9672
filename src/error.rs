//! Error kinds shared by the coordinator and the client session.

use serde::{Deserialize, Serialize};

use crate::protocol::ErrorPayload;
use crate::session::IllegalTransition;

/// Category of a failure, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or unexpected message.
    Protocol,
    /// Illegal operation sequence or a broken game invariant.
    Game,
    /// Both peers wait for a shot that nobody announced.
    Deadlock,
    /// A channel failed or was closed.
    Disconnected,
    /// A peer did not answer within the round timeout.
    Timeout,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Game => "game error",
            ErrorKind::Deadlock => "deadlock",
            ErrorKind::Disconnected => "disconnected",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Every way a session or a match can fail. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("game error: {0}")]
    Game(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("deadlock: {0}")]
    Deadlock(String),

    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("channel failure: {0}")]
    Channel(anyhow::Error),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Protocol(_) => ErrorKind::Protocol,
            SessionError::Game(_) | SessionError::IllegalTransition(_) => ErrorKind::Game,
            SessionError::Deadlock(_) => ErrorKind::Deadlock,
            SessionError::Disconnected(_) | SessionError::Channel(_) => ErrorKind::Disconnected,
            SessionError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Turn an `Error` message received from the other side into a local error.
    pub fn from_remote(payload: ErrorPayload) -> Self {
        let ErrorPayload { kind, message } = payload;
        match kind {
            ErrorKind::Protocol => SessionError::Protocol(message),
            ErrorKind::Game => SessionError::Game(message),
            ErrorKind::Deadlock => SessionError::Deadlock(message),
            ErrorKind::Disconnected => SessionError::Disconnected(message),
            ErrorKind::Timeout => SessionError::Timeout(message),
        }
    }

    /// Wire form of this error, sent to peers that must abandon the match.
    pub fn to_payload(&self) -> ErrorPayload {
        let message = match self {
            SessionError::Protocol(msg)
            | SessionError::Game(msg)
            | SessionError::Deadlock(msg)
            | SessionError::Disconnected(msg)
            | SessionError::Timeout(msg) => msg.clone(),
            other => other.to_string(),
        };
        ErrorPayload {
            kind: self.kind(),
            message,
        }
    }
}
