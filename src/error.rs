use thiserror;

use crate::service::{BoardId, Session};

/// The Result type for hint48.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("move service call failed: {0}")]
    Transport(String),

    #[error("session {0} is invalid or expired")]
    InvalidSession(Session),

    #[error("unexpected response from move service: {0}")]
    InvalidResponse(String),

    #[error("search depth {depth} outside of 1..=6")]
    ConfigurationRejected { depth: u8 },

    #[error("no game started on board {0}")]
    UnknownBoard(BoardId),

    #[error("io error")]
    StdIOError(#[from] std::io::Error),

    #[error("log error")]
    LogError(#[from] log::SetLoggerError),
}

impl Error {
    /// Whether the caller has to bootstrap a fresh session before retrying.
    pub(crate) fn is_session_expired(&self) -> bool {
        matches!(self, Error::InvalidSession(_))
    }
}
