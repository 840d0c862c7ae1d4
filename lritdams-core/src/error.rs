//! Domain-specific error types for the relay gateway.
//!
//! All fallible operations return `Result<T, GatewayError>`, except the
//! two narrow seams that need their own type: pushing a frame to one
//! subscriber ([`SessionError`]) and reading a broadcast file
//! ([`HritError`]).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The canonical error type for the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Network Errors ───────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The listen socket could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// `listen()` was called on a server that is already accepting or
    /// has been shut down.
    #[error("server is not in a listenable state")]
    NotListenable,

    // ── Process Errors ───────────────────────────────────────────
    /// Another instance holds the lock file.
    #[error("lock file {0} is held by another instance")]
    LockHeld(PathBuf),

    /// The lock file disappeared while we were running.
    #[error("lock file {0} was removed")]
    LockLost(PathBuf),

    // ── Configuration Errors ─────────────────────────────────────
    /// The configuration file could not be parsed.
    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// The DAMS-NT start pattern is not 4 bytes of hex.
    #[error("invalid start pattern '{0}': expected 8 hex digits")]
    InvalidStartPattern(String),

    // ── State Errors ─────────────────────────────────────────────
    /// An ingest-file lifecycle transition that is not allowed.
    #[error("invalid ingest transition: {0}")]
    InvalidTransition(&'static str),

    // ── Framing Errors ───────────────────────────────────────────
    /// A DAMS-NT stream contained bytes that are not a frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// A frame exceeded the decoder limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── SessionError ──────────────────────────────────────────────────

/// Failure while pushing a frame to one subscriber.
///
/// The distributor treats every variant the same way: the session is
/// dropped from the roster.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was already disconnected.
    #[error("session closed")]
    Closed,

    /// The write or flush failed.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── HritError ─────────────────────────────────────────────────────

/// Classification of a broadcast-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HritErrorCode {
    /// Fewer bytes than the headers promise; the file may still be
    /// arriving.
    IncompleteFile,
    /// Not an LRIT/HRIT DCS file at all.
    WrongFileType,
    /// A header or file CRC did not match.
    BadFileCrc,
    /// A header field could not be parsed.
    BadHeader,
}

impl fmt::Display for HritErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteFile => write!(f, "incomplete file"),
            Self::WrongFileType => write!(f, "wrong file type"),
            Self::BadFileCrc => write!(f, "bad CRC"),
            Self::BadHeader => write!(f, "bad header"),
        }
    }
}

/// A structural failure reading a broadcast file.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct HritError {
    pub code: HritErrorCode,
    pub message: String,
}

impl HritError {
    pub fn new(code: HritErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for GatewayError {
    fn from(s: String) -> Self {
        GatewayError::Other(s)
    }
}

impl From<&str> for GatewayError {
    fn from(s: &str) -> Self {
        GatewayError::Other(s.to_string())
    }
}
