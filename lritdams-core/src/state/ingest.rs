//! Lifecycle of one broadcast file in the input directory.
//!
//! `IngestPhase` models where a file is in its life, with validated
//! transitions that return `Result` instead of panicking.
//! `IngestPolicy` holds the two age thresholds and decides which
//! transition a given age calls for.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::GatewayError;

// ── IngestPhase ──────────────────────────────────────────────────

/// ```text
///            ┌──── retry ────┐
///            ▼               │
///  Pending ──┴──► Distributed ──► Done
///     │                            ▲
///     └────────► Abandoned ────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IngestPhase {
    /// Discovered by a scan and not yet resolved.
    #[default]
    Pending,

    /// Given up on; will be disposed without distributing anything.
    Abandoned { reason: AbandonReason },

    /// Every message in the file was handed to the distributor.
    Distributed { messages: usize },

    /// Moved to the done directory or deleted. Terminal.
    Done { disposal: Disposal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Older than the maximum file age on first sight.
    TooOld,
    /// Still unparseable after the retry window.
    ParseFailed,
}

/// What happened to the file on disposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposal {
    Moved(PathBuf),
    Deleted,
    /// The file was already gone.
    Missing,
    /// Neither move nor delete worked; the file is still in place.
    Failed,
}

impl std::fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Abandoned { .. } => write!(f, "Abandoned"),
            Self::Distributed { .. } => write!(f, "Distributed"),
            Self::Done { .. } => write!(f, "Done"),
        }
    }
}

impl IngestPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Pending`.
    pub fn abandon(&mut self, reason: AbandonReason) -> Result<(), GatewayError> {
        match self {
            Self::Pending => {
                *self = Self::Abandoned { reason };
                Ok(())
            }
            _ => Err(GatewayError::InvalidTransition(
                "cannot abandon: not in Pending state",
            )),
        }
    }

    /// Leave the file for the next scan. Valid from: `Pending`.
    pub fn retry(&mut self) -> Result<(), GatewayError> {
        match self {
            Self::Pending => Ok(()),
            _ => Err(GatewayError::InvalidTransition(
                "cannot retry: not in Pending state",
            )),
        }
    }

    /// Valid from: `Pending`.
    pub fn distributed(&mut self, messages: usize) -> Result<(), GatewayError> {
        match self {
            Self::Pending => {
                *self = Self::Distributed { messages };
                Ok(())
            }
            _ => Err(GatewayError::InvalidTransition(
                "cannot mark distributed: not in Pending state",
            )),
        }
    }

    /// Valid from: `Abandoned`, `Distributed`.
    pub fn finish(&mut self, disposal: Disposal) -> Result<(), GatewayError> {
        match self {
            Self::Abandoned { .. } | Self::Distributed { .. } => {
                *self = Self::Done { disposal };
                Ok(())
            }
            _ => Err(GatewayError::InvalidTransition(
                "cannot dispose: not in Abandoned or Distributed state",
            )),
        }
    }
}

// ── IngestPolicy ─────────────────────────────────────────────────

/// Outcome of a structural parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureAction {
    /// Leave the file in place; it may still be arriving.
    Retry,
    Abandon,
}

/// Age thresholds for the abandon/retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Files older than this on first sight are never parsed.
    pub file_age_max: Duration,
    /// How long a file that fails to parse is retried.
    pub retry_window: Duration,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            file_age_max: Duration::from_secs(7200),
            retry_window: Duration::from_secs(60),
        }
    }
}

impl IngestPolicy {
    pub fn new(file_age_max: Duration, retry_window: Duration) -> Self {
        Self {
            file_age_max,
            retry_window,
        }
    }

    pub fn is_too_old(&self, age: Duration) -> bool {
        age > self.file_age_max
    }

    pub fn on_parse_failure(&self, age: Duration) -> ParseFailureAction {
        if age > self.retry_window {
            ParseFailureAction::Abandon
        } else {
            ParseFailureAction::Retry
        }
    }

    /// Apply the first-sight check to `phase`. Returns `true` if the
    /// file was abandoned.
    pub fn check_age(&self, phase: &mut IngestPhase, age: Duration) -> Result<bool, GatewayError> {
        if self.is_too_old(age) {
            phase.abandon(AbandonReason::TooOld)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Apply the parse-failure rule to `phase`.
    pub fn parse_failed(
        &self,
        phase: &mut IngestPhase,
        age: Duration,
    ) -> Result<ParseFailureAction, GatewayError> {
        let action = self.on_parse_failure(age);
        match action {
            ParseFailureAction::Retry => phase.retry()?,
            ParseFailureAction::Abandon => phase.abandon(AbandonReason::ParseFailed)?,
        }
        Ok(action)
    }
}

// ── Tests ────────────────────────────────────────────────────────
