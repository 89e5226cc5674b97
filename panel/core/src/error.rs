//! Poll Errors
//!
//! Every fetcher, the dedup store, the sensor and the display report failures
//! through [`PollError`]. None of these are fatal: the render loop maps any
//! error to empty output and carries on with the next poll.

use thiserror::Error;

/// Errors raised while polling a source or driving the display
#[derive(Debug, Error)]
pub enum PollError {
    /// Remote endpoint unreachable, timed out or answered with a non-2xx status
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be parsed or lacked a required field
    #[error("parse error: {0}")]
    Parse(String),

    /// An external utility could not be run or produced unusable output
    #[error("subprocess error: {0}")]
    Subprocess(String),

    /// Reading or appending the dedup log failed
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Display or sensor hardware failed
    #[error("hardware error: {0}")]
    Hardware(String),
}

impl PollError {
    /// Short label for the error kind, used as a structured log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Subprocess(_) => "subprocess",
            Self::Storage(_) => "storage",
            Self::Hardware(_) => "hardware",
        }
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
