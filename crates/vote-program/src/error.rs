//! Vote Program Errors

use thiserror::Error;

/// Failure reported by the backing ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("failed to read state for key {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write state for key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("failed to scan range [{start}, {end}): {reason}")]
    Range {
        start: String,
        end: String,
        reason: String,
    },
}

/// Vote program errors
///
/// These are failure responses. Rule violations such as voting twice are not
/// errors; they are reported through [`crate::Rejection`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Invalid Smart Contract function name.")]
    InvalidFunctionName { name: String },

    #[error("Incorrect number of arguments. Expecting {expected}")]
    IncorrectArgumentCount { expected: usize, got: usize },

    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to encode record: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for VoteError {
    fn from(e: serde_json::Error) -> Self {
        VoteError::Encoding(e.to_string())
    }
}

/// Business-rule rejections
///
/// A rejected call leaves the ledger untouched and is still answered with a
/// success response whose payload is the message below.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Election has not started yet")]
    NotStarted,

    #[error("Election ended")]
    Ended,

    #[error("Invalid Voter ID")]
    InvalidVoter,

    #[error("You have already voted")]
    AlreadyVoted,

    #[error("Invalid Candidate ID")]
    InvalidCandidate,
}
