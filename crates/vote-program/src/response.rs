//! Invocation results

use crate::error::{Rejection, VoteError};

/// What a handler decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call went through; payload is the response body
    Accepted(Vec<u8>),
    /// A precondition failed and nothing was written
    Rejected(Rejection),
}

impl Outcome {
    /// Accepted outcome with a text payload
    pub fn message(text: impl Into<String>) -> Self {
        Outcome::Accepted(text.into().into_bytes())
    }

    /// Accepted outcome with no payload
    pub fn empty() -> Self {
        Outcome::Accepted(Vec::new())
    }

    /// Response body. Rejections carry their message.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Outcome::Accepted(payload) => payload.clone(),
            Outcome::Rejected(rejection) => rejection.to_string().into_bytes(),
        }
    }
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

/// Transport-level response
///
/// Rejections are flattened into `Success` so that only infrastructure and
/// dispatch failures show up as `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(Vec<u8>),
    Error(String),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Payload or error text as a string
    pub fn text(&self) -> String {
        match self {
            Response::Success(payload) => String::from_utf8_lossy(payload).into_owned(),
            Response::Error(message) => message.clone(),
        }
    }
}

impl From<Result<Outcome, VoteError>> for Response {
    fn from(result: Result<Outcome, VoteError>) -> Self {
        match result {
            Ok(outcome) => Response::Success(outcome.payload()),
            Err(e) => Response::Error(e.to_string()),
        }
    }
}
