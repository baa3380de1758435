//! Auth flow errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::classify::ErrorKind;

/// Why a submission did not produce a session, in user-facing terms.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// Rejected locally; the verifier was not called.
    #[error("Too many attempts. Please try again after {}.", .retry_at.format("%H:%M UTC"))]
    RateLimited { retry_at: DateTime<Utc> },

    /// Sign-up needs a CAPTCHA token first.
    #[error("Please complete the captcha verification and try again.")]
    ChallengeRequired,

    /// The verifier said no; `message` is already classified.
    #[error("{message}")]
    VerifierRejected { kind: ErrorKind, message: String },

    /// Anything the classifier did not recognise.
    #[error("{0}")]
    Unexpected(String),

    /// The form failed local validation.
    #[error("{0}")]
    Invalid(String),
}

/// The machine was asked to do something its current state does not allow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("invalid auth transition: {input} while in {state}")]
    InvalidTransition { state: String, input: String },

    #[error("a request is already in flight")]
    Busy,

    #[error("the auth flow has already completed")]
    Finished,
}
