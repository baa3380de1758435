//! # Verifier error classification
//!
//! Maps raw backend errors to the text a user sees. The mapping depends on
//! whether the failure happened during sign-up or sign-in:
//!
//! | raw signal contains | sign-up | sign-in |
//! |---|---|---|
//! | rate limit / too many requests | [`RATE_LIMITED`] | same |
//! | weak / breached password | [`WEAK_PASSWORD`] | [`INVALID_CREDENTIALS`] |
//! | invalid credentials | raw message | [`INVALID_CREDENTIALS`] |
//! | email not confirmed | [`EMAIL_NOT_CONFIRMED`] | same |
//! | signup disabled | [`SIGNUP_DISABLED`] | [`INVALID_CREDENTIALS`] |
//! | captcha | [`COMPLETE_VERIFICATION`] | [`INVALID_CREDENTIALS`] |
//! | bot / suspicious | [`UNUSUAL_ACTIVITY`] | [`INVALID_CREDENTIALS`] |
//! | challenge | [`ADDITIONAL_VERIFICATION`] | [`INVALID_CREDENTIALS`] |
//! | anything else | raw message | [`INVALID_CREDENTIALS`] |
//!
//! A sign-in failure never says why it failed beyond "bad credentials", apart
//! from the rate-limit and unconfirmed-email notices, which reveal nothing about
//! the anti-abuse checks. [`classify`] re-checks its own output for sign-in and
//! falls back to [`INVALID_CREDENTIALS`] if an abuse term would slip through.

use serde::{Deserialize, Serialize};

pub const INVALID_CREDENTIALS: &str =
    "Invalid email or password. Please check your credentials and try again.";
pub const RATE_LIMITED: &str =
    "Too many attempts. Please wait 15 minutes before trying again.";
pub const WEAK_PASSWORD: &str =
    "This password is too weak or too commonly used. Please choose a stronger password.";
pub const EMAIL_NOT_CONFIRMED: &str =
    "Please check your email and confirm your account before signing in.";
pub const SIGNUP_DISABLED: &str =
    "New registrations are currently disabled. Please try again later.";
pub const COMPLETE_VERIFICATION: &str =
    "Please complete the captcha verification and try again.";
pub const UNUSUAL_ACTIVITY: &str =
    "Unusual activity detected. Please wait a moment and try again.";
pub const ADDITIONAL_VERIFICATION: &str =
    "Additional verification required. Please complete the security challenge.";

/// Terms that must never reach a user during sign-in.
const ABUSE_TERMS: [&str; 4] = ["captcha", "bot", "suspicious", "challenge"];

/// Which form the error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

/// What the raw error turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    RateLimited,
    WeakPassword,
    InvalidCredentials,
    EmailNotConfirmed,
    SignupDisabled,
    Captcha,
    SuspiciousActivity,
    ChallengeRequired,
    Unknown,
}

impl ErrorKind {
    /// Detect the kind from a raw error signal (case-insensitive substrings).
    ///
    /// Abuse signals are checked before credential signals so that a message
    /// mentioning both is treated as the abuse case.
    pub fn detect(raw: &str) -> Self {
        let raw = raw.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| raw.contains(n));
        let has_word = |word: &str| {
            raw.split(|c: char| !c.is_ascii_alphanumeric())
                .any(|w| w == word || w == format!("{word}s"))
        };

        if has(&["rate limit", "rate_limit", "too many requests", "too many attempts"]) {
            Self::RateLimited
        } else if has(&["captcha"]) {
            Self::Captcha
        } else if has_word("bot") || has(&["suspicious"]) {
            Self::SuspiciousActivity
        } else if has(&["challenge"]) {
            Self::ChallengeRequired
        } else if has(&["weak", "pwned", "breach", "compromised", "commonly used"]) {
            Self::WeakPassword
        } else if has(&[
            "invalid login credentials",
            "invalid credentials",
            "invalid_credentials",
            "invalid email or password",
            "invalid_grant",
        ]) {
            Self::InvalidCredentials
        } else if has(&["email not confirmed", "email_not_confirmed"]) {
            Self::EmailNotConfirmed
        } else if has(&["signups not allowed", "signup is disabled", "signup_disabled"]) {
            Self::SignupDisabled
        } else {
            Self::Unknown
        }
    }

    /// Whether a sign-up failed because of the CAPTCHA token, in which case
    /// the widget must produce a fresh one.
    pub fn requires_new_challenge(&self) -> bool {
        matches!(self, Self::Captcha | Self::ChallengeRequired)
    }
}

/// A classified error ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classified {
    pub kind: ErrorKind,
    pub message: String,
}

/// Classify `raw` for the given form. `fallback` is the human-readable
/// message passed through when sign-up hits an unrecognised error.
pub fn classify(raw: &str, fallback: &str, mode: AuthMode) -> Classified {
    let kind = ErrorKind::detect(raw);
    let message = match mode {
        AuthMode::SignUp => signup_message(kind, fallback),
        AuthMode::SignIn => signin_message(kind),
    };
    Classified {
        kind,
        message: message.to_string(),
    }
}

/// Classify a plain message (the raw text doubles as the pass-through).
pub fn classify_message(raw: &str, mode: AuthMode) -> Classified {
    classify(raw, raw, mode)
}

fn signup_message(kind: ErrorKind, fallback: &str) -> &str {
    match kind {
        ErrorKind::RateLimited => RATE_LIMITED,
        ErrorKind::WeakPassword => WEAK_PASSWORD,
        ErrorKind::EmailNotConfirmed => EMAIL_NOT_CONFIRMED,
        ErrorKind::SignupDisabled => SIGNUP_DISABLED,
        ErrorKind::Captcha => COMPLETE_VERIFICATION,
        ErrorKind::SuspiciousActivity => UNUSUAL_ACTIVITY,
        ErrorKind::ChallengeRequired => ADDITIONAL_VERIFICATION,
        ErrorKind::InvalidCredentials | ErrorKind::Unknown => fallback,
    }
}

fn signin_message(kind: ErrorKind) -> &'static str {
    let message = match kind {
        ErrorKind::RateLimited => RATE_LIMITED,
        ErrorKind::EmailNotConfirmed => EMAIL_NOT_CONFIRMED,
        _ => INVALID_CREDENTIALS,
    };
    if reveals_abuse_checks(message) {
        INVALID_CREDENTIALS
    } else {
        message
    }
}

/// Whether `message` mentions an anti-abuse mechanism.
pub fn reveals_abuse_checks(message: &str) -> bool {
    let lower = message.to_lowercase();
    ABUSE_TERMS.iter().any(|term| lower.contains(term))
}
