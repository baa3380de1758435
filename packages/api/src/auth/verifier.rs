//! # External verifiers
//!
//! The auth flow never checks credentials itself. It talks to two outside
//! services:
//!
//! - a [`CredentialVerifier`] (the hosted auth backend) which signs users up and
//!   in, sends password-reset emails and manages TOTP factors, and
//! - a CAPTCHA widget (the challenge verifier) which hands the flow a token via
//!   [`ChallengeEvent::Verified`] and withdraws it via [`ChallengeEvent::Expired`].
//!
//! [`crate::auth::GoTrueClient`] is the HTTP implementation used in production.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::{Session, SignUp};

/// Error returned by the credential verifier.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VerifierError {
    /// The backend answered with an error.
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// The request never got a usable answer.
    #[error("network error: {0}")]
    Transport(String),

    #[error("the request timed out")]
    Timeout,
}

impl VerifierError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Everything the classifier may match on: the machine-readable code
    /// followed by the human message.
    pub fn signal(&self) -> String {
        match self {
            Self::Rejected {
                code: Some(code),
                message,
                ..
            } => format!("{code} {message}"),
            other => other.to_string(),
        }
    }

    /// Text shown when nothing more specific applies.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorType {
    Totp,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Verified,
    Unverified,
}

/// An MFA factor registered on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub id: String,
    pub factor_type: FactorType,
    pub status: FactorStatus,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl Factor {
    pub fn is_verified(&self) -> bool {
        self.status == FactorStatus::Verified
    }
}

/// Material returned when enrolling a TOTP factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub factor_id: String,
    /// SVG (or data URI) of the provisioning QR code.
    pub qr_code: String,
    /// Base32 shared secret for manual entry.
    pub secret: String,
    pub uri: Option<String>,
}

/// A challenge issued against a factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Events emitted by the CAPTCHA widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeEvent {
    Verified(String),
    Expired,
}

/// The hosted auth backend.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        captcha_token: Option<&str>,
    ) -> Result<SignUp, VerifierError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, VerifierError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), VerifierError>;

    async fn mfa_enroll(
        &self,
        session: &Session,
        factor_type: FactorType,
    ) -> Result<Enrollment, VerifierError>;

    async fn mfa_challenge(
        &self,
        session: &Session,
        factor_id: &str,
    ) -> Result<Challenge, VerifierError>;

    async fn mfa_verify(
        &self,
        session: &Session,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<Session, VerifierError>;

    async fn mfa_list_factors(&self, session: &Session) -> Result<Vec<Factor>, VerifierError>;
}

#[async_trait]
impl<T: CredentialVerifier + ?Sized> CredentialVerifier for Arc<T> {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        captcha_token: Option<&str>,
    ) -> Result<SignUp, VerifierError> {
        (**self).sign_up(email, password, captcha_token).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, VerifierError> {
        (**self).sign_in_with_password(email, password).await
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), VerifierError> {
        (**self).reset_password_for_email(email, redirect_to).await
    }

    async fn mfa_enroll(
        &self,
        session: &Session,
        factor_type: FactorType,
    ) -> Result<Enrollment, VerifierError> {
        (**self).mfa_enroll(session, factor_type).await
    }

    async fn mfa_challenge(
        &self,
        session: &Session,
        factor_id: &str,
    ) -> Result<Challenge, VerifierError> {
        (**self).mfa_challenge(session, factor_id).await
    }

    async fn mfa_verify(
        &self,
        session: &Session,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<Session, VerifierError> {
        (**self)
            .mfa_verify(session, factor_id, challenge_id, code)
            .await
    }

    async fn mfa_list_factors(&self, session: &Session) -> Result<Vec<Factor>, VerifierError> {
        (**self).mfa_list_factors(session).await
    }
}
