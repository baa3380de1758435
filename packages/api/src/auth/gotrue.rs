//! # GoTrue HTTP client
//!
//! [`CredentialVerifier`] over the hosted auth backend's REST API (`/auth/v1`).
//!
//! | Operation | Request |
//! |---|---|
//! | sign up | `POST /signup` with `gotrue_meta_security.captcha_token` |
//! | sign in | `POST /token?grant_type=password` |
//! | reset password | `POST /recover?redirect_to=…` |
//! | enroll TOTP | `POST /factors` |
//! | challenge | `POST /factors/{id}/challenge` |
//! | verify | `POST /factors/{id}/verify` |
//! | list factors | `GET /user` |
//!
//! Every request carries the project's anon key in `apikey`. Calls on behalf
//! of a session send its access token as the bearer.
//!
//! The backend does not return assurance levels directly; the current level
//! is read from the `aal` claim of the access token and the next level is
//! `aal2` whenever the user has a verified factor.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::session::{AssuranceLevel, Session, SessionUser, SignUp};
use super::verifier::{
    Challenge, CredentialVerifier, Enrollment, Factor, FactorStatus, FactorType, VerifierError,
};
use crate::settings::Backend;

#[derive(Clone, Debug)]
pub struct GoTrueClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl GoTrueClient {
    pub fn new(backend: &Backend) -> Self {
        Self::with_client(Client::new(), backend)
    }

    pub fn with_client(http: Client, backend: &Backend) -> Self {
        Self {
            http,
            base_url: format!("{}/auth/v1", backend.url.trim_end_matches('/')),
            anon_key: backend.anon_key.clone(),
        }
    }

    fn post(&self, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)), bearer)
    }

    fn get(&self, path: &str, bearer: &str) -> RequestBuilder {
        self.authorize(self.http.get(format!("{}{path}", self.base_url)), Some(bearer))
    }

    fn authorize(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, VerifierError> {
        let body = Self::send(request).await?;
        serde_json::from_slice(&body)
            .map_err(|e| VerifierError::Transport(format!("unexpected response: {e}")))
    }

    async fn send(request: RequestBuilder) -> Result<Vec<u8>, VerifierError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            let err = parse_error(status, &body);
            tracing::debug!(status = status.as_u16(), error = %err, "auth backend rejected request");
            Err(err)
        }
    }
}

fn transport(e: reqwest::Error) -> VerifierError {
    if e.is_timeout() {
        VerifierError::Timeout
    } else {
        VerifierError::Transport(e.to_string())
    }
}

/// Error bodies come in two shapes: `{code, error_code, msg}` from the API
/// handlers and `{error, error_description}` from the token endpoint.
#[derive(Debug, Default, Deserialize)]
struct WireError {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_error(status: StatusCode, body: &[u8]) -> VerifierError {
    let wire: WireError = serde_json::from_slice(body).unwrap_or_default();
    let code = wire.error_code.or_else(|| wire.error.clone()).or_else(|| {
        (status == StatusCode::TOO_MANY_REQUESTS).then(|| "over_request_rate_limit".to_string())
    });
    let message = wire
        .msg
        .or(wire.message)
        .or(wire.error_description)
        .or(wire.error)
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    VerifierError::Rejected {
        status: Some(status.as_u16()),
        code,
        message,
    }
}

/// Read the `aal` claim without verifying the token; the backend does that.
fn assurance_level(access_token: &str) -> AssuranceLevel {
    #[derive(Deserialize)]
    struct Claims {
        aal: Option<AssuranceLevel>,
    }

    access_token
        .split('.')
        .nth(1)
        .and_then(|payload| URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok())
        .and_then(|bytes| serde_json::from_slice::<Claims>(&bytes).ok())
        .and_then(|claims| claims.aal)
        .unwrap_or(AssuranceLevel::Aal1)
}

#[derive(Debug, Deserialize)]
struct WireFactor {
    id: String,
    factor_type: String,
    status: String,
    friendly_name: Option<String>,
}

impl WireFactor {
    fn into_factor(self) -> Option<Factor> {
        let factor_type = match self.factor_type.as_str() {
            "totp" => FactorType::Totp,
            "phone" => FactorType::Phone,
            _ => return None,
        };
        let status = match self.status.as_str() {
            "verified" => FactorStatus::Verified,
            _ => FactorStatus::Unverified,
        };
        Some(Factor {
            id: self.id,
            factor_type,
            status,
            friendly_name: self.friendly_name,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    factors: Option<Vec<WireFactor>>,
}

impl WireUser {
    fn factors(self) -> Vec<Factor> {
        self.factors
            .unwrap_or_default()
            .into_iter()
            .filter_map(WireFactor::into_factor)
            .collect()
    }

    fn has_verified_factor(&self) -> bool {
        self.factors
            .iter()
            .flatten()
            .any(|f| f.status == "verified")
    }

    fn into_user(self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    user: WireUser,
}

impl WireSession {
    fn into_session(self) -> Session {
        let next_level = if self.user.has_verified_factor() {
            AssuranceLevel::Aal2
        } else {
            AssuranceLevel::Aal1
        };
        Session {
            current_level: assurance_level(&self.access_token),
            next_level,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            user: self.user.into_user(),
        }
    }
}

/// Sign-up answers with a session when email confirmation is off and with
/// the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSignUp {
    Session(WireSession),
    User(WireUser),
}

impl WireSignUp {
    fn into_sign_up(self) -> SignUp {
        match self {
            Self::Session(session) => {
                let session = session.into_session();
                SignUp {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            Self::User(user) => SignUp {
                user: user.into_user(),
                session: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEnrollment {
    id: String,
    totp: WireTotp,
}

#[derive(Debug, Deserialize)]
struct WireTotp {
    qr_code: String,
    secret: String,
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChallenge {
    id: String,
    expires_at: Option<i64>,
}

#[async_trait]
impl CredentialVerifier for GoTrueClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        captcha_token: Option<&str>,
    ) -> Result<SignUp, VerifierError> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(token) = captcha_token {
            body["gotrue_meta_security"] = json!({ "captcha_token": token });
        }
        let wire: WireSignUp = Self::fetch(self.post("/signup", None).json(&body)).await?;
        Ok(wire.into_sign_up())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, VerifierError> {
        let request = self
            .post("/token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let wire: WireSession = Self::fetch(request).await?;
        Ok(wire.into_session())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), VerifierError> {
        let request = self
            .post("/recover", None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        Self::send(request).await.map(|_| ())
    }

    async fn mfa_enroll(
        &self,
        session: &Session,
        factor_type: FactorType,
    ) -> Result<Enrollment, VerifierError> {
        let request = self
            .post("/factors", Some(&session.access_token))
            .json(&json!({ "factor_type": factor_type }));
        let wire: WireEnrollment = Self::fetch(request).await?;
        Ok(Enrollment {
            factor_id: wire.id,
            qr_code: wire.totp.qr_code,
            secret: wire.totp.secret,
            uri: wire.totp.uri,
        })
    }

    async fn mfa_challenge(
        &self,
        session: &Session,
        factor_id: &str,
    ) -> Result<Challenge, VerifierError> {
        let request = self
            .post(&format!("/factors/{factor_id}/challenge"), Some(&session.access_token))
            .json(&json!({}));
        let wire: WireChallenge = Self::fetch(request).await?;
        Ok(Challenge {
            id: wire.id,
            expires_at: wire
                .expires_at
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
        })
    }

    async fn mfa_verify(
        &self,
        session: &Session,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<Session, VerifierError> {
        let request = self
            .post(&format!("/factors/{factor_id}/verify"), Some(&session.access_token))
            .json(&json!({ "challenge_id": challenge_id, "code": code }));
        let wire: WireSession = Self::fetch(request).await?;
        Ok(wire.into_session())
    }

    async fn mfa_list_factors(&self, session: &Session) -> Result<Vec<Factor>, VerifierError> {
        let user: WireUser = Self::fetch(self.get("/user", &session.access_token)).await?;
        Ok(user.factors())
    }
}
