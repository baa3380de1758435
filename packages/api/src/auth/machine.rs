//! # Auth flow state machine
//!
//! The sign-in page as an explicit finite-state machine. [`transition`] is a pure
//! function: given the current [`AuthState`], one [`Input`] and a [`Context`]
//! snapshot (lockout status, form limits), it returns the next state plus the
//! list of [`Effect`]s the caller must carry out. It never performs I/O.
//!
//! ## Steps
//!
//! ```text
//!              ┌──────── Back ────────┐
//!              ▼                      │
//! Credentials ──(sign-in, aal2 due)──▶ MfaChallenge ──(code ok)──▶ Complete
//!    │   ▲  └──(sign-in/sign-up ok)──────────────────────────────▶ Complete
//!    │   └──── done / Back ───┐                                       │
//!    └── ForgotPassword ──────┘                          BeginEnrollment
//!                                                                     ▼
//!                       MfaEnrollment: Setup ─▶ Verify ─▶ Recovery ─▶ Complete
//! ```
//!
//! ## Verifier replies
//!
//! Every effect that calls a verifier is answered with [`Input::Reply`] tagged
//! with the state's `epoch` at the time the effect was issued. Navigating
//! between steps bumps the epoch, so a reply that arrives after the user moved
//! on is dropped instead of being applied to a step it was not meant for.
//!
//! ## Attempt bookkeeping
//!
//! The machine only asks for bookkeeping through [`Effect::RecordFailure`] and
//! [`Effect::ClearAttempts`]; lockout status comes in through the
//! [`Context`]. Leaving `MfaChallenge` via `Back` emits neither, so going back
//! never costs or refunds an attempt.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::classify::{classify, AuthMode, ErrorKind};
use super::error::{AuthError, FlowError};
use super::notice::Notice;
use super::secret::Secret;
use super::session::{Session, SignUp};
use super::validate;
use super::verifier::{Challenge, ChallengeEvent, Enrollment, Factor, FactorType, VerifierError};

pub const INVALID_CODE: &str = "Invalid verification code. Please try again.";
pub const SIGN_IN_INCOMPLETE: &str = "We couldn't complete sign-in. Please try again.";
pub const RESET_SENT: &str =
    "If an account exists for that email, a password reset link is on its way.";
pub const ENTER_MFA_CODE: &str = "Enter the 6-digit code from your authenticator app.";
pub const ACCOUNT_CREATED: &str = "Account created. Welcome to Eloura!";
pub const CONFIRM_EMAIL: &str = "Account created. Please check your email to confirm your account.";

/// What the user typed into the credentials form.
#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: Secret,
    pub confirm_password: Option<Secret>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            confirm_password: None,
        }
    }

    pub fn with_confirmation(mut self, confirm: impl Into<Secret>) -> Self {
        self.confirm_password = Some(confirm.into());
        self
    }
}

/// Sub-steps of TOTP enrollment.
#[derive(Clone, Debug, PartialEq)]
pub enum EnrollmentPhase {
    /// Waiting for (or showing) the QR code and secret.
    Setup { material: Option<Enrollment> },
    /// Waiting for the first code from the new factor.
    Verify { material: Enrollment },
    /// Showing the one-time recovery codes.
    Recovery { codes: Vec<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthStep {
    Credentials {
        mode: AuthMode,
        /// Set when a sign-up was refused for lack of a CAPTCHA token.
        captcha_required: bool,
    },
    MfaChallenge {
        session: Session,
        factor_id: String,
    },
    MfaEnrollment {
        session: Session,
        phase: EnrollmentPhase,
        skippable: bool,
    },
    ForgotPassword,
    /// The session has been handed off; nothing else happens on this page.
    Complete,
}

impl AuthStep {
    pub fn credentials(mode: AuthMode) -> Self {
        Self::Credentials {
            mode,
            captcha_required: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Credentials { .. } => "Credentials",
            Self::MfaChallenge { .. } => "MfaChallenge",
            Self::MfaEnrollment { .. } => "MfaEnrollment",
            Self::ForgotPassword => "ForgotPassword",
            Self::Complete => "Complete",
        }
    }

    /// Session and factor a submitted code is checked against.
    fn mfa_target(&self) -> Option<(Session, String)> {
        match self {
            Self::MfaChallenge { session, factor_id } => Some((session.clone(), factor_id.clone())),
            Self::MfaEnrollment {
                session,
                phase: EnrollmentPhase::Verify { material },
                ..
            } => Some((session.clone(), material.factor_id.clone())),
            _ => None,
        }
    }
}

/// The verifier call currently in flight.
#[derive(Clone, Debug, PartialEq)]
pub enum Pending {
    SignUp,
    SignIn,
    Factors { session: Session },
    Reset,
    Enroll,
    Challenge { code: Secret },
    Verify,
    RecoveryCodes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub step: AuthStep,
    /// Normalised email of the last submission.
    pub email: String,
    pub challenge_token: Option<Secret>,
    pub pending: Option<Pending>,
    pub epoch: u64,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            step: AuthStep::credentials(AuthMode::SignIn),
            email: String::new(),
            challenge_token: None,
            pending: None,
            epoch: 0,
        }
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for an already signed-in user (e.g. enrolling MFA from settings).
    pub fn authenticated() -> Self {
        Self {
            step: AuthStep::Complete,
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    fn goto(&mut self, step: AuthStep) {
        tracing::debug!(from = self.step.name(), to = step.name(), "auth step");
        self.step = step;
        self.pending = None;
        self.epoch += 1;
    }
}

/// A verifier's answer to an earlier effect.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    SignUp(Result<SignUp, VerifierError>),
    SignIn(Result<Session, VerifierError>),
    Factors(Result<Vec<Factor>, VerifierError>),
    Reset(Result<(), VerifierError>),
    Enrolled(Result<Enrollment, VerifierError>),
    Challenged(Result<Challenge, VerifierError>),
    Verified(Result<Session, VerifierError>),
    RecoveryCodes(Vec<String>),
}

impl Reply {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignUp(_) => "SignUp",
            Self::SignIn(_) => "SignIn",
            Self::Factors(_) => "Factors",
            Self::Reset(_) => "Reset",
            Self::Enrolled(_) => "Enrolled",
            Self::Challenged(_) => "Challenged",
            Self::Verified(_) => "Verified",
            Self::RecoveryCodes(_) => "RecoveryCodes",
        }
    }

    fn answers(&self, pending: Option<&Pending>) -> bool {
        matches!(
            (self, pending),
            (Self::SignUp(_), Some(Pending::SignUp))
                | (Self::SignIn(_), Some(Pending::SignIn))
                | (Self::Factors(_), Some(Pending::Factors { .. }))
                | (Self::Reset(_), Some(Pending::Reset))
                | (Self::Enrolled(_), Some(Pending::Enroll))
                | (Self::Challenged(_), Some(Pending::Challenge { .. }))
                | (Self::Verified(_), Some(Pending::Verify))
                | (Self::RecoveryCodes(_), Some(Pending::RecoveryCodes))
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    SelectMode(AuthMode),
    Submit(Credentials),
    Challenge(ChallengeEvent),
    ForgotPassword,
    RequestReset { email: String },
    SubmitCode(String),
    BeginEnrollment { session: Session, skippable: bool },
    /// Move from setup to verify, or re-request material if none arrived.
    ContinueEnrollment,
    AcknowledgeRecovery,
    Skip,
    Back,
    Reply { epoch: u64, reply: Reply },
}

impl Input {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectMode(_) => "SelectMode",
            Self::Submit(_) => "Submit",
            Self::Challenge(_) => "Challenge",
            Self::ForgotPassword => "ForgotPassword",
            Self::RequestReset { .. } => "RequestReset",
            Self::SubmitCode(_) => "SubmitCode",
            Self::BeginEnrollment { .. } => "BeginEnrollment",
            Self::ContinueEnrollment => "ContinueEnrollment",
            Self::AcknowledgeRecovery => "AcknowledgeRecovery",
            Self::Skip => "Skip",
            Self::Back => "Back",
            Self::Reply { .. } => "Reply",
        }
    }
}

/// How the flow ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Authenticated(Session),
    SignedUp(SignUp),
    EnrollmentComplete(Session),
    EnrollmentSkipped(Session),
}

/// Work the caller must do after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    SignUp {
        email: String,
        password: Secret,
        captcha_token: Secret,
    },
    SignIn {
        email: String,
        password: Secret,
    },
    ListFactors {
        session: Session,
    },
    ResetPassword {
        email: String,
    },
    Enroll {
        session: Session,
        factor_type: FactorType,
    },
    Challenge {
        session: Session,
        factor_id: String,
    },
    Verify {
        session: Session,
        factor_id: String,
        challenge_id: String,
        code: Secret,
    },
    IssueRecoveryCodes,
    RecordFailure {
        email: String,
    },
    ClearAttempts {
        email: String,
    },
    /// Tell the CAPTCHA widget to produce a fresh token.
    ResetCaptcha,
    Notify(Notice),
    Reject(AuthError),
    Outcome(Outcome),
}

impl Effect {
    /// Whether carrying out this effect produces an [`Input::Reply`].
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Self::SignUp { .. }
                | Self::SignIn { .. }
                | Self::ListFactors { .. }
                | Self::ResetPassword { .. }
                | Self::Enroll { .. }
                | Self::Challenge { .. }
                | Self::Verify { .. }
                | Self::IssueRecoveryCodes
        )
    }
}

/// Facts from outside the machine needed to decide a transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    /// Set while the device is hard-locked.
    pub lockout_until: Option<DateTime<Utc>>,
    pub min_password_length: usize,
    pub code_length: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            lockout_until: None,
            min_password_length: 8,
            code_length: 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: AuthState,
    pub effects: Vec<Effect>,
}

/// Compute the next state and the effects for `input`.
pub fn transition(state: &AuthState, input: Input, ctx: &Context) -> Result<Transition, FlowError> {
    let mut next = state.clone();
    let mut effects = Vec::new();
    match input {
        Input::Reply { epoch, reply } => on_reply(&mut next, epoch, reply, &mut effects),
        other => on_user(&mut next, other, ctx, &mut effects)?,
    }
    Ok(Transition { next, effects })
}

fn on_user(
    s: &mut AuthState,
    input: Input,
    ctx: &Context,
    fx: &mut Vec<Effect>,
) -> Result<(), FlowError> {
    if s.step == AuthStep::Complete && !matches!(input, Input::BeginEnrollment { .. }) {
        return Err(FlowError::Finished);
    }
    let invalid = FlowError::InvalidTransition {
        state: s.step.name().to_string(),
        input: input.name().to_string(),
    };

    match input {
        Input::SelectMode(mode) => {
            if !matches!(s.step, AuthStep::Credentials { .. }) {
                return Err(invalid);
            }
            if s.is_busy() {
                return Err(FlowError::Busy);
            }
            s.step = AuthStep::credentials(mode);
        }

        Input::Submit(creds) => {
            let AuthStep::Credentials { mode, .. } = &s.step else {
                return Err(invalid);
            };
            let mode = *mode;
            if s.is_busy() {
                return Err(FlowError::Busy);
            }
            submit(s, mode, creds, ctx, fx);
        }

        Input::Challenge(ChallengeEvent::Verified(token)) => {
            s.challenge_token = Some(Secret::new(token));
            if let AuthStep::Credentials {
                captcha_required, ..
            } = &mut s.step
            {
                *captcha_required = false;
            }
        }

        Input::Challenge(ChallengeEvent::Expired) => {
            s.challenge_token = None;
        }

        Input::ForgotPassword => {
            if !matches!(s.step, AuthStep::Credentials { .. }) {
                return Err(invalid);
            }
            s.goto(AuthStep::ForgotPassword);
        }

        Input::RequestReset { email } => {
            if s.step != AuthStep::ForgotPassword {
                return Err(invalid);
            }
            if s.is_busy() {
                return Err(FlowError::Busy);
            }
            let email = validate::normalize_email(&email);
            if let Err(msg) = validate::validate_email(&email) {
                fx.push(Effect::Reject(AuthError::Invalid(msg)));
                return Ok(());
            }
            s.email = email.clone();
            s.pending = Some(Pending::Reset);
            fx.push(Effect::ResetPassword { email });
        }

        Input::SubmitCode(code) => {
            let Some((session, factor_id)) = s.step.mfa_target() else {
                return Err(invalid);
            };
            if s.is_busy() {
                return Err(FlowError::Busy);
            }
            if let Err(msg) = validate::validate_code(&code, ctx.code_length) {
                fx.push(Effect::Reject(AuthError::Invalid(msg)));
                return Ok(());
            }
            s.pending = Some(Pending::Challenge {
                code: Secret::new(code.trim()),
            });
            fx.push(Effect::Challenge { session, factor_id });
        }

        Input::BeginEnrollment { session, skippable } => {
            if s.step != AuthStep::Complete {
                return Err(invalid);
            }
            s.goto(AuthStep::MfaEnrollment {
                session: session.clone(),
                phase: EnrollmentPhase::Setup { material: None },
                skippable,
            });
            s.pending = Some(Pending::Enroll);
            fx.push(Effect::Enroll {
                session,
                factor_type: FactorType::Totp,
            });
        }

        Input::ContinueEnrollment => {
            if s.is_busy() {
                return Err(FlowError::Busy);
            }
            let AuthStep::MfaEnrollment { session, phase, .. } = &mut s.step else {
                return Err(invalid);
            };
            let EnrollmentPhase::Setup { material } = phase else {
                return Err(invalid);
            };
            match material.clone() {
                Some(material) => *phase = EnrollmentPhase::Verify { material },
                None => {
                    let session = session.clone();
                    s.pending = Some(Pending::Enroll);
                    fx.push(Effect::Enroll {
                        session,
                        factor_type: FactorType::Totp,
                    });
                }
            }
        }

        Input::AcknowledgeRecovery => {
            let AuthStep::MfaEnrollment {
                session,
                phase: EnrollmentPhase::Recovery { .. },
                ..
            } = &s.step
            else {
                return Err(invalid);
            };
            let session = session.clone();
            tracing::info!("mfa enrollment complete");
            fx.push(Effect::Outcome(Outcome::EnrollmentComplete(session)));
            s.goto(AuthStep::Complete);
        }

        Input::Skip => {
            let AuthStep::MfaEnrollment {
                session,
                phase,
                skippable,
            } = &s.step
            else {
                return Err(invalid);
            };
            if !*skippable || matches!(phase, EnrollmentPhase::Recovery { .. }) {
                return Err(invalid);
            }
            let session = session.clone();
            fx.push(Effect::Outcome(Outcome::EnrollmentSkipped(session)));
            s.goto(AuthStep::Complete);
        }

        Input::Back => {
            if !matches!(s.step, AuthStep::MfaChallenge { .. } | AuthStep::ForgotPassword) {
                return Err(invalid);
            }
            s.goto(AuthStep::credentials(AuthMode::SignIn));
        }

        Input::Reply { .. } => return Err(invalid),
    }
    Ok(())
}

fn submit(s: &mut AuthState, mode: AuthMode, creds: Credentials, ctx: &Context, fx: &mut Vec<Effect>) {
    if let Some(retry_at) = ctx.lockout_until {
        tracing::info!(%retry_at, "submission rejected locally during lockout");
        fx.push(Effect::Reject(AuthError::RateLimited { retry_at }));
        return;
    }

    let email = validate::normalize_email(&creds.email);
    let checked = match mode {
        AuthMode::SignIn => validate::validate_sign_in(&email, creds.password.expose()),
        AuthMode::SignUp => validate::validate_sign_up(
            &email,
            creds.password.expose(),
            creds.confirm_password.as_ref().map(Secret::expose),
            ctx.min_password_length,
        ),
    };
    if let Err(msg) = checked {
        fx.push(Effect::Reject(AuthError::Invalid(msg)));
        return;
    }
    s.email = email.clone();

    match mode {
        AuthMode::SignUp => {
            let Some(captcha_token) = s.challenge_token.clone() else {
                s.step = AuthStep::Credentials {
                    mode,
                    captcha_required: true,
                };
                fx.push(Effect::Reject(AuthError::ChallengeRequired));
                return;
            };
            s.pending = Some(Pending::SignUp);
            fx.push(Effect::SignUp {
                email,
                password: creds.password,
                captcha_token,
            });
        }
        AuthMode::SignIn => {
            s.pending = Some(Pending::SignIn);
            fx.push(Effect::SignIn {
                email,
                password: creds.password,
            });
        }
    }
}

fn on_reply(s: &mut AuthState, epoch: u64, reply: Reply, fx: &mut Vec<Effect>) {
    if epoch != s.epoch || !reply.answers(s.pending.as_ref()) {
        tracing::debug!(
            reply = reply.name(),
            epoch,
            current = s.epoch,
            "discarding stale verifier reply"
        );
        return;
    }
    let pending = s.pending.take();

    match reply {
        Reply::SignUp(Ok(signup)) => {
            fx.push(Effect::ClearAttempts {
                email: s.email.clone(),
            });
            s.challenge_token = None;
            let message = if signup.session.is_some() {
                ACCOUNT_CREATED
            } else {
                CONFIRM_EMAIL
            };
            tracing::info!(confirmed = signup.session.is_some(), "sign-up succeeded");
            fx.push(Effect::Notify(Notice::success(message)));
            fx.push(Effect::Outcome(Outcome::SignedUp(signup)));
            s.goto(AuthStep::Complete);
        }

        Reply::SignUp(Err(e)) => {
            fx.push(Effect::RecordFailure {
                email: s.email.clone(),
            });
            let classified = classify(&e.signal(), &e.message(), AuthMode::SignUp);
            tracing::warn!(kind = ?classified.kind, "sign-up rejected");
            if classified.kind.requires_new_challenge() {
                s.challenge_token = None;
                if let AuthStep::Credentials {
                    captcha_required, ..
                } = &mut s.step
                {
                    *captcha_required = true;
                }
                fx.push(Effect::ResetCaptcha);
            }
            fx.push(Effect::Reject(rejection(classified.kind, classified.message)));
        }

        Reply::SignIn(Ok(session)) => {
            fx.push(Effect::ClearAttempts {
                email: s.email.clone(),
            });
            if session.needs_second_factor() {
                s.pending = Some(Pending::Factors {
                    session: session.clone(),
                });
                fx.push(Effect::ListFactors { session });
            } else {
                authenticated(s, session, fx);
            }
        }

        Reply::SignIn(Err(e)) => {
            fx.push(Effect::RecordFailure {
                email: s.email.clone(),
            });
            let classified = classify(&e.signal(), &e.message(), AuthMode::SignIn);
            tracing::warn!(kind = ?classified.kind, "sign-in rejected");
            fx.push(Effect::Reject(rejection(classified.kind, classified.message)));
        }

        Reply::Factors(result) => {
            let Some(Pending::Factors { session }) = pending else {
                return;
            };
            match result {
                Ok(factors) => {
                    let enrolled = factors
                        .iter()
                        .find(|f| f.is_verified() && f.factor_type == FactorType::Totp);
                    match enrolled {
                        Some(factor) => {
                            let factor_id = factor.id.clone();
                            s.goto(AuthStep::MfaChallenge { session, factor_id });
                            fx.push(Effect::Notify(Notice::info(ENTER_MFA_CODE)));
                        }
                        None => authenticated(s, session, fx),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "listing mfa factors failed");
                    fx.push(Effect::Reject(AuthError::Unexpected(
                        SIGN_IN_INCOMPLETE.to_string(),
                    )));
                }
            }
        }

        Reply::Reset(result) => {
            match result {
                Ok(()) => fx.push(Effect::Notify(Notice::success(RESET_SENT))),
                Err(e) => {
                    let classified = classify(&e.signal(), &e.message(), AuthMode::SignIn);
                    fx.push(Effect::Notify(Notice::error(classified.message)));
                }
            }
            s.goto(AuthStep::credentials(AuthMode::SignIn));
        }

        Reply::Enrolled(result) => match result {
            Ok(material) => {
                if let AuthStep::MfaEnrollment { phase, .. } = &mut s.step {
                    *phase = EnrollmentPhase::Setup {
                        material: Some(material),
                    };
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "mfa enrollment failed");
                fx.push(Effect::Reject(AuthError::Unexpected(e.message())));
            }
        },

        Reply::Challenged(result) => {
            let Some(Pending::Challenge { code }) = pending else {
                return;
            };
            match result {
                Ok(challenge) => {
                    let Some((session, factor_id)) = s.step.mfa_target() else {
                        return;
                    };
                    s.pending = Some(Pending::Verify);
                    fx.push(Effect::Verify {
                        session,
                        factor_id,
                        challenge_id: challenge.id,
                        code,
                    });
                }
                Err(e) => reject_code(&e, fx),
            }
        }

        Reply::Verified(Ok(session)) => {
            if let AuthStep::MfaEnrollment {
                session: current, ..
            } = &mut s.step
            {
                *current = session;
                s.pending = Some(Pending::RecoveryCodes);
                fx.push(Effect::IssueRecoveryCodes);
            } else if matches!(s.step, AuthStep::MfaChallenge { .. }) {
                authenticated(s, session, fx);
            }
        }

        Reply::Verified(Err(e)) => reject_code(&e, fx),

        Reply::RecoveryCodes(codes) => {
            if let AuthStep::MfaEnrollment { phase, .. } = &mut s.step {
                *phase = EnrollmentPhase::Recovery { codes };
            }
        }
    }
}

fn authenticated(s: &mut AuthState, session: Session, fx: &mut Vec<Effect>) {
    tracing::info!(level = ?session.current_level, "session handed off");
    fx.push(Effect::Outcome(Outcome::Authenticated(session)));
    s.goto(AuthStep::Complete);
}

fn rejection(kind: ErrorKind, message: String) -> AuthError {
    match kind {
        ErrorKind::Unknown => AuthError::Unexpected(message),
        kind => AuthError::VerifierRejected { kind, message },
    }
}

fn reject_code(e: &VerifierError, fx: &mut Vec<Effect>) {
    tracing::warn!(error = %e, "mfa code rejected");
    fx.push(Effect::Reject(AuthError::VerifierRejected {
        kind: ErrorKind::detect(&e.signal()),
        message: INVALID_CODE.to_string(),
    }));
}

/// Owns an [`AuthState`] and applies [`transition`] to it.
#[derive(Clone, Debug)]
pub struct AuthMachine {
    state: AuthState,
    flow_id: Uuid,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self::resume(AuthState::new())
    }
}

impl AuthMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume(state: AuthState) -> Self {
        Self {
            state,
            flow_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// Apply `input`. On error the state is left untouched.
    pub fn handle(&mut self, input: Input, ctx: &Context) -> Result<Vec<Effect>, FlowError> {
        let span = tracing::debug_span!("auth_flow", flow_id = %self.flow_id);
        let _guard = span.enter();
        let Transition { next, effects } = transition(&self.state, input, ctx)?;
        self.state = next;
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::classify::{INVALID_CREDENTIALS, RATE_LIMITED};
    use crate::auth::session::{AssuranceLevel, SessionUser};
    use crate::auth::verifier::FactorStatus;
    use chrono::Duration;

    fn session(current: AssuranceLevel, next: AssuranceLevel) -> Session {
        Session {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: None,
            user: SessionUser {
                id: "u1".into(),
                email: Some("a@b.com".into()),
            },
            current_level: current,
            next_level: next,
        }
    }

    fn totp(id: &str, status: FactorStatus) -> Factor {
        Factor {
            id: id.into(),
            factor_type: FactorType::Totp,
            status,
            friendly_name: None,
        }
    }

    fn material() -> Enrollment {
        Enrollment {
            factor_id: "f-new".into(),
            qr_code: "<svg/>".into(),
            secret: "JBSWY3DPEHPK3PXP".into(),
            uri: None,
        }
    }

    fn reply(m: &mut AuthMachine, r: Reply) -> Vec<Effect> {
        let epoch = m.state().epoch;
        m.handle(Input::Reply { epoch, reply: r }, &Context::default())
            .unwrap()
    }

    fn user(m: &mut AuthMachine, input: Input) -> Vec<Effect> {
        m.handle(input, &Context::default()).unwrap()
    }

    fn sign_in_creds() -> Credentials {
        Credentials::new("A@B.com ", "correct horse")
    }

    #[test]
    fn test_sign_in_without_mfa_hands_off() {
        let mut m = AuthMachine::new();
        let fx = user(&mut m, Input::Submit(sign_in_creds()));
        assert_eq!(
            fx,
            vec![Effect::SignIn {
                email: "a@b.com".into(),
                password: "correct horse".into()
            }]
        );
        assert!(m.state().is_busy());

        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal1);
        let fx = reply(&mut m, Reply::SignIn(Ok(s.clone())));
        assert_eq!(
            fx,
            vec![
                Effect::ClearAttempts {
                    email: "a@b.com".into()
                },
                Effect::Outcome(Outcome::Authenticated(s)),
            ]
        );
        assert_eq!(m.state().step, AuthStep::Complete);
    }

    #[test]
    fn test_sign_in_failure_is_masked_and_counted() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::Submit(sign_in_creds()));
        let fx = reply(
            &mut m,
            Reply::SignIn(Err(VerifierError::rejected(
                "captcha verification process failed",
            ))),
        );
        assert_eq!(
            fx[0],
            Effect::RecordFailure {
                email: "a@b.com".into()
            }
        );
        let Effect::Reject(err) = &fx[1] else {
            panic!("expected a rejection, got {fx:?}");
        };
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        assert!(matches!(m.state().step, AuthStep::Credentials { .. }));
        assert!(!m.state().is_busy());
    }

    #[test]
    fn test_lockout_short_circuits() {
        let mut m = AuthMachine::new();
        let retry_at = Utc::now() + Duration::minutes(15);
        let ctx = Context {
            lockout_until: Some(retry_at),
            ..Context::default()
        };
        let fx = m.handle(Input::Submit(sign_in_creds()), &ctx).unwrap();
        assert_eq!(fx, vec![Effect::Reject(AuthError::RateLimited { retry_at })]);
        assert!(!fx.iter().any(Effect::expects_reply));
        assert!(!m.state().is_busy());
    }

    #[test]
    fn test_sign_up_requires_captcha_token() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        let creds = Credentials::new("new@b.com", "longenough").with_confirmation("longenough");

        let fx = user(&mut m, Input::Submit(creds.clone()));
        assert_eq!(fx, vec![Effect::Reject(AuthError::ChallengeRequired)]);
        assert_eq!(
            m.state().step,
            AuthStep::Credentials {
                mode: AuthMode::SignUp,
                captcha_required: true
            }
        );

        user(
            &mut m,
            Input::Challenge(ChallengeEvent::Verified("tok-1".into())),
        );
        let fx = user(&mut m, Input::Submit(creds));
        assert_eq!(
            fx,
            vec![Effect::SignUp {
                email: "new@b.com".into(),
                password: "longenough".into(),
                captcha_token: "tok-1".into(),
            }]
        );
    }

    #[test]
    fn test_expired_token_gates_again() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        user(&mut m, Input::Challenge(ChallengeEvent::Verified("t".into())));
        user(&mut m, Input::Challenge(ChallengeEvent::Expired));
        let fx = user(
            &mut m,
            Input::Submit(Credentials::new("new@b.com", "longenough")),
        );
        assert_eq!(fx, vec![Effect::Reject(AuthError::ChallengeRequired)]);
    }

    #[test]
    fn test_sign_up_captcha_failure_forces_new_token() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        user(&mut m, Input::Challenge(ChallengeEvent::Verified("t".into())));
        user(
            &mut m,
            Input::Submit(Credentials::new("new@b.com", "longenough")),
        );
        let fx = reply(
            &mut m,
            Reply::SignUp(Err(VerifierError::Rejected {
                status: Some(400),
                code: Some("captcha_failed".into()),
                message: "captcha protection: request disallowed".into(),
            })),
        );
        assert!(fx.contains(&Effect::ResetCaptcha));
        assert!(fx.contains(&Effect::RecordFailure {
            email: "new@b.com".into()
        }));
        assert!(m.state().challenge_token.is_none());
        assert_eq!(
            m.state().step,
            AuthStep::Credentials {
                mode: AuthMode::SignUp,
                captcha_required: true
            }
        );
    }

    #[test]
    fn test_sign_up_unknown_error_passes_through() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        user(&mut m, Input::Challenge(ChallengeEvent::Verified("t".into())));
        user(
            &mut m,
            Input::Submit(Credentials::new("new@b.com", "longenough")),
        );
        let fx = reply(
            &mut m,
            Reply::SignUp(Err(VerifierError::rejected("User already registered"))),
        );
        assert!(fx.contains(&Effect::Reject(AuthError::Unexpected(
            "User already registered".into()
        ))));
        // The token was fine; it is kept.
        assert!(m.state().challenge_token.is_some());
    }

    #[test]
    fn test_sign_up_success_clears_and_completes() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        user(&mut m, Input::Challenge(ChallengeEvent::Verified("t".into())));
        user(
            &mut m,
            Input::Submit(Credentials::new("new@b.com", "longenough")),
        );
        let signup = SignUp {
            user: SessionUser {
                id: "u2".into(),
                email: Some("new@b.com".into()),
            },
            session: None,
        };
        let fx = reply(&mut m, Reply::SignUp(Ok(signup.clone())));
        assert_eq!(
            fx,
            vec![
                Effect::ClearAttempts {
                    email: "new@b.com".into()
                },
                Effect::Notify(Notice::success(CONFIRM_EMAIL)),
                Effect::Outcome(Outcome::SignedUp(signup)),
            ]
        );
        assert_eq!(m.state().step, AuthStep::Complete);
        assert!(m.state().challenge_token.is_none());
    }

    #[test]
    fn test_validation_failures_do_not_call_or_count() {
        let mut m = AuthMachine::new();
        let fx = user(&mut m, Input::Submit(Credentials::new("", "")));
        assert!(matches!(fx.as_slice(), [Effect::Reject(AuthError::Invalid(_))]));

        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        let fx = user(
            &mut m,
            Input::Submit(Credentials::new("a@b.com", "short").with_confirmation("short")),
        );
        assert!(matches!(fx.as_slice(), [Effect::Reject(AuthError::Invalid(_))]));
        assert!(!m.state().is_busy());
    }

    #[test]
    fn test_busy_rejects_second_submit() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::Submit(sign_in_creds()));
        let err = m
            .handle(Input::Submit(sign_in_creds()), &Context::default())
            .unwrap_err();
        assert_eq!(err, FlowError::Busy);
    }

    #[test]
    fn test_mode_switch_while_busy_is_rejected() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::Submit(sign_in_creds()));
        let err = m
            .handle(Input::SelectMode(AuthMode::SignUp), &Context::default())
            .unwrap_err();
        assert_eq!(err, FlowError::Busy);
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));
    }

    #[test]
    fn test_mode_switch_clears_captcha_gate() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::SelectMode(AuthMode::SignUp));
        let creds = Credentials::new("new@b.com", "longenough").with_confirmation("longenough");
        user(&mut m, Input::Submit(creds));
        assert_eq!(
            m.state().step,
            AuthStep::Credentials {
                mode: AuthMode::SignUp,
                captcha_required: true
            }
        );

        user(&mut m, Input::SelectMode(AuthMode::SignIn));
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));
    }

    fn into_mfa_challenge(m: &mut AuthMachine) -> Session {
        user(m, Input::Submit(sign_in_creds()));
        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal2);
        let fx = reply(m, Reply::SignIn(Ok(s.clone())));
        assert_eq!(fx[1], Effect::ListFactors { session: s.clone() });
        let fx = reply(
            m,
            Reply::Factors(Ok(vec![
                totp("f-unverified", FactorStatus::Unverified),
                totp("f-1", FactorStatus::Verified),
            ])),
        );
        assert_eq!(fx, vec![Effect::Notify(Notice::info(ENTER_MFA_CODE))]);
        s
    }

    #[test]
    fn test_mfa_challenge_flow() {
        let mut m = AuthMachine::new();
        let s = into_mfa_challenge(&mut m);
        assert_eq!(
            m.state().step,
            AuthStep::MfaChallenge {
                session: s.clone(),
                factor_id: "f-1".into()
            }
        );

        let fx = user(&mut m, Input::SubmitCode("123456".into()));
        assert_eq!(
            fx,
            vec![Effect::Challenge {
                session: s.clone(),
                factor_id: "f-1".into()
            }]
        );
        let fx = reply(
            &mut m,
            Reply::Challenged(Ok(Challenge {
                id: "c-1".into(),
                expires_at: None,
            })),
        );
        assert_eq!(
            fx,
            vec![Effect::Verify {
                session: s,
                factor_id: "f-1".into(),
                challenge_id: "c-1".into(),
                code: "123456".into(),
            }]
        );

        // Wrong code: stay and allow retry.
        let fx = reply(
            &mut m,
            Reply::Verified(Err(VerifierError::rejected("Invalid TOTP code entered"))),
        );
        assert!(matches!(
            fx.as_slice(),
            [Effect::Reject(AuthError::VerifierRejected { message, .. })] if message == INVALID_CODE
        ));
        assert!(matches!(m.state().step, AuthStep::MfaChallenge { .. }));

        user(&mut m, Input::SubmitCode("654321".into()));
        reply(
            &mut m,
            Reply::Challenged(Ok(Challenge {
                id: "c-2".into(),
                expires_at: None,
            })),
        );
        let upgraded = session(AssuranceLevel::Aal2, AssuranceLevel::Aal2);
        let fx = reply(&mut m, Reply::Verified(Ok(upgraded.clone())));
        assert_eq!(fx, vec![Effect::Outcome(Outcome::Authenticated(upgraded))]);
        assert_eq!(m.state().step, AuthStep::Complete);
    }

    #[test]
    fn test_aal2_due_but_no_verified_factor_hands_off() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::Submit(sign_in_creds()));
        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal2);
        reply(&mut m, Reply::SignIn(Ok(s.clone())));
        let fx = reply(
            &mut m,
            Reply::Factors(Ok(vec![totp("f", FactorStatus::Unverified)])),
        );
        assert_eq!(fx, vec![Effect::Outcome(Outcome::Authenticated(s))]);
    }

    #[test]
    fn test_malformed_code_is_rejected_locally() {
        let mut m = AuthMachine::new();
        into_mfa_challenge(&mut m);
        let fx = user(&mut m, Input::SubmitCode("12ab56".into()));
        assert!(matches!(fx.as_slice(), [Effect::Reject(AuthError::Invalid(_))]));
        assert!(!m.state().is_busy());
    }

    #[test]
    fn test_back_from_mfa_discards_late_reply() {
        let mut m = AuthMachine::new();
        into_mfa_challenge(&mut m);
        user(&mut m, Input::SubmitCode("123456".into()));
        let stale_epoch = m.state().epoch;

        let fx = user(&mut m, Input::Back);
        assert!(fx.is_empty(), "going back must not touch attempt bookkeeping");
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));

        let fx = m
            .handle(
                Input::Reply {
                    epoch: stale_epoch,
                    reply: Reply::Challenged(Ok(Challenge {
                        id: "late".into(),
                        expires_at: None,
                    })),
                },
                &Context::default(),
            )
            .unwrap();
        assert!(fx.is_empty());
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));
    }

    #[test]
    fn test_forgot_password_round_trip() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::ForgotPassword);
        assert_eq!(m.state().step, AuthStep::ForgotPassword);

        let fx = user(
            &mut m,
            Input::RequestReset {
                email: "A@b.com".into(),
            },
        );
        assert_eq!(
            fx,
            vec![Effect::ResetPassword {
                email: "a@b.com".into()
            }]
        );
        let fx = reply(&mut m, Reply::Reset(Ok(())));
        assert_eq!(fx, vec![Effect::Notify(Notice::success(RESET_SENT))]);
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));

        user(&mut m, Input::ForgotPassword);
        user(
            &mut m,
            Input::RequestReset {
                email: "a@b.com".into(),
            },
        );
        let fx = reply(
            &mut m,
            Reply::Reset(Err(VerifierError::rejected("For security purposes, you can only request this after 60 seconds. Too many requests"))),
        );
        assert_eq!(fx, vec![Effect::Notify(Notice::error(RATE_LIMITED))]);
        assert_eq!(m.state().step, AuthStep::credentials(AuthMode::SignIn));
    }

    #[test]
    fn test_enrollment_flow() {
        let mut m = AuthMachine::resume(AuthState::authenticated());
        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal1);
        let fx = user(
            &mut m,
            Input::BeginEnrollment {
                session: s.clone(),
                skippable: true,
            },
        );
        assert_eq!(
            fx,
            vec![Effect::Enroll {
                session: s.clone(),
                factor_type: FactorType::Totp
            }]
        );

        reply(&mut m, Reply::Enrolled(Ok(material())));
        user(&mut m, Input::ContinueEnrollment);
        let fx = user(&mut m, Input::SubmitCode("111111".into()));
        assert_eq!(
            fx,
            vec![Effect::Challenge {
                session: s.clone(),
                factor_id: "f-new".into()
            }]
        );
        reply(
            &mut m,
            Reply::Challenged(Ok(Challenge {
                id: "c".into(),
                expires_at: None,
            })),
        );
        let upgraded = session(AssuranceLevel::Aal2, AssuranceLevel::Aal2);
        let fx = reply(&mut m, Reply::Verified(Ok(upgraded.clone())));
        assert_eq!(fx, vec![Effect::IssueRecoveryCodes]);

        let codes: Vec<String> = (0..10).map(|i| format!("CODE-{i:04}")).collect();
        reply(&mut m, Reply::RecoveryCodes(codes.clone()));
        let AuthStep::MfaEnrollment { phase, .. } = &m.state().step else {
            panic!("expected enrollment step");
        };
        assert_eq!(phase, &EnrollmentPhase::Recovery { codes });

        // Recovery cannot be skipped.
        assert!(m.handle(Input::Skip, &Context::default()).is_err());

        let fx = user(&mut m, Input::AcknowledgeRecovery);
        assert_eq!(fx, vec![Effect::Outcome(Outcome::EnrollmentComplete(upgraded))]);
        assert_eq!(m.state().step, AuthStep::Complete);
    }

    #[test]
    fn test_enrollment_skip_rules() {
        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal1);

        let mut m = AuthMachine::resume(AuthState::authenticated());
        user(
            &mut m,
            Input::BeginEnrollment {
                session: s.clone(),
                skippable: false,
            },
        );
        reply(&mut m, Reply::Enrolled(Ok(material())));
        assert!(matches!(
            m.handle(Input::Skip, &Context::default()),
            Err(FlowError::InvalidTransition { .. })
        ));

        let mut m = AuthMachine::resume(AuthState::authenticated());
        user(
            &mut m,
            Input::BeginEnrollment {
                session: s.clone(),
                skippable: true,
            },
        );
        reply(&mut m, Reply::Enrolled(Ok(material())));
        user(&mut m, Input::ContinueEnrollment);
        let fx = user(&mut m, Input::Skip);
        assert_eq!(fx, vec![Effect::Outcome(Outcome::EnrollmentSkipped(s))]);
    }

    #[test]
    fn test_enrollment_retry_after_failure() {
        let mut m = AuthMachine::resume(AuthState::authenticated());
        let s = session(AssuranceLevel::Aal1, AssuranceLevel::Aal1);
        user(
            &mut m,
            Input::BeginEnrollment {
                session: s.clone(),
                skippable: true,
            },
        );
        let fx = reply(
            &mut m,
            Reply::Enrolled(Err(VerifierError::Transport("connection reset".into()))),
        );
        assert!(matches!(fx.as_slice(), [Effect::Reject(AuthError::Unexpected(_))]));

        let fx = user(&mut m, Input::ContinueEnrollment);
        assert_eq!(
            fx,
            vec![Effect::Enroll {
                session: s,
                factor_type: FactorType::Totp
            }]
        );
    }

    #[test]
    fn test_illegal_transitions() {
        let mut m = AuthMachine::new();
        for input in [
            Input::Back,
            Input::SubmitCode("123456".into()),
            Input::AcknowledgeRecovery,
            Input::Skip,
            Input::ContinueEnrollment,
        ] {
            let before = m.state().clone();
            assert!(matches!(
                m.handle(input, &Context::default()),
                Err(FlowError::InvalidTransition { .. })
            ));
            assert_eq!(m.state(), &before);
        }

        let mut done = AuthMachine::resume(AuthState::authenticated());
        assert_eq!(
            done.handle(Input::Submit(sign_in_creds()), &Context::default()),
            Err(FlowError::Finished)
        );
    }

    #[test]
    fn test_mismatched_reply_is_ignored() {
        let mut m = AuthMachine::new();
        user(&mut m, Input::Submit(sign_in_creds()));
        let fx = reply(&mut m, Reply::Reset(Ok(())));
        assert!(fx.is_empty());
        assert!(m.state().is_busy());
    }

    #[test]
    fn test_debug_output_hides_password() {
        let effect = Effect::SignIn {
            email: "a@b.com".into(),
            password: "hunter22".into(),
        };
        assert!(!format!("{effect:?}").contains("hunter22"));
    }
}
