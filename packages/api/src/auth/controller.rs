//! # AuthFlowController — runs the auth machine against real services
//!
//! The controller owns an [`AuthMachine`] and performs the [`Effect`]s each
//! transition asks for:
//!
//! | Effect | Performed by |
//! |---|---|
//! | `SignUp`, `SignIn`, `ListFactors`, `ResetPassword`, `Enroll`, `Challenge`, `Verify` | the [`CredentialVerifier`], as a [`Call`] |
//! | `RecordFailure`, `ClearAttempts` | the [`AttemptTracker`] |
//! | `IssueRecoveryCodes` | [`generate_recovery_codes`] |
//! | `Notify`, `Reject`, `ResetCaptcha`, `Outcome` | collected into the [`Report`] |
//!
//! [`dispatch`](AuthFlowController::dispatch) is the everyday entry point: it
//! applies an input, runs any verifier calls and feeds their replies back
//! until the machine settles. UIs that need to stay responsive while a call is
//! in flight can drive the two halves themselves with
//! [`apply`](AuthFlowController::apply) and
//! [`execute`](AuthFlowController::execute); a reply that comes back after the
//! user navigated away is dropped by the machine.

use std::collections::VecDeque;
use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::attempts::{AttemptTracker, RiskLevel};
use super::clock::{Clock, SystemClock};
use super::error::{AuthError, FlowError};
use super::machine::{AuthMachine, AuthState, Context, Effect, Input, Outcome, Reply};
use super::notice::Notice;
use super::recovery::generate_recovery_codes;
use super::validate::normalize_email;
use super::verifier::{CredentialVerifier, VerifierError};
use crate::settings::AuthSettings;
use store::AttemptStore;

/// Shown once, on the failure that locks the device.
fn lockout_notice(until: DateTime<Utc>) -> String {
    format!(
        "Too many failed attempts. Sign-in is paused until {} UTC.",
        until.format("%-I:%M %p")
    )
}

/// A verifier call waiting to be executed, tagged with the epoch it was
/// issued in.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    epoch: u64,
    effect: Effect,
}

impl Call {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

/// What the presentation layer needs to show after an input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub notices: Vec<Notice>,
    /// The most recent rejection, if any.
    pub error: Option<AuthError>,
    pub outcome: Option<Outcome>,
    /// The CAPTCHA widget must be reset.
    pub reset_captcha: bool,
    /// Verifier calls still to run (only non-empty after [`AuthFlowController::apply`]).
    pub calls: Vec<Call>,
}

impl Report {
    fn merge(&mut self, other: Report) {
        self.notices.extend(other.notices);
        if other.error.is_some() {
            self.error = other.error;
        }
        if other.outcome.is_some() {
            self.outcome = other.outcome;
        }
        self.reset_captcha |= other.reset_captcha;
        self.calls.extend(other.calls);
    }
}

pub struct AuthFlowController<V, S, C = SystemClock> {
    machine: AuthMachine,
    verifier: V,
    tracker: AttemptTracker<S>,
    clock: C,
    settings: AuthSettings,
    typed_email: String,
}

impl<V, S, C> AuthFlowController<V, S, C>
where
    V: CredentialVerifier,
    S: AttemptStore,
    C: Clock,
{
    pub fn new(verifier: V, store: S, clock: C, settings: AuthSettings) -> Self {
        let tracker = AttemptTracker::new(store, settings.attempt_policy());
        Self {
            machine: AuthMachine::new(),
            verifier,
            tracker,
            clock,
            settings,
            typed_email: String::new(),
        }
    }

    /// Start from `state` instead of the sign-in form.
    pub fn with_state(mut self, state: AuthState) -> Self {
        self.machine = AuthMachine::resume(state);
        self
    }

    pub fn state(&self) -> &AuthState {
        self.machine.state()
    }

    pub fn flow_id(&self) -> Uuid {
        self.machine.flow_id()
    }

    pub fn tracker(&self) -> &AttemptTracker<S> {
        &self.tracker
    }

    /// Track the email currently in the form so [`risk_level`](Self::risk_level)
    /// can account for it.
    pub fn set_email(&mut self, email: &str) {
        self.typed_email = normalize_email(email);
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.tracker
            .risk_level(Some(&self.typed_email), self.clock.now())
    }

    pub fn lockout_until(&self) -> Option<DateTime<Utc>> {
        self.tracker.lockout_until(self.clock.now())
    }

    /// Apply `input` and run every verifier call it leads to.
    pub async fn dispatch(&mut self, input: Input) -> Result<Report, FlowError> {
        let mut report = self.apply(input)?;
        while !report.calls.is_empty() {
            let calls = std::mem::take(&mut report.calls);
            for call in calls {
                let Some(reply) = self.execute(call).await else {
                    continue;
                };
                let next = self.apply(reply)?;
                report.merge(next);
            }
        }
        Ok(report)
    }

    /// Apply `input` and perform its local effects. Verifier calls are
    /// returned in [`Report::calls`] rather than run.
    pub fn apply(&mut self, input: Input) -> Result<Report, FlowError> {
        let span = tracing::info_span!("auth_flow", flow_id = %self.machine.flow_id());
        let _guard = span.enter();

        let mut report = Report::default();
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let ctx = self.context();
            let effects = self.machine.handle(input, &ctx)?;
            let epoch = self.machine.state().epoch;

            for effect in effects {
                match effect {
                    Effect::RecordFailure { email } => {
                        let now = self.clock.now();
                        if let Some(until) = self.tracker.record_failure(Some(&email), now) {
                            report.notices.push(Notice::warning(lockout_notice(until)));
                        }
                    }
                    Effect::ClearAttempts { email } => self.tracker.clear(Some(&email)),
                    Effect::ResetCaptcha => report.reset_captcha = true,
                    Effect::Notify(notice) => report.notices.push(notice),
                    Effect::Reject(error) => report.error = Some(error),
                    Effect::Outcome(outcome) => report.outcome = Some(outcome),
                    Effect::IssueRecoveryCodes => {
                        let codes = generate_recovery_codes(
                            &mut rand::thread_rng(),
                            self.settings.recovery_code_count,
                        );
                        queue.push_back(Input::Reply {
                            epoch,
                            reply: Reply::RecoveryCodes(codes),
                        });
                    }
                    call => report.calls.push(Call {
                        epoch,
                        effect: call,
                    }),
                }
            }
        }
        Ok(report)
    }

    /// Run one verifier call and return the reply to feed back through
    /// [`apply`](Self::apply).
    pub async fn execute(&self, call: Call) -> Option<Input> {
        let Call { epoch, effect } = call;
        let v = &self.verifier;
        let reply = match effect {
            Effect::SignUp {
                email,
                password,
                captcha_token,
            } => Reply::SignUp(
                self.bounded(v.sign_up(&email, password.expose(), Some(captcha_token.expose())))
                    .await,
            ),
            Effect::SignIn { email, password } => Reply::SignIn(
                self.bounded(v.sign_in_with_password(&email, password.expose()))
                    .await,
            ),
            Effect::ListFactors { session } => {
                Reply::Factors(self.bounded(v.mfa_list_factors(&session)).await)
            }
            Effect::ResetPassword { email } => Reply::Reset(
                self.bounded(
                    v.reset_password_for_email(&email, &self.settings.password_reset_redirect),
                )
                .await,
            ),
            Effect::Enroll {
                session,
                factor_type,
            } => Reply::Enrolled(self.bounded(v.mfa_enroll(&session, factor_type)).await),
            Effect::Challenge { session, factor_id } => {
                Reply::Challenged(self.bounded(v.mfa_challenge(&session, &factor_id)).await)
            }
            Effect::Verify {
                session,
                factor_id,
                challenge_id,
                code,
            } => Reply::Verified(
                self.bounded(v.mfa_verify(&session, &factor_id, &challenge_id, code.expose()))
                    .await,
            ),
            other => {
                tracing::warn!(effect = ?other, "not a verifier call");
                return None;
            }
        };
        Some(Input::Reply { epoch, reply })
    }

    fn context(&self) -> Context {
        Context {
            lockout_until: self.tracker.lockout_until(self.clock.now()),
            min_password_length: self.settings.min_password_length,
            code_length: self.settings.mfa_code_length,
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, VerifierError>>,
    ) -> Result<T, VerifierError> {
        match self.settings.verifier_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| {
                    tracing::warn!(?limit, "verifier call timed out");
                    Err(VerifierError::Timeout)
                }),
            None => call.await,
        }
    }
}
