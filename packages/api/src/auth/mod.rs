//! Authentication flow: credentials, CAPTCHA gating, attempt limiting, MFA
//! challenge and enrollment, password reset.
//!
//! [`machine`] holds the pure state machine; [`AuthFlowController`] drives it
//! against a [`CredentialVerifier`] (in production [`GoTrueClient`]) and an
//! [`store::AttemptStore`].

mod attempts;
mod classify;
mod clock;
mod controller;
mod error;
mod gotrue;
pub mod machine;
mod monitor;
mod notice;
mod recovery;
mod secret;
mod session;
pub mod validate;
mod verifier;

pub use attempts::{AttemptPolicy, AttemptTracker, RiskLevel};
pub use classify::{
    classify, classify_message, reveals_abuse_checks, AuthMode, Classified, ErrorKind,
    ADDITIONAL_VERIFICATION, COMPLETE_VERIFICATION, EMAIL_NOT_CONFIRMED, INVALID_CREDENTIALS,
    RATE_LIMITED, SIGNUP_DISABLED, UNUSUAL_ACTIVITY, WEAK_PASSWORD,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{AuthFlowController, Call, Report};
pub use error::{AuthError, FlowError};
pub use gotrue::GoTrueClient;
pub use machine::{AuthMachine, AuthState, AuthStep, Credentials, Input, Outcome};
pub use monitor::RiskMonitor;
pub use notice::{LogLevel, Notice};
pub use recovery::generate_recovery_codes;
pub use secret::Secret;
pub use session::{AssuranceLevel, Session, SessionUser, SignUp};
pub use verifier::{
    Challenge, ChallengeEvent, CredentialVerifier, Enrollment, Factor, FactorStatus, FactorType,
    VerifierError,
};
