//! Session data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication assurance level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssuranceLevel {
    /// Password only.
    Aal1,
    /// Password plus a verified second factor.
    Aal2,
}

/// The authenticated user as the backend reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

/// A session issued by the credential verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: SessionUser,
    /// Level this session currently satisfies.
    pub current_level: AssuranceLevel,
    /// Level the account could reach (aal2 when a verified factor exists).
    pub next_level: AssuranceLevel,
}

impl Session {
    /// Whether a second factor is still outstanding for this session.
    pub fn needs_second_factor(&self) -> bool {
        self.current_level < self.next_level
    }
}

/// Outcome of a sign-up call. `session` is `None` while the backend waits
/// for the user to confirm their email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUp {
    pub user: SessionUser,
    pub session: Option<Session>,
}
