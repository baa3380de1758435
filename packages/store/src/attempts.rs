//! # Failed-attempt bookkeeping
//!
//! Credential attempts are counted per [`Scope`]: one global counter for the
//! device and one counter per email address. The auth flow reads and writes
//! these records through the [`AttemptStore`] trait so the backing medium can
//! be swapped (in-memory for tests and native builds, browser storage on web).
//!
//! A reset clears every field of a record at once; the count of a scope only
//! grows between resets. A record expires `window` after its last failure;
//! stores check expiry inside the same step that reads or increments, so a
//! concurrent failure is never wiped by a stale reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The key under which failed attempts are tracked.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Email(String),
}

impl Scope {
    /// Per-email scope. Emails are trimmed and lowercased so that
    /// `Bob@Example.com ` and `bob@example.com` share a counter.
    pub fn email(email: &str) -> Self {
        Self::Email(email.trim().to_lowercase())
    }

    /// Storage key for this scope.
    pub fn key(&self) -> String {
        match self {
            Self::Global => "auth_attempts".to_string(),
            Self::Email(email) => format!("auth_attempts_{email}"),
        }
    }
}

/// One scope's attempt record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Whether a cooldown is set and has not yet passed at `now`.
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now <= until)
    }

    /// Whether the last failure is more than `window` before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_attempt_at.is_some_and(|last| now > last + window)
    }
}

/// Storage for attempt records.
///
/// Implementations must make `increment` a single read-modify-write so that
/// concurrent failures on one scope never lose a count.
pub trait AttemptStore {
    /// Current record for `scope` (the default record if none is stored).
    fn get(&self, scope: &Scope) -> AttemptRecord;

    /// Current record for `scope`, cleared first if it has expired at `now`.
    fn expire(&self, scope: &Scope, now: DateTime<Utc>, window: Duration) -> AttemptRecord;

    /// Record a failure at `at` and return the updated record. An expired
    /// record restarts from zero in the same step.
    fn increment(&self, scope: &Scope, at: DateTime<Utc>, window: Duration) -> AttemptRecord;

    /// Set or clear the cooldown on an existing record.
    fn set_cooldown(&self, scope: &Scope, until: Option<DateTime<Utc>>);

    /// Clear the record for `scope`.
    fn reset(&self, scope: &Scope);
}

impl<S: AttemptStore + ?Sized> AttemptStore for std::sync::Arc<S> {
    fn get(&self, scope: &Scope) -> AttemptRecord {
        (**self).get(scope)
    }

    fn expire(&self, scope: &Scope, now: DateTime<Utc>, window: Duration) -> AttemptRecord {
        (**self).expire(scope, now, window)
    }

    fn increment(&self, scope: &Scope, at: DateTime<Utc>, window: Duration) -> AttemptRecord {
        (**self).increment(scope, at, window)
    }

    fn set_cooldown(&self, scope: &Scope, until: Option<DateTime<Utc>>) {
        (**self).set_cooldown(scope, until)
    }

    fn reset(&self, scope: &Scope) {
        (**self).reset(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_scope_is_normalized() {
        assert_eq!(Scope::email(" Bob@Example.COM "), Scope::email("bob@example.com"));
        assert_eq!(Scope::email("a@b.c").key(), "auth_attempts_a@b.c");
        assert_eq!(Scope::Global.key(), "auth_attempts");
    }

    #[test]
    fn test_cooldown_window_is_inclusive() {
        let now = Utc::now();
        let record = AttemptRecord {
            count: 10,
            last_attempt_at: Some(now),
            cooldown_until: Some(now + Duration::minutes(15)),
        };
        assert!(record.is_cooling_down(now));
        assert!(record.is_cooling_down(now + Duration::minutes(15)));
        assert!(!record.is_cooling_down(now + Duration::minutes(15) + Duration::seconds(1)));
        assert!(!AttemptRecord::default().is_cooling_down(now));
    }

    #[test]
    fn test_expiry_is_measured_from_last_failure() {
        let now = Utc::now();
        let window = Duration::minutes(15);
        let record = AttemptRecord {
            count: 3,
            last_attempt_at: Some(now),
            cooldown_until: None,
        };
        assert!(!record.is_expired(now + window, window));
        assert!(record.is_expired(now + window + Duration::seconds(1), window));
        assert!(!AttemptRecord::default().is_expired(now, window));
    }
}
