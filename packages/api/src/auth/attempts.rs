//! # Attempt tracking, risk level and hard lockout
//!
//! [`AttemptTracker`] wraps an [`AttemptStore`] with the policy the sign-in page
//! applies to failed credential submissions:
//!
//! - Every failure increments the global counter and, when an email was given,
//!   that email's counter.
//! - Each record expires one lockout window after its last failure; the store
//!   resets an expired record in the same step that reads or increments it.
//! - [`RiskLevel::High`] once the global count reaches `global_high_risk` or the
//!   current email's count reaches `email_high_risk`.
//! - Hard lockout once the global count reaches `lockout_threshold`: the
//!   global record's `cooldown_until` is set to one window after that failure
//!   and submissions are rejected locally until it has passed.
//! - Any success clears both scopes.
//!
//! All methods take `now` explicitly so that callers decide where time comes from.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use store::{AttemptRecord, AttemptStore, Scope};

/// Thresholds applied to attempt counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub global_high_risk: u32,
    pub email_high_risk: u32,
    pub lockout_threshold: u32,
    pub lockout_window: Duration,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            global_high_risk: 8,
            email_high_risk: 5,
            lockout_threshold: 10,
            lockout_window: Duration::minutes(15),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    Low,
    High,
}

/// Applies an [`AttemptPolicy`] to an [`AttemptStore`].
#[derive(Clone, Debug)]
pub struct AttemptTracker<S> {
    store: S,
    policy: AttemptPolicy,
}

impl<S: AttemptStore> AttemptTracker<S> {
    pub fn new(store: S, policy: AttemptPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current record for `scope`, resetting it first if its window has elapsed.
    pub fn record(&self, scope: &Scope, now: DateTime<Utc>) -> AttemptRecord {
        self.store.expire(scope, now, self.policy.lockout_window)
    }

    pub fn risk_level(&self, email: Option<&str>, now: DateTime<Utc>) -> RiskLevel {
        let global = self.record(&Scope::Global, now).count;
        let per_email = email
            .filter(|e| !e.trim().is_empty())
            .map(|e| self.record(&Scope::email(e), now).count)
            .unwrap_or(0);

        if global >= self.policy.global_high_risk || per_email >= self.policy.email_high_risk {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    /// When the device is hard-locked, the instant after which submissions
    /// may reach the verifier again.
    pub fn lockout_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let record = self.record(&Scope::Global, now);
        if record.is_cooling_down(now) {
            record.cooldown_until
        } else {
            None
        }
    }

    /// Record a failed submission. Returns the lockout deadline when this
    /// failure locked the device.
    pub fn record_failure(
        &self,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let window = self.policy.lockout_window;
        let global = self.store.increment(&Scope::Global, now, window);
        let locked = (global.count >= self.policy.lockout_threshold).then(|| {
            let until = now + window;
            self.store.set_cooldown(&Scope::Global, Some(until));
            tracing::info!(attempts = global.count, %until, "credential attempts locked out");
            until
        });

        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            let record = self.store.increment(&Scope::email(email), now, window);
            tracing::debug!(attempts = record.count, "failed attempt recorded for email");
        }
        locked
    }

    /// Clear global and per-email bookkeeping after a success.
    pub fn clear(&self, email: Option<&str>) {
        self.store.reset(&Scope::Global);
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            self.store.reset(&Scope::email(email));
        }
    }
}
