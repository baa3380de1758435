//! Background risk-level refresh.
//!
//! The sign-in page shows whether the next attempt counts as high risk. The
//! level depends on the stored counters and on the email being typed, so the
//! monitor recomputes it whenever the email changes and on a fixed interval
//! (so that an expired window brings the level back down without user input).
//! Consumers read the latest value from a `watch` channel and only get woken
//! when it actually changes.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::attempts::{AttemptTracker, RiskLevel};
use super::clock::Clock;
use super::validate::normalize_email;
use crate::settings::AuthSettings;
use store::AttemptStore;

pub struct RiskMonitor {
    email: watch::Sender<String>,
    level: watch::Receiver<RiskLevel>,
    task: JoinHandle<()>,
}

impl RiskMonitor {
    /// Spawn with the refresh interval from `settings`.
    pub fn from_settings<S, C>(
        tracker: AttemptTracker<S>,
        clock: C,
        settings: &AuthSettings,
    ) -> Self
    where
        S: AttemptStore + Send + 'static,
        C: Clock + 'static,
    {
        Self::spawn(tracker, clock, settings.risk_refresh())
    }

    /// Spawn the refresh loop on the current runtime.
    pub fn spawn<S, C>(tracker: AttemptTracker<S>, clock: C, every: Duration) -> Self
    where
        S: AttemptStore + Send + 'static,
        C: Clock + 'static,
    {
        let (email_tx, mut email_rx) = watch::channel(String::new());
        let initial = tracker.risk_level(None, clock.now());
        let (level_tx, level_rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = email_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let email = email_rx.borrow_and_update().clone();
                let level = tracker.risk_level(Some(&email), clock.now());
                level_tx.send_if_modified(|current| {
                    if *current == level {
                        return false;
                    }
                    tracing::info!(from = ?*current, to = ?level, "risk level changed");
                    *current = level;
                    true
                });
            }
        });

        Self {
            email: email_tx,
            level: level_rx,
            task,
        }
    }

    /// Report the email currently in the form.
    pub fn set_email(&self, email: &str) {
        let email = normalize_email(email);
        self.email.send_if_modified(|current| {
            if *current == email {
                return false;
            }
            *current = email;
            true
        });
    }

    pub fn level(&self) -> RiskLevel {
        *self.level.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RiskLevel> {
        self.level.clone()
    }
}

impl Drop for RiskMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
