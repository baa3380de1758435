//! # Application settings
//!
//! Layered the usual way: compiled defaults, then an optional `eloura.toml`,
//! then `ELOURA_*` environment variables (`__` separates sections, so
//! `ELOURA_AUTH__LOCKOUT_ATTEMPTS=12` overrides `auth.lockout_attempts`).
//! A `.env` file is loaded first when present.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::auth::AttemptPolicy;

pub const DEFAULT_SETTINGS_FILE: &str = "eloura.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Backend {
    /// Base URL of the hosted project, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent with every auth request.
    pub anon_key: String,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".into(),
            anon_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthSettings {
    pub global_high_risk_attempts: u32,
    pub email_high_risk_attempts: u32,
    pub lockout_attempts: u32,
    pub lockout_minutes: i64,
    pub risk_refresh_secs: u64,
    pub min_password_length: usize,
    pub mfa_code_length: usize,
    pub recovery_code_count: usize,
    pub password_reset_redirect: String,
    /// No timeout when unset.
    #[serde(default)]
    pub verifier_timeout_secs: Option<u64>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            global_high_risk_attempts: 8,
            email_high_risk_attempts: 5,
            lockout_attempts: 10,
            lockout_minutes: 15,
            risk_refresh_secs: 60,
            min_password_length: 8,
            mfa_code_length: 6,
            recovery_code_count: 10,
            password_reset_redirect: "http://localhost:8080/reset-password".into(),
            verifier_timeout_secs: None,
        }
    }
}

impl AuthSettings {
    pub fn attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            global_high_risk: self.global_high_risk_attempts,
            email_high_risk: self.email_high_risk_attempts,
            lockout_threshold: self.lockout_attempts,
            lockout_window: chrono::Duration::minutes(self.lockout_minutes),
        }
    }

    pub fn risk_refresh(&self) -> Duration {
        Duration::from_secs(self.risk_refresh_secs.max(1))
    }

    pub fn verifier_timeout(&self) -> Option<Duration> {
        self.verifier_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Dashboard {
    /// Path of the `dashboard.toml` overrides file.
    pub config_path: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            config_path: store::DashboardConfig::filename().into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub auth: AuthSettings,
    pub dashboard: Dashboard,
}

impl Settings {
    /// Load from `eloura.toml` in the working directory plus the environment.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_SETTINGS_FILE)
    }

    /// Load using `path` as the optional TOML layer.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = AuthSettings::default();
        let config = Config::builder()
            .set_default("backend.url", Backend::default().url)?
            .set_default("backend.anon_key", "")?
            .set_default("auth.global_high_risk_attempts", defaults.global_high_risk_attempts)?
            .set_default("auth.email_high_risk_attempts", defaults.email_high_risk_attempts)?
            .set_default("auth.lockout_attempts", defaults.lockout_attempts)?
            .set_default("auth.lockout_minutes", defaults.lockout_minutes)?
            .set_default("auth.risk_refresh_secs", defaults.risk_refresh_secs)?
            .set_default("auth.min_password_length", defaults.min_password_length as u64)?
            .set_default("auth.mfa_code_length", defaults.mfa_code_length as u64)?
            .set_default("auth.recovery_code_count", defaults.recovery_code_count as u64)?
            .set_default("auth.password_reset_redirect", defaults.password_reset_redirect)?
            .set_default("dashboard.config_path", Dashboard::default().config_path)?
            .add_source(File::with_name(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("ELOURA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}
