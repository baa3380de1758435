//! # API crate — client-side application logic for Eloura
//!
//! The behaviour behind Eloura's two busiest screens, kept free of any UI
//! framework so every frontend (and the `eloura` CLI) shares it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Sign-in / sign-up flow as a state machine, attempt limiting and lockout, error masking, MFA challenge and enrollment, the GoTrue HTTP verifier |
//! | [`daily`] | Must-do list, today's schedule and category buckets for the daily dashboard |
//! | [`settings`] | Layered configuration (`eloura.toml`, `ELOURA_*` environment) |

pub mod auth;
pub mod daily;
pub mod settings;

pub use daily::{DailyAggregator, DailyView};
pub use settings::Settings;
pub use store::{DashboardConfig, Snapshot};
