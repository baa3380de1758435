//! # Store crate — planner records and client-local bookkeeping
//!
//! Shared data layer for the Eloura frontends. It owns the record types the
//! dashboard derives its views from, the seam to wherever those records live,
//! and the failed-attempt bookkeeping the auth flow keeps on the device.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Task`, `Event`, `Reminder` and the tagged `PlanningItem` union |
//! | [`attempts`] | Attempt scopes, records and the `AttemptStore` trait |
//! | [`source`] | `PlanningSource` trait and JSON `Snapshot` |
//! | [`config`] | `dashboard.toml` category and must-do overrides |

pub mod attempts;
pub mod config;
pub mod error;
pub mod models;
pub mod source;

mod memory;
pub use memory::MemoryStore;

pub use attempts::{AttemptRecord, AttemptStore, Scope};
pub use config::{CategoryStyle, DashboardConfig, MustDoConfig};
pub use error::StoreError;
pub use models::{Event, PlanningItem, Priority, Reminder, Task};
pub use source::{PlanningSource, Snapshot};
