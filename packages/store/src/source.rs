//! # Data source — where planning records come from
//!
//! [`PlanningSource`] is the seam between the dashboard and whatever holds the
//! household's records (the hosted database in production, a [`Snapshot`] file
//! or [`crate::MemoryStore`] elsewhere). It has no pagination contract; callers
//! fetch the three collections and hand them to the aggregator.
//!
//! A [`Snapshot`] is the JSON shape used for fixtures and the CLI:
//!
//! ```json
//! { "tasks": [...], "events": [...], "reminders": [...] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{Event, PlanningItem, Reminder, Task};

/// Async source of planning records.
pub trait PlanningSource {
    fn tasks(&self) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>>;
    fn events(&self) -> impl std::future::Future<Output = Result<Vec<Event>, StoreError>>;
    fn reminders(&self) -> impl std::future::Future<Output = Result<Vec<Reminder>, StoreError>>;
}

/// All three collections at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl Snapshot {
    /// Fetch every collection from `source`.
    pub async fn fetch<S: PlanningSource>(source: &S) -> Result<Self, StoreError> {
        Ok(Self {
            tasks: source.tasks().await?,
            events: source.events().await?,
            reminders: source.reminders().await?,
        })
    }

    pub fn from_json(s: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Build a snapshot from a flat list of tagged items.
    pub fn from_items(items: impl IntoIterator<Item = PlanningItem>) -> Self {
        let mut snapshot = Self::default();
        for item in items {
            match item {
                PlanningItem::Task(t) => snapshot.tasks.push(t),
                PlanningItem::Event(e) => snapshot.events.push(e),
                PlanningItem::Reminder(r) => snapshot.reminders.push(r),
            }
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.events.is_empty() && self.reminders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_json_tolerates_missing_sections() {
        let snapshot = Snapshot::from_json(r#"{"tasks":[{"id":"1","title":"Pay bill","is_urgent":true}]}"#)
            .unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert!(snapshot.events.is_empty());
        assert!(snapshot.reminders.is_empty());
    }

    #[test]
    fn test_snapshot_from_items_keeps_order() {
        let items: Vec<PlanningItem> = serde_json::from_str(
            r#"[
                {"kind":"task","id":"t1","title":"A"},
                {"kind":"event","id":"e1","title":"B","start_time":"2026-10-15T10:00:00"},
                {"kind":"task","id":"t2","title":"C"}
            ]"#,
        )
        .unwrap();
        let snapshot = Snapshot::from_items(items);
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.tasks[1].id, "t2");
        assert_eq!(snapshot.events.len(), 1);
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        assert!(matches!(
            Snapshot::from_json("{not json"),
            Err(StoreError::Json(_))
        ));
    }
}
