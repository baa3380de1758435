//! # Domain models for the household planner
//!
//! Defines the records the dashboard works with. Each record type is owned by a
//! single user/household and none of them reference each other; they are only
//! combined at the view layer (see the `daily` module of the `api` crate).
//!
//! ## Types
//!
//! | Type | Represents |
//! |------|-----------|
//! | [`Task`] | Something to do. Carries an optional `completed` flag (absent means pending), an `is_urgent` flag, an optional [`Priority`], an optional category and due date. |
//! | [`Event`] | Something that happens at a time. Start/end, category, location. No completion concept. |
//! | [`Reminder`] | A single timestamp with a `completed` flag. Its `description` is used as a secondary category signal. |
//! | [`PlanningItem`] | Tagged union over the three, serialized with an explicit `"kind"` discriminant. |
//!
//! Missing optional fields always deserialize to their documented defaults, so a
//! sparse row from the hosted store never fails to load.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Task priority. Unknown strings from the backend map to [`Priority::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    #[serde(other)]
    Other,
}

/// A household task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// `None` when the row has no completion column; treated as pending.
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed: None,
            is_urgent: false,
            priority: None,
            category: None,
            due_date: None,
            description: None,
        }
    }

    pub fn urgent(mut self) -> Self {
        self.is_urgent = true;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Whether the task still needs doing.
    pub fn is_pending(&self) -> bool {
        !self.completed.unwrap_or(false)
    }

    /// Whether the task belongs on the must-do list.
    pub fn is_must_do(&self) -> bool {
        self.is_urgent || self.priority == Some(Priority::High)
    }
}

/// A calendar event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, title: impl Into<String>, start_time: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_time,
            end_time: None,
            category: None,
            location: None,
            description: None,
        }
    }

    pub fn occurs_on(&self, day: NaiveDate) -> bool {
        self.start_time.date() == day
    }
}

/// A timed reminder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub reminder_time: NaiveDateTime,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Reminder {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        reminder_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            reminder_time,
            completed: false,
            description: None,
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.reminder_time.date() == day
    }

    /// Whether the reminder has a non-blank description.
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Any record the planner knows about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlanningItem {
    Task(Task),
    Event(Event),
    Reminder(Reminder),
}

impl PlanningItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Task(t) => &t.id,
            Self::Event(e) => &e.id,
            Self::Reminder(r) => &r.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Task(t) => &t.title,
            Self::Event(e) => &e.title,
            Self::Reminder(r) => &r.title,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Event(_) => "event",
            Self::Reminder(_) => "reminder",
        }
    }

    /// Still to be done. Events have no completion and never count.
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Task(t) => t.is_pending(),
            Self::Event(_) => false,
            Self::Reminder(r) => !r.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_task_uses_defaults() {
        let task: Task = serde_json::from_str(r#"{"id":"1","title":"Pay bill"}"#).unwrap();
        assert_eq!(task.completed, None);
        assert!(!task.is_urgent);
        assert!(task.priority.is_none());
        assert!(task.is_pending());
        assert!(!task.is_must_do());
    }

    #[test]
    fn test_unknown_priority_is_tolerated() {
        let task: Task =
            serde_json::from_str(r#"{"id":"1","title":"x","priority":"critical"}"#).unwrap();
        assert_eq!(task.priority, Some(Priority::Other));
        assert!(!task.is_must_do());

        let task: Task =
            serde_json::from_str(r#"{"id":"2","title":"y","priority":"high"}"#).unwrap();
        assert!(task.is_must_do());
    }

    #[test]
    fn test_planning_item_kind_tag() {
        let json = r#"{"kind":"reminder","id":"r1","title":"Meds","reminder_time":"2026-10-15T09:15:00"}"#;
        let item: PlanningItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), "reminder");
        assert_eq!(item.id(), "r1");

        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["kind"], "reminder");
    }

    #[test]
    fn test_blank_description_does_not_count() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(!Reminder::new("r", "x", at).with_description("  ").has_description());
        assert!(Reminder::new("r", "x", at).with_description("call").has_description());
    }
}
