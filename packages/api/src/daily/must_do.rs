//! Must-do list: urgent or high-priority tasks, then today's reminders the
//! [`MustDoPolicy`] picks out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store::{MustDoConfig, PlanningItem, Reminder, Task};

/// Decides which of today's reminders belong on the must-do list.
pub trait MustDoPolicy: Send + Sync {
    fn is_must_do(&self, reminder: &Reminder) -> bool;
}

impl<F> MustDoPolicy for F
where
    F: Fn(&Reminder) -> bool + Send + Sync,
{
    fn is_must_do(&self, reminder: &Reminder) -> bool {
        self(reminder)
    }
}

/// Flags a reminder when its title, description or category mentions one of
/// the configured keywords (case-insensitive).
#[derive(Clone, Debug, PartialEq)]
pub struct KeywordPolicy {
    keywords: Vec<String>,
}

impl KeywordPolicy {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| Into::<String>::into(k).trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &MustDoConfig) -> Self {
        Self::new(config.keywords.iter().cloned())
    }
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self::from_config(&MustDoConfig::default())
    }
}

impl MustDoPolicy for KeywordPolicy {
    fn is_must_do(&self, reminder: &Reminder) -> bool {
        let text = [
            Some(reminder.title.as_str()),
            reminder.description.as_deref(),
            reminder.category.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MustDoList {
    /// Tasks first, then reminders, each in input order.
    pub items: Vec<PlanningItem>,
    pub pending_count: usize,
}

impl MustDoList {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    pub fn contains_reminder(&self, id: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, PlanningItem::Reminder(r) if r.id == id))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn build_must_do_list(
    tasks: &[Task],
    reminders: &[Reminder],
    policy: &dyn MustDoPolicy,
    today: NaiveDate,
) -> MustDoList {
    let items: Vec<PlanningItem> = tasks
        .iter()
        .filter(|t| t.is_must_do())
        .cloned()
        .map(PlanningItem::Task)
        .chain(
            reminders
                .iter()
                .filter(|r| r.is_due_on(today) && policy.is_must_do(r))
                .cloned()
                .map(PlanningItem::Reminder),
        )
        .collect();
    let pending_count = items.iter().filter(|item| item.is_pending()).count();
    MustDoList {
        items,
        pending_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::Priority;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn reminder(id: &str, title: &str, day: NaiveDate) -> Reminder {
        Reminder::new(id, title, day.and_hms_opt(9, 0, 0).unwrap())
    }

    #[test]
    fn test_single_urgent_task() {
        let tasks = vec![Task::new("1", "Pay bill").urgent().with_completed(false)];
        let list = build_must_do_list(&tasks, &[], &KeywordPolicy::default(), today());
        assert_eq!(list.items, vec![PlanningItem::Task(tasks[0].clone())]);
        assert_eq!(list.pending_count, 1);
    }

    #[test]
    fn test_order_and_pending_count() {
        let tasks = vec![
            Task::new("t1", "Laundry"),
            Task::new("t2", "School form").with_priority(Priority::High),
            Task::new("t3", "Vet").urgent().with_completed(true),
            Task::new("t4", "Groceries").with_priority(Priority::Medium),
        ];
        let mut done = reminder("r2", "Pick up prescription", today());
        done.completed = true;
        let reminders = vec![
            reminder("r1", "Doctor appointment", today()),
            reminder("r0", "Take medication", today().pred_opt().unwrap()),
            done,
            reminder("r3", "Water plants", today()),
        ];

        let list = build_must_do_list(&tasks, &reminders, &KeywordPolicy::default(), today());
        let ids: Vec<&str> = list.items.iter().map(PlanningItem::id).collect();
        assert_eq!(ids, ["t2", "t3", "r1", "r2"]);
        assert_eq!(list.pending_count, 2);
        assert_eq!(
            list.pending_count,
            list.items.iter().filter(|i| i.is_pending()).count()
        );
    }

    #[test]
    fn test_rebuilding_is_idempotent() {
        let tasks = vec![Task::new("1", "a").urgent(), Task::new("2", "b")];
        let reminders = vec![reminder("r", "bill due", today())];
        let policy = KeywordPolicy::default();
        let first = build_must_do_list(&tasks, &reminders, &policy, today());
        let second = build_must_do_list(&tasks, &reminders, &policy, today());
        assert_eq!(first, second);
    }

    #[test]
    fn test_closure_policy() {
        let reminders = vec![
            reminder("r1", "anything", today()),
            reminder("r2", "else", today()),
        ];
        let only_r2 = |r: &Reminder| r.id == "r2";
        let list = build_must_do_list(&[], &reminders, &only_r2, today());
        assert!(list.contains("r2"));
        assert!(!list.contains("r1"));
    }

    #[test]
    fn test_keyword_policy_reads_description_and_category() {
        let policy = KeywordPolicy::new(["Pickup"]);
        let plain = reminder("r", "Soccer", today());
        assert!(!policy.is_must_do(&plain));
        assert!(policy.is_must_do(&plain.clone().with_description("pickup at 4")));

        let mut categorised = plain;
        categorised.category = Some("PICKUP".into());
        assert!(policy.is_must_do(&categorised));
    }
}
