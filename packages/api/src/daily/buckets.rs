//! # Category buckets
//!
//! Groups tasks and reminders into display buckets. Tasks go by their
//! `category` (blank or missing means `uncategorized`). Reminders already on
//! the must-do list are left out; the rest go to `reminders` when they carry
//! a description and to `uncategorized` otherwise.
//!
//! Each bucket's title and border color come from [`CategoryTable`]:
//!
//! | Key | Title | Color |
//! |---|---|---|
//! | `family` | Family | `border-l-rose-400` |
//! | `health` | Health & Wellness | `border-l-emerald-400` |
//! | `work` | Work | `border-l-blue-400` |
//! | `household` | Household | `border-l-amber-400` |
//! | `school` | School | `border-l-violet-400` |
//! | `errands` | Errands | `border-l-orange-400` |
//! | `finance` | Bills & Finance | `border-l-teal-400` |
//! | `personal` | Personal | `border-l-pink-400` |
//! | `reminders` | Reminders | `border-l-sky-400` |
//! | `uncategorized` | Other Tasks | [`DEFAULT_COLOR`] |
//!
//! Unknown keys get the key in title case and [`DEFAULT_COLOR`].
//! `dashboard.toml` may override either column per key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use store::{DashboardConfig, PlanningItem, Reminder, Task};

use super::must_do::MustDoList;

pub const UNCATEGORIZED: &str = "uncategorized";
pub const REMINDERS: &str = "reminders";
pub const DEFAULT_COLOR: &str = "border-l-gray-300";

const TITLES: [(&str, &str); 10] = [
    ("family", "Family"),
    ("health", "Health & Wellness"),
    ("work", "Work"),
    ("household", "Household"),
    ("school", "School"),
    ("errands", "Errands"),
    ("finance", "Bills & Finance"),
    ("personal", "Personal"),
    (REMINDERS, "Reminders"),
    (UNCATEGORIZED, "Other Tasks"),
];

const BORDER_COLORS: [(&str, &str); 9] = [
    ("family", "border-l-rose-400"),
    ("health", "border-l-emerald-400"),
    ("work", "border-l-blue-400"),
    ("household", "border-l-amber-400"),
    ("school", "border-l-violet-400"),
    ("errands", "border-l-orange-400"),
    ("finance", "border-l-teal-400"),
    ("personal", "border-l-pink-400"),
    (REMINDERS, "border-l-sky-400"),
];

/// Title and color lookup with fallbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryTable {
    titles: BTreeMap<String, String>,
    colors: BTreeMap<String, String>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        fn owned(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }
        Self {
            titles: owned(&TITLES),
            colors: owned(&BORDER_COLORS),
        }
    }
}

impl CategoryTable {
    /// Built-in table with `config` overrides applied.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let mut table = Self::default();
        for (key, style) in &config.categories {
            let key = normalize_key(key);
            if let Some(title) = &style.title {
                table.titles.insert(key.clone(), title.clone());
            }
            if let Some(color) = &style.color {
                table.colors.insert(key, color.clone());
            }
        }
        table
    }

    pub fn title(&self, key: &str) -> String {
        self.titles
            .get(key)
            .cloned()
            .unwrap_or_else(|| title_case(key))
    }

    pub fn color(&self, key: &str) -> &str {
        self.colors.get(key).map_or(DEFAULT_COLOR, String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub key: String,
    pub title: String,
    pub color: String,
    pub items: Vec<PlanningItem>,
    /// Items in this bucket still to be done.
    pub pending_count: usize,
}

/// Buckets in order of first appearance (tasks before reminders).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBuckets(pub Vec<CategoryBucket>);

impl CategoryBuckets {
    pub fn get(&self, key: &str) -> Option<&CategoryBucket> {
        self.0.iter().find(|b| b.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryBucket> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, key: String, item: PlanningItem, table: &CategoryTable) {
        let index = match self.0.iter().position(|b| b.key == key) {
            Some(index) => index,
            None => {
                self.0.push(CategoryBucket {
                    title: table.title(&key),
                    color: table.color(&key).to_string(),
                    key,
                    items: Vec::new(),
                    pending_count: 0,
                });
                self.0.len() - 1
            }
        };
        let bucket = &mut self.0[index];
        if item.is_pending() {
            bucket.pending_count += 1;
        }
        bucket.items.push(item);
    }
}

pub fn build_category_buckets(
    tasks: &[Task],
    reminders: &[Reminder],
    must_do: &MustDoList,
    table: &CategoryTable,
) -> CategoryBuckets {
    let mut buckets = CategoryBuckets::default();
    for task in tasks {
        let key = task
            .category
            .as_deref()
            .map(normalize_key)
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        buckets.push(key, PlanningItem::Task(task.clone()), table);
    }
    for reminder in reminders.iter().filter(|r| !must_do.contains_reminder(&r.id)) {
        let key = if reminder.has_description() {
            REMINDERS
        } else {
            UNCATEGORIZED
        };
        buckets.push(
            key.to_string(),
            PlanningItem::Reminder(reminder.clone()),
            table,
        );
    }
    buckets
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn title_case(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
