//! # Daily dashboard aggregation
//!
//! Turns the household's raw tasks, events and reminders into the three views
//! the "today" page shows. Everything here is a pure function of its inputs:
//! nothing is stored, nothing fails on missing optional fields and inputs are
//! never mutated.
//!
//! | View | Built by | Contents |
//! |---|---|---|
//! | [`MustDoList`] | [`build_must_do_list`] | urgent / high-priority tasks, then must-do reminders due today |
//! | today's schedule | [`build_today_schedule`] | today's events and reminders by time of day |
//! | [`CategoryBuckets`] | [`build_category_buckets`] | tasks and remaining reminders grouped by category |
//!
//! [`DailyAggregator`] bundles the must-do policy and category table and
//! produces a [`DailyView`] for a given day.

mod buckets;
mod must_do;
mod schedule;

pub use buckets::{
    build_category_buckets, CategoryBucket, CategoryBuckets, CategoryTable, DEFAULT_COLOR,
    REMINDERS, UNCATEGORIZED,
};
pub use must_do::{build_must_do_list, KeywordPolicy, MustDoList, MustDoPolicy};
pub use schedule::{build_today_schedule, ScheduleEntry, REMINDER_CATEGORY, TIME_FORMAT};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store::{DashboardConfig, PlanningSource, Snapshot, StoreError};

/// Everything the dashboard renders for one day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyView {
    pub date: NaiveDate,
    pub must_do: MustDoList,
    pub schedule: Vec<ScheduleEntry>,
    pub buckets: CategoryBuckets,
}

impl DailyView {
    /// Pending items across every bucket.
    pub fn pending_total(&self) -> usize {
        self.buckets.iter().map(|b| b.pending_count).sum()
    }
}

pub struct DailyAggregator {
    policy: Box<dyn MustDoPolicy>,
    table: CategoryTable,
}

impl Default for DailyAggregator {
    fn default() -> Self {
        Self::new(&DashboardConfig::default())
    }
}

impl DailyAggregator {
    /// Keyword policy and category table taken from `config`.
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            policy: Box::new(KeywordPolicy::from_config(&config.must_do)),
            table: CategoryTable::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: impl MustDoPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn build(&self, snapshot: &Snapshot, today: NaiveDate) -> DailyView {
        let must_do = build_must_do_list(
            &snapshot.tasks,
            &snapshot.reminders,
            self.policy.as_ref(),
            today,
        );
        let schedule = build_today_schedule(&snapshot.events, &snapshot.reminders, today);

        let todays_reminders: Vec<_> = snapshot
            .reminders
            .iter()
            .filter(|r| r.is_due_on(today))
            .cloned()
            .collect();
        let buckets =
            build_category_buckets(&snapshot.tasks, &todays_reminders, &must_do, &self.table);

        tracing::debug!(
            %today,
            must_do = must_do.items.len(),
            scheduled = schedule.len(),
            buckets = buckets.len(),
            "built daily view"
        );
        DailyView {
            date: today,
            must_do,
            schedule,
            buckets,
        }
    }

    /// Fetch from `source` and build.
    pub async fn load<S: PlanningSource>(
        &self,
        source: &S,
        today: NaiveDate,
    ) -> Result<DailyView, StoreError> {
        let snapshot = Snapshot::fetch(source).await?;
        Ok(self.build(&snapshot, today))
    }
}
