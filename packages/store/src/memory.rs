use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::attempts::{AttemptRecord, AttemptStore, Scope};
use crate::error::StoreError;
use crate::models::{Event, Reminder, Task};
use crate::source::{PlanningSource, Snapshot};

/// In-memory store for testing and native builds.
///
/// Holds attempt bookkeeping and a planning snapshot. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    attempts: Arc<Mutex<HashMap<String, AttemptRecord>>>,
    records: Arc<Mutex<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with planning records.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            attempts: Arc::default(),
            records: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Replace the planning records.
    pub fn replace_records(&self, snapshot: Snapshot) {
        *lock(&self.records) = snapshot;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AttemptStore for MemoryStore {
    fn get(&self, scope: &Scope) -> AttemptRecord {
        lock(&self.attempts)
            .get(&scope.key())
            .cloned()
            .unwrap_or_default()
    }

    fn expire(&self, scope: &Scope, now: DateTime<Utc>, window: Duration) -> AttemptRecord {
        let mut attempts = lock(&self.attempts);
        let key = scope.key();
        match attempts.get(&key) {
            Some(record) if record.is_expired(now, window) => {
                attempts.remove(&key);
                AttemptRecord::default()
            }
            Some(record) => record.clone(),
            None => AttemptRecord::default(),
        }
    }

    fn increment(&self, scope: &Scope, at: DateTime<Utc>, window: Duration) -> AttemptRecord {
        let mut attempts = lock(&self.attempts);
        let record = attempts.entry(scope.key()).or_default();
        if record.is_expired(at, window) {
            *record = AttemptRecord::default();
        }
        record.count = record.count.saturating_add(1);
        record.last_attempt_at = Some(at);
        record.clone()
    }

    fn set_cooldown(&self, scope: &Scope, until: Option<DateTime<Utc>>) {
        if let Some(record) = lock(&self.attempts).get_mut(&scope.key()) {
            record.cooldown_until = until;
        }
    }

    fn reset(&self, scope: &Scope) {
        lock(&self.attempts).remove(&scope.key());
    }
}

impl PlanningSource for MemoryStore {
    async fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(lock(&self.records).tasks.clone())
    }

    async fn events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(lock(&self.records).events.clone())
    }

    async fn reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(lock(&self.records).reminders.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Duration {
        Duration::minutes(15)
    }

    #[test]
    fn test_increment_and_reset() {
        let store = MemoryStore::new();
        let scope = Scope::email("a@b.com");
        let now = Utc::now();

        // Initially empty
        assert_eq!(store.get(&scope), AttemptRecord::default());

        store.increment(&scope, now, window());
        let record = store.increment(&scope, now + Duration::seconds(5), window());
        assert_eq!(record.count, 2);
        assert_eq!(record.last_attempt_at, Some(now + Duration::seconds(5)));

        // Other scopes are untouched
        assert_eq!(store.get(&Scope::Global).count, 0);

        store.set_cooldown(&scope, Some(now + Duration::minutes(15)));
        assert!(store.get(&scope).cooldown_until.is_some());

        store.reset(&scope);
        assert_eq!(store.get(&scope), AttemptRecord::default());
    }

    #[test]
    fn test_expired_record_restarts_on_increment() {
        let store = MemoryStore::new();
        let start = Utc::now();
        for _ in 0..4 {
            store.increment(&Scope::Global, start, window());
        }
        store.set_cooldown(&Scope::Global, Some(start + window()));

        let later = start + window() + Duration::seconds(1);
        let record = store.increment(&Scope::Global, later, window());
        assert_eq!(record.count, 1);
        assert_eq!(record.last_attempt_at, Some(later));
        assert_eq!(record.cooldown_until, None);
    }

    #[test]
    fn test_expire_only_clears_stale_records() {
        let store = MemoryStore::new();
        let start = Utc::now();
        store.increment(&Scope::Global, start, window());

        assert_eq!(store.expire(&Scope::Global, start + window(), window()).count, 1);
        let later = start + window() + Duration::seconds(1);
        assert_eq!(
            store.expire(&Scope::Global, later, window()),
            AttemptRecord::default()
        );
        assert_eq!(store.get(&Scope::Global), AttemptRecord::default());
    }

    #[test]
    fn test_set_cooldown_on_missing_record_is_noop() {
        let store = MemoryStore::new();
        store.set_cooldown(&Scope::Global, Some(Utc::now()));
        assert_eq!(store.get(&Scope::Global), AttemptRecord::default());
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.increment(&Scope::Global, Utc::now(), window());
        assert_eq!(other.get(&Scope::Global).count, 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.increment(&Scope::Global, Utc::now(), window());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&Scope::Global).count, 200);
    }

    #[tokio::test]
    async fn test_planning_source_roundtrip() {
        let snapshot = Snapshot::from_json(
            r#"{
                "tasks": [{"id":"1","title":"Pay bill","is_urgent":true,"completed":false}],
                "reminders": [{"id":"r1","title":"Meds","reminder_time":"2026-10-15T09:15:00"}]
            }"#,
        )
        .unwrap();
        let store = MemoryStore::with_snapshot(snapshot.clone());

        let fetched = Snapshot::fetch(&store).await.unwrap();
        assert_eq!(fetched, snapshot);

        store.replace_records(Snapshot::default());
        assert!(Snapshot::fetch(&store).await.unwrap().is_empty());
    }
}
