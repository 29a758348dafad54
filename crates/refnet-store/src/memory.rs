//! In-memory record store for tests.
//!
//! Implements the full admin surface plus two test-only affordances:
//! per-user fetch counters (for cache dedup assertions) and per-key
//! failure injection (for partial-result traversal tests). An optional
//! artificial fetch delay widens race windows in single-flight tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::{RecordStore, RecordStoreAdmin};
use crate::types::{EdgeSnapshot, Status, UserRecord};

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    edges: HashMap<String, BTreeMap<String, EdgeSnapshot>>,
    codes: HashMap<String, String>,
    user_fetches: HashMap<String, u64>,
    failing_users: HashSet<String>,
    failing_edges: HashSet<String>,
    next_id: u64,
}

/// Mutex-backed [`RecordStoreAdmin`] with deterministic behavior.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under a fixed identifier.
    pub fn insert_user(&self, id: &str, record: UserRecord) {
        self.inner
            .lock()
            .expect("memstore lock")
            .users
            .insert(id.to_string(), record);
    }

    /// Seed a user with the given point balance; other fields are filled
    /// with predictable values derived from the id.
    pub fn seed_user(&self, id: &str, points: u64) {
        let mut record = UserRecord::new(
            id.to_uppercase(),
            format!("{id}@example.com"),
            format!("CODE{}", id.to_uppercase()),
            None,
        );
        record.points = points;
        self.insert_user(id, record);
    }

    /// Write a referral edge snapshotting the child's current record.
    /// The edge is created even when the child has no record, which is how
    /// dangling "ghost" edges enter the store.
    pub fn link(&self, referrer_id: &str, referred_id: &str) {
        let mut inner = self.inner.lock().expect("memstore lock");
        let snapshot = inner
            .users
            .get(referred_id)
            .map(EdgeSnapshot::of)
            .unwrap_or_else(|| EdgeSnapshot {
                name: referred_id.to_string(),
                email: format!("{referred_id}@example.com"),
                join_date: chrono::Utc::now(),
                level: 1,
                status: Status::Active,
            });
        inner
            .edges
            .entry(referrer_id.to_string())
            .or_default()
            .insert(referred_id.to_string(), snapshot);
    }

    /// Make every `get_user(id)` fail until cleared.
    pub fn fail_user(&self, id: &str) {
        self.inner
            .lock()
            .expect("memstore lock")
            .failing_users
            .insert(id.to_string());
    }

    /// Make every `edges_from(id)` fail until cleared.
    pub fn fail_edges(&self, id: &str) {
        self.inner
            .lock()
            .expect("memstore lock")
            .failing_edges
            .insert(id.to_string());
    }

    /// Sleep this long inside every `get_user` before touching state.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().expect("memstore lock") = Some(delay);
    }

    /// Current copy of a user record, bypassing counters.
    pub fn user(&self, id: &str) -> Option<UserRecord> {
        self.inner.lock().expect("memstore lock").users.get(id).cloned()
    }

    /// How many `get_user` calls reached the store for this id.
    pub fn user_fetches(&self, id: &str) -> u64 {
        self.inner
            .lock()
            .expect("memstore lock")
            .user_fetches
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Total `get_user` calls across all ids.
    pub fn total_user_fetches(&self) -> u64 {
        self.inner
            .lock()
            .expect("memstore lock")
            .user_fetches
            .values()
            .sum()
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let delay = *self.fetch_delay.lock().expect("memstore lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().expect("memstore lock");
        *inner.user_fetches.entry(id.to_string()).or_insert(0) += 1;
        if inner.failing_users.contains(id) {
            return Err(StoreError::unavailable(format!("users/{id}")));
        }
        Ok(inner.users.get(id).cloned())
    }

    async fn edges_from(&self, id: &str) -> Result<BTreeMap<String, EdgeSnapshot>, StoreError> {
        let inner = self.inner.lock().expect("memstore lock");
        if inner.failing_edges.contains(id) {
            return Err(StoreError::unavailable(format!("userReferrals/{id}")));
        }
        Ok(inner.edges.get(id).cloned().unwrap_or_default())
    }

    async fn increment_points(&self, id: &str, delta: i64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("memstore lock");
        let record = inner
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::unavailable(format!("users/{id}/points")))?;
        let total = if delta.is_negative() {
            record.points.saturating_sub(delta.unsigned_abs())
        } else {
            record.points.saturating_add(delta as u64)
        };
        record.points = total;
        Ok(total)
    }
}

#[async_trait]
impl RecordStoreAdmin for MemStore {
    async fn create_user(&self, record: &UserRecord) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().expect("memstore lock");
        inner.next_id += 1;
        let id = format!("u{:04}", inner.next_id);
        inner.users.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn put_referral_code(&self, code: &str, user_id: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("memstore lock")
            .codes
            .insert(code.to_string(), user_id.to_string());
        Ok(())
    }

    async fn user_id_for_code(&self, code: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("memstore lock")
            .codes
            .get(code)
            .cloned())
    }

    async fn put_edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        snapshot: &EdgeSnapshot,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("memstore lock")
            .edges
            .entry(referrer_id.to_string())
            .or_default()
            .insert(referred_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memstore lock");
        let record = inner
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::unavailable(format!("users/{id}/status")))?;
        record.status = status;
        Ok(())
    }

    async fn set_referrals_count(&self, id: &str, count: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memstore lock");
        let record = inner
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::unavailable(format!("users/{id}/referralsCount")))?;
        record.referrals_count = Some(count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_counting() {
        let store = MemStore::new();
        store.seed_user("a", 5);

        assert!(store.get_user("a").await.unwrap().is_some());
        assert!(store.get_user("a").await.unwrap().is_some());
        assert!(store.get_user("missing").await.unwrap().is_none());

        assert_eq!(store.user_fetches("a"), 2);
        assert_eq!(store.user_fetches("missing"), 1);
        assert_eq!(store.total_user_fetches(), 3);
    }

    #[tokio::test]
    async fn test_increment_is_bounded_at_zero() {
        let store = MemStore::new();
        store.seed_user("a", 3);

        assert_eq!(store.increment_points("a", 10).await.unwrap(), 13);
        assert_eq!(store.increment_points("a", -20).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemStore::new();
        store.seed_user("a", 0);
        store.fail_user("a");

        assert!(matches!(
            store.get_user("a").await,
            Err(StoreError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_link_snapshots_child() {
        let store = MemStore::new();
        store.seed_user("root", 0);
        store.seed_user("kid", 2);
        store.link("root", "kid");

        let edges = store.edges_from("root").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges["kid"].name, "KID");
        assert_eq!(edges["kid"].level, 1);
    }
}
