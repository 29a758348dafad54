//! Session-scoped user record cache.
//!
//! One cache lives for exactly one materialization session and is injected
//! into the call that uses it, so tests can assert fetch counts and
//! concurrent sessions never share state. There is no eviction: staleness
//! is bounded by the session lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use refnet_store::{RecordStore, StoreError, UserRecord};

type Slot = Arc<OnceCell<Option<UserRecord>>>;

/// Memoizes `get_user` results by identifier with single-flight semantics:
/// concurrent calls for the same id collapse into one store round-trip.
#[derive(Default)]
pub struct NodeCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached record for `id`, fetching it on first use.
    ///
    /// "No record" (`Ok(None)`) is a cached outcome; a store error is not,
    /// so a later call may retry the fetch.
    pub async fn get_or_fetch(
        &self,
        store: &dyn RecordStore,
        id: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let slot = {
            let mut slots = self.slots.lock().expect("cache lock");
            slots.entry(id.to_string()).or_default().clone()
        };
        slot.get_or_try_init(|| store.get_user(id))
            .await
            .map(|record| record.clone())
    }

    /// Number of identifiers with a resolved entry.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .expect("cache lock")
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use refnet_store::MemStore;

    use super::*;

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let store = MemStore::new();
        store.seed_user("a", 5);
        let cache = NodeCache::new();

        let first = cache.get_or_fetch(&store, "a").await.unwrap().unwrap();
        let second = cache.get_or_fetch(&store, "a").await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.user_fetches("a"), 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_cached() {
        let store = MemStore::new();
        let cache = NodeCache::new();

        assert!(cache.get_or_fetch(&store, "ghost").await.unwrap().is_none());
        assert!(cache.get_or_fetch(&store, "ghost").await.unwrap().is_none());
        assert_eq!(store.user_fetches("ghost"), 1);
    }

    #[tokio::test]
    async fn test_store_error_is_not_cached() {
        let store = MemStore::new();
        store.seed_user("a", 0);
        store.fail_user("a");
        let cache = NodeCache::new();

        assert!(cache.get_or_fetch(&store, "a").await.is_err());
        // The failure reached the store and was not memoized.
        assert!(cache.get_or_fetch(&store, "a").await.is_err());
        assert_eq!(store.user_fetches("a"), 2);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_single_flight() {
        let store = Arc::new(MemStore::new());
        store.seed_user("a", 7);
        store.set_fetch_delay(Duration::from_millis(20));
        let cache = Arc::new(NodeCache::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_fetch(store.as_ref(), "a").await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(store.user_fetches("a"), 1);
    }
}
