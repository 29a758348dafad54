//! Record store capability traits.
//!
//! The traversal core depends only on [`RecordStore`]: record reads, edge
//! reads, and the atomic point counter. Everything mutation-side lives on
//! [`RecordStoreAdmin`] so a read-only consumer cannot reach writes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{EdgeSnapshot, Status, UserRecord};

/// Read-side capability of the remote record store.
///
/// Implementations are shared behind `Arc<dyn RecordStore>`; every method
/// is a single round-trip against the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the user record for `id`. `Ok(None)` means the key holds no
    /// record (deleted or never created), which traversal treats as a
    /// skippable branch, not a failure.
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fetch the outgoing referral edges of `id`, keyed by referred user
    /// id. Empty map when the user has no referrals.
    async fn edges_from(&self, id: &str) -> Result<BTreeMap<String, EdgeSnapshot>, StoreError>;

    /// Atomically add `delta` to the user's point balance and return the
    /// new total. The store guarantees this is race-free under concurrent
    /// increments; a read-then-write would lose updates when two
    /// registrations credit the same referrer at once. Balances never go
    /// below zero.
    async fn increment_points(&self, id: &str, delta: i64) -> Result<u64, StoreError>;
}

/// Mutation-side capability, used by account operations.
#[async_trait]
pub trait RecordStoreAdmin: RecordStore {
    /// Create a user record and return the store-assigned identifier.
    async fn create_user(&self, record: &UserRecord) -> Result<String, StoreError>;

    /// Register a referral code under `referralCodes/{code}`.
    async fn put_referral_code(&self, code: &str, user_id: &str) -> Result<(), StoreError>;

    /// Resolve a referral code to its owning user id.
    async fn user_id_for_code(&self, code: &str) -> Result<Option<String>, StoreError>;

    /// Write a referral edge with its denormalized snapshot.
    async fn put_edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        snapshot: &EdgeSnapshot,
    ) -> Result<(), StoreError>;

    /// Overwrite a user's status field.
    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError>;

    /// Overwrite the denormalized referral counter.
    async fn set_referrals_count(&self, id: &str, count: u64) -> Result<(), StoreError>;
}
