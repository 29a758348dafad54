//! Refnet Accounts - registration and referral mutations.
//!
//! Thin I/O wrappers over the admin store surface: create an account,
//! wire up its referral edge, credit the referrer, keep the denormalized
//! referral counter fresh. None of this is traversal; the graph core
//! consumes what these operations write.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};

use refnet_store::{EdgeSnapshot, RecordStore, RecordStoreAdmin, Status, StoreError, UserRecord};

/// Points credited to a referrer per successful referral.
pub const REFERRAL_BONUS: i64 = 10;

const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Collisions are vanishingly rare over 36^8 codes; bail out rather than
/// spin if the store keeps answering "taken".
const CODE_ATTEMPTS: usize = 16;

/// A failed account mutation.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no user record for {0}")]
    UnknownUser(String),

    #[error("could not allocate a unique referral code")]
    CodeExhausted,
}

/// Input for a registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    /// Referral code the new member signed up through, if any.
    pub referred_by_code: Option<String>,
}

/// Outcome of a registration.
#[derive(Debug, Clone)]
pub struct Registered {
    /// Store-assigned identifier of the new user.
    pub user_id: String,
    pub record: UserRecord,
    /// Referrer credited for this registration, when the supplied code
    /// resolved to a user.
    pub referrer_id: Option<String>,
}

/// Account operations over the admin store surface.
pub struct AccountService {
    store: Arc<dyn RecordStoreAdmin>,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStoreAdmin>) -> Self {
        Self { store }
    }

    /// Register a new member: allocate a referral code, create the
    /// record, publish the code mapping, and process the referral when a
    /// code was supplied. An unknown referral code is not an error; the
    /// account is simply created without a referrer (matching how signup
    /// links with stale codes have always behaved).
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: NewAccount) -> Result<Registered, AccountError> {
        let referrer_id = match &account.referred_by_code {
            Some(code) => {
                let resolved = self.store.user_id_for_code(code).await?;
                if resolved.is_none() {
                    warn!(%code, "referral code does not resolve; registering without referrer");
                }
                resolved
            }
            None => None,
        };

        let code = self.allocate_code().await?;
        let record = UserRecord::new(
            account.name,
            account.email,
            code.clone(),
            referrer_id.clone(),
        );
        let user_id = self.store.create_user(&record).await?;
        self.store.put_referral_code(&code, &user_id).await?;

        if let Some(referrer_id) = &referrer_id {
            self.process_referral(referrer_id, &user_id, &record).await?;
        }

        info!(%user_id, referrer = ?referrer_id, "account registered");
        Ok(Registered {
            user_id,
            record,
            referrer_id,
        })
    }

    /// Record the referral edge, credit the referrer, and refresh their
    /// denormalized referral count.
    #[instrument(skip(self, record))]
    pub async fn process_referral(
        &self,
        referrer_id: &str,
        referred_id: &str,
        record: &UserRecord,
    ) -> Result<(), AccountError> {
        self.store
            .put_edge(referrer_id, referred_id, &EdgeSnapshot::of(record))
            .await?;
        // Atomic on the store: two simultaneous signups through the same
        // referrer must both land.
        let total = self
            .store
            .increment_points(referrer_id, REFERRAL_BONUS)
            .await?;
        self.refresh_referrals_count(referrer_id).await?;
        info!(referrer_id, referred_id, total, "referral credited");
        Ok(())
    }

    /// Flip a member between active and inactive (suspended members are
    /// reactivated). Returns the new status.
    #[instrument(skip(self))]
    pub async fn toggle_status(&self, id: &str) -> Result<Status, AccountError> {
        let record = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| AccountError::UnknownUser(id.to_string()))?;
        let next = record.status.toggled();
        self.store.set_status(id, next).await?;
        Ok(next)
    }

    /// Overwrite a member's status.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &str, status: Status) -> Result<(), AccountError> {
        if self.store.get_user(id).await?.is_none() {
            return Err(AccountError::UnknownUser(id.to_string()));
        }
        self.store.set_status(id, status).await?;
        Ok(())
    }

    /// Adjust a member's point balance; returns the new total.
    #[instrument(skip(self))]
    pub async fn grant_points(&self, id: &str, delta: i64) -> Result<u64, AccountError> {
        Ok(self.store.increment_points(id, delta).await?)
    }

    /// Recompute the denormalized referral counter from the edge set.
    /// The counter is derived display data; the edge set is the truth.
    #[instrument(skip(self))]
    pub async fn refresh_referrals_count(&self, id: &str) -> Result<u64, AccountError> {
        let count = self.store.edges_from(id).await?.len() as u64;
        self.store.set_referrals_count(id, count).await?;
        Ok(count)
    }

    async fn allocate_code(&self) -> Result<String, AccountError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&mut rand::thread_rng());
            if self.store.user_id_for_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AccountError::CodeExhausted)
    }
}

/// An 8-character uppercase alphanumeric share code.
fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use refnet_store::MemStore;
    use refnet_graph::{aggregate, NetworkLoader};

    use super::*;

    fn service() -> (Arc<MemStore>, AccountService) {
        let store = Arc::new(MemStore::new());
        (store.clone(), AccountService::new(store))
    }

    #[test]
    fn test_generate_code_shape() {
        let code = generate_code(&mut rand::thread_rng());
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn test_register_root() {
        let (store, service) = service();
        let registered = service
            .register(NewAccount {
                name: "Alia".into(),
                email: "alia@example.com".into(),
                referred_by_code: None,
            })
            .await
            .unwrap();

        assert!(registered.referrer_id.is_none());
        let record = store.user(&registered.user_id).unwrap();
        assert_eq!(record.points, 0);
        assert_eq!(record.status, Status::Active);
        assert!(record.referred_by.is_none());
        // The code mapping is live immediately.
        assert_eq!(
            store
                .user_id_for_code(&record.referral_code)
                .await
                .unwrap()
                .as_deref(),
            Some(registered.user_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_register_with_referral_credits_referrer() {
        let (store, service) = service();
        let referrer = service
            .register(NewAccount {
                name: "Alia".into(),
                email: "alia@example.com".into(),
                referred_by_code: None,
            })
            .await
            .unwrap();

        let referred = service
            .register(NewAccount {
                name: "Omar".into(),
                email: "omar@example.com".into(),
                referred_by_code: Some(referrer.record.referral_code.clone()),
            })
            .await
            .unwrap();

        assert_eq!(referred.referrer_id.as_deref(), Some(referrer.user_id.as_str()));

        let edges = store.edges_from(&referrer.user_id).await.unwrap();
        assert_eq!(edges.len(), 1);
        let snap = &edges[&referred.user_id];
        assert_eq!(snap.name, "Omar");
        assert_eq!(snap.level, 1);

        let credited = store.user(&referrer.user_id).unwrap();
        assert_eq!(credited.points, REFERRAL_BONUS as u64);
        assert_eq!(credited.referrals_count, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_referral_code_is_noop() {
        let (store, service) = service();
        let registered = service
            .register(NewAccount {
                name: "Omar".into(),
                email: "omar@example.com".into(),
                referred_by_code: Some("NOSUCH00".into()),
            })
            .await
            .unwrap();

        assert!(registered.referrer_id.is_none());
        assert!(store.user(&registered.user_id).is_some());
    }

    #[tokio::test]
    async fn test_toggle_status() {
        let (store, service) = service();
        store.seed_user("m", 0);

        assert_eq!(service.toggle_status("m").await.unwrap(), Status::Inactive);
        assert_eq!(service.toggle_status("m").await.unwrap(), Status::Active);

        store.set_status("m", Status::Suspended).await.unwrap();
        assert_eq!(service.toggle_status("m").await.unwrap(), Status::Active);

        assert!(matches!(
            service.toggle_status("nobody").await,
            Err(AccountError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_points() {
        let (store, service) = service();
        store.seed_user("m", 5);

        assert_eq!(service.grant_points("m", 7).await.unwrap(), 12);
        assert_eq!(service.grant_points("m", -3).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_refresh_referrals_count() {
        let (store, service) = service();
        store.seed_user("m", 0);
        store.seed_user("x", 0);
        store.seed_user("y", 0);
        store.link("m", "x");
        store.link("m", "y");

        assert_eq!(service.refresh_referrals_count("m").await.unwrap(), 2);
        assert_eq!(store.user("m").unwrap().referrals_count, Some(2));
    }

    #[tokio::test]
    async fn test_registered_chain_materializes() {
        let (store, service) = service();
        let a = service
            .register(NewAccount {
                name: "Alia".into(),
                email: "alia@example.com".into(),
                referred_by_code: None,
            })
            .await
            .unwrap();
        let b = service
            .register(NewAccount {
                name: "Omar".into(),
                email: "omar@example.com".into(),
                referred_by_code: Some(a.record.referral_code.clone()),
            })
            .await
            .unwrap();
        let _c = service
            .register(NewAccount {
                name: "Nadia".into(),
                email: "nadia@example.com".into(),
                referred_by_code: Some(b.record.referral_code.clone()),
            })
            .await
            .unwrap();

        let loader = NetworkLoader::new(store);
        let tree = loader.materialize(&a.user_id, 10).await.unwrap();
        let stats = aggregate(&tree.root);
        assert_eq!(stats.total_members, 3);
        assert_eq!(stats.max_level, 2);
        // a and b each earned one referral bonus.
        assert_eq!(stats.total_points, 2 * REFERRAL_BONUS as u64);
    }
}
