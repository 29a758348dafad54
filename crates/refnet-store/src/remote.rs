//! Networked record store over the key-value REST surface.
//!
//! The store exposes each key as `{base_url}/{key}.json`, answers `null`
//! for missing keys, and accepts an optional `auth` query parameter.
//! Point increments use the server-value increment sentinel so the
//! read-modify-write happens on the store, not here.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{RecordStore, RecordStoreAdmin};
use crate::types::{EdgeSnapshot, Status, UserRecord};

/// Record store client talking to the remote key-value backend.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RemoteStore {
    /// Build a client from configuration. The per-request timeout lives on
    /// the HTTP client; expiry surfaces as [`StoreError::Transport`].
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::limited(5))
            .build()?;
        let mut base_url = Url::parse(&config.base_url).map_err(|e| StoreError::Url {
            url: config.base_url.clone(),
            source: e,
        })?;
        // Relative-resolution drops the last path segment of a base
        // without a trailing slash, so "/db" would silently remap every
        // key to the root. Normalize once here.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn key_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(&format!("{key}.json"))
            .map_err(|e| StoreError::Url {
                url: key.to_string(),
                source: e,
            })?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    /// GET a key; the backend answers `null` for missing keys, which maps
    /// to `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let url = self.key_url(key)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(key, %status, "store read rejected");
            return Err(StoreError::status(status, key));
        }
        let body = response.text().await?;
        serde_json::from_str::<Option<T>>(&body).map_err(|e| StoreError::decode(key, e))
    }

    /// PUT a value at a key, overwriting whatever is there.
    async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let url = self.key_url(key)?;
        let response = self.client.put(url).json(value).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(key, %status, "store write rejected");
            return Err(StoreError::status(status, key));
        }
        Ok(())
    }

    /// POST a value under a collection key; the backend assigns and
    /// returns the child identifier.
    async fn post_json<T: Serialize>(&self, key: &str, value: &T) -> Result<String, StoreError> {
        #[derive(serde::Deserialize)]
        struct Pushed {
            name: String,
        }

        let url = self.key_url(key)?;
        let response = self.client.post(url).json(value).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(key, %status, "store create rejected");
            return Err(StoreError::status(status, key));
        }
        let body = response.text().await?;
        let pushed: Pushed =
            serde_json::from_str(&body).map_err(|e| StoreError::decode(key, e))?;
        Ok(pushed.name)
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    #[instrument(skip(self))]
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.get_json(&format!("users/{id}")).await
    }

    #[instrument(skip(self))]
    async fn edges_from(&self, id: &str) -> Result<BTreeMap<String, EdgeSnapshot>, StoreError> {
        let edges: Option<BTreeMap<String, EdgeSnapshot>> =
            self.get_json(&format!("userReferrals/{id}")).await?;
        Ok(edges.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn increment_points(&self, id: &str, delta: i64) -> Result<u64, StoreError> {
        let key = format!("users/{id}/points");
        self.put_json(&key, &json!({ ".sv": { "increment": delta } }))
            .await?;
        // The sentinel resolves on the store; read back the committed total.
        let total: Option<u64> = self.get_json(&key).await?;
        let total = total.unwrap_or(0);
        debug!(id, delta, total, "points incremented");
        Ok(total)
    }
}

#[async_trait]
impl RecordStoreAdmin for RemoteStore {
    #[instrument(skip(self, record))]
    async fn create_user(&self, record: &UserRecord) -> Result<String, StoreError> {
        self.post_json("users", record).await
    }

    #[instrument(skip(self))]
    async fn put_referral_code(&self, code: &str, user_id: &str) -> Result<(), StoreError> {
        self.put_json(&format!("referralCodes/{code}"), user_id).await
    }

    #[instrument(skip(self))]
    async fn user_id_for_code(&self, code: &str) -> Result<Option<String>, StoreError> {
        self.get_json(&format!("referralCodes/{code}")).await
    }

    #[instrument(skip(self, snapshot))]
    async fn put_edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        snapshot: &EdgeSnapshot,
    ) -> Result<(), StoreError> {
        self.put_json(&format!("userReferrals/{referrer_id}/{referred_id}"), snapshot)
            .await
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        self.put_json(&format!("users/{id}/status"), status.as_str())
            .await
    }

    #[instrument(skip(self))]
    async fn set_referrals_count(&self, id: &str, count: u64) -> Result<(), StoreError> {
        self.put_json(&format!("users/{id}/referralsCount"), &count)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_base(base: &str) -> RemoteStore {
        let config = StoreConfig {
            base_url: base.to_string(),
            ..Default::default()
        };
        RemoteStore::new(&config).unwrap()
    }

    #[test]
    fn test_key_url_keeps_base_path_without_trailing_slash() {
        let store = store_with_base("https://refnet.example.com/db");
        let url = store.key_url("users/u1").unwrap();
        assert_eq!(url.as_str(), "https://refnet.example.com/db/users/u1.json");
    }

    #[test]
    fn test_key_url_with_trailing_slash() {
        let store = store_with_base("https://refnet.example.com/db/");
        let url = store.key_url("userReferrals/u1/u2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://refnet.example.com/db/userReferrals/u1/u2.json"
        );
    }

    #[test]
    fn test_key_url_appends_auth_token() {
        let config = StoreConfig {
            base_url: "https://refnet.example.com/db".to_string(),
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let store = RemoteStore::new(&config).unwrap();
        let url = store.key_url("users/u1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://refnet.example.com/db/users/u1.json?auth=secret"
        );
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        let config = StoreConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RemoteStore::new(&config),
            Err(StoreError::Url { .. })
        ));
    }
}
