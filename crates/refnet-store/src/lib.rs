//! Refnet Store - record store client for the referral network.
//!
//! This crate owns everything that touches the remote key-value backend:
//!
//! - **Types**: the wire data model (`UserRecord`, `EdgeSnapshot`, `Status`)
//! - **Store**: the `RecordStore` / `RecordStoreAdmin` capability traits
//! - **Remote**: the networked implementation over HTTP
//! - **Memory**: a deterministic in-memory implementation for tests
//!
//! # Example
//!
//! ```ignore
//! use refnet_store::{RemoteStore, StoreConfig, RecordStore};
//!
//! let config = StoreConfig::from_env();
//! let store = RemoteStore::new(&config)?;
//! let record = store.get_user("u1001").await?;
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod remote;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::StoreError;
pub use memory::MemStore;
pub use remote::RemoteStore;
pub use store::{RecordStore, RecordStoreAdmin};
pub use types::{EdgeSnapshot, Status, UserRecord};
