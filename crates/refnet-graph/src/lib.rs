//! Refnet Graph - referral network materialization and queries.
//!
//! This crate is the algorithmic core of the referral system:
//!
//! - **Cache**: session-scoped, single-flight user record cache
//! - **Traverse**: bounded materialization and unbounded collection over
//!   the remote record store
//! - **Stats**: pure aggregation over a materialized tree
//! - **Query**: the filter/sort/paginate pipeline behind management views
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use refnet_graph::{aggregate, NetworkLoader};
//!
//! let loader = NetworkLoader::new(store);
//! let tree = loader.materialize("u1001", 10).await?;
//! let stats = aggregate(&tree.root);
//! println!("{} members, {} points", stats.total_members, stats.total_points);
//! ```

pub mod cache;
pub mod error;
pub mod query;
pub mod schema;
pub mod stats;
pub mod traverse;

// Re-export commonly used types
pub use cache::NodeCache;
pub use error::NetError;
pub use query::{filter_rows, paginate, sort_rows, FilterCriteria, MemberView, Page, QueryError, SortKey};
pub use schema::{
    Collected, CyclePath, Materialized, MemberRow, NetworkNode, NetworkStats, TraversalReport,
};
pub use stats::aggregate;
pub use traverse::NetworkLoader;
