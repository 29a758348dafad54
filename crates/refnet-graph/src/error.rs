//! Traversal error taxonomy.

use refnet_store::StoreError;
use thiserror::Error;

/// A failed network materialization or collection.
///
/// Per-branch conditions (missing child records, non-root store failures,
/// cycles) do not surface here; they are folded into the
/// [`TraversalReport`](crate::schema::TraversalReport) so a partially
/// reachable network still yields a result. These variants are the cases
/// where there is nothing useful to return.
#[derive(Debug, Error)]
pub enum NetError {
    /// The root fetch failed; the network is unavailable, not partial.
    #[error("store failure during traversal: {0}")]
    Store(#[from] StoreError),

    /// The root identifier has no record.
    #[error("no record for root user {0}")]
    RootNotFound(String),

    /// A referral edge led back to an ancestor of the current path.
    /// Raised per branch and always folded into the report by the parent
    /// join loop (a root self-edge included, since the root expands it as
    /// a child branch), so the top-level operations surface cycles through
    /// the report rather than through this variant.
    #[error("referral cycle detected at {id} (path: {path:?})")]
    Cycle { id: String, path: Vec<String> },

    /// The caller cancelled the traversal.
    #[error("traversal cancelled")]
    Cancelled,

    /// A traversal worker task failed to join.
    #[error("traversal task failed: {0}")]
    Task(String),
}
