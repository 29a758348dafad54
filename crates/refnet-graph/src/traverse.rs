//! Network materialization and collection.
//!
//! One descent routine serves both operations: `materialize` bounds the
//! depth and returns the nested tree, `collect_all` runs unbounded and
//! flattens the tree into pre-order member rows for management views.
//! Sibling subtrees are expanded concurrently, bounded by a semaphore so a
//! wide network cannot flood the store.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use refnet_store::{RecordStore, StoreConfig};

use crate::cache::NodeCache;
use crate::error::NetError;
use crate::schema::{
    Collected, CyclePath, Materialized, MemberRow, NetworkNode, TraversalReport,
};

/// Expands referral networks from a root identifier.
pub struct NetworkLoader {
    store: Arc<dyn RecordStore>,
    max_concurrent: usize,
    cancel: CancellationToken,
}

/// State shared by every branch of one traversal session.
struct Session {
    store: Arc<dyn RecordStore>,
    cache: Arc<NodeCache>,
    permits: Semaphore,
    cancel: CancellationToken,
    /// `None` for the unbounded collector descent.
    max_depth: Option<u32>,
    missing_skipped: AtomicU32,
    store_errors: AtomicU32,
    cycles: Mutex<Vec<CyclePath>>,
}

impl Session {
    fn report(&self) -> TraversalReport {
        TraversalReport {
            missing_skipped: self.missing_skipped.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            cycles: self.cycles.lock().expect("cycle lock").clone(),
        }
    }
}

impl NetworkLoader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            max_concurrent: 8,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a loader with the fetch bound taken from store configuration.
    pub fn from_config(store: Arc<dyn RecordStore>, config: &StoreConfig) -> Self {
        Self::new(store).with_fetch_limit(config.max_concurrent_fetches)
    }

    /// Bound on concurrent store fetches within one session.
    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.max_concurrent = limit.max(1);
        self
    }

    /// Token that aborts an in-flight traversal when cancelled. Traversal
    /// is read-only, so cancellation leaves no partial remote state.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn session(&self, cache: Arc<NodeCache>, max_depth: Option<u32>) -> Arc<Session> {
        Arc::new(Session {
            store: self.store.clone(),
            cache,
            permits: Semaphore::new(self.max_concurrent),
            cancel: self.cancel.clone(),
            max_depth,
            missing_skipped: AtomicU32::new(0),
            store_errors: AtomicU32::new(0),
            cycles: Mutex::new(Vec::new()),
        })
    }

    /// Reconstruct the referral tree under `root_id`, descending at most
    /// `max_depth` levels below the root.
    pub async fn materialize(&self, root_id: &str, max_depth: u32) -> Result<Materialized, NetError> {
        self.materialize_with_cache(Arc::new(NodeCache::new()), root_id, max_depth)
            .await
    }

    /// Same as [`materialize`](Self::materialize) with a caller-provided
    /// cache, so tests can assert fetch counts.
    pub async fn materialize_with_cache(
        &self,
        cache: Arc<NodeCache>,
        root_id: &str,
        max_depth: u32,
    ) -> Result<Materialized, NetError> {
        info!(root = root_id, max_depth, "materializing referral network");
        let session = self.session(cache, Some(max_depth));
        let root = expand(session.clone(), root_id.to_string(), 0, Vec::new())
            .await?
            .ok_or_else(|| NetError::RootNotFound(root_id.to_string()))?;
        let report = session.report();
        info!(
            root = root_id,
            partial = report.partial(),
            skipped = report.missing_skipped,
            "network materialized"
        );
        Ok(Materialized { root, report })
    }

    /// Collect every descendant of `root_id` (no depth bound) as a flat
    /// pre-order member list: root first, depth-first through each child
    /// subtree, siblings in identifier order. This is only the initial
    /// ordering; the query pipeline re-sorts.
    pub async fn collect_all(&self, root_id: &str) -> Result<Collected, NetError> {
        self.collect_all_with_cache(Arc::new(NodeCache::new()), root_id)
            .await
    }

    /// Same as [`collect_all`](Self::collect_all) with a caller-provided
    /// cache.
    pub async fn collect_all_with_cache(
        &self,
        cache: Arc<NodeCache>,
        root_id: &str,
    ) -> Result<Collected, NetError> {
        info!(root = root_id, "collecting referral network members");
        let session = self.session(cache, None);
        let root = expand(session.clone(), root_id.to_string(), 0, Vec::new())
            .await?
            .ok_or_else(|| NetError::RootNotFound(root_id.to_string()))?;
        let mut rows = Vec::new();
        flatten_preorder(&root, &mut rows);
        Ok(Collected {
            rows,
            report: session.report(),
        })
    }
}

fn flatten_preorder(node: &NetworkNode, rows: &mut Vec<MemberRow>) {
    rows.push(MemberRow::from_record(&node.id, &node.record, node.level));
    for child in node.children.values() {
        flatten_preorder(child, rows);
    }
}

type ExpandFuture = Pin<Box<dyn Future<Output = Result<Option<NetworkNode>, NetError>> + Send>>;

/// Expand one node and, below the depth bound, its descendants.
///
/// `path` is the ancestor identifier chain of this node; it is the loop
/// safety net mandated for traversal over externally stored edges. The
/// forest invariant says cycles cannot exist, but the guard fails the
/// branch instead of trusting the data.
///
/// Returns `Ok(None)` when the identifier has no record. Store errors and
/// cycles below this node are absorbed into the session report; only
/// failures of this node itself propagate as `Err`.
fn expand(session: Arc<Session>, id: String, level: u32, path: Vec<String>) -> ExpandFuture {
    Box::pin(async move {
        if session.cancel.is_cancelled() {
            return Err(NetError::Cancelled);
        }
        if path.contains(&id) {
            return Err(NetError::Cycle { id, path });
        }

        let record = {
            let _permit = tokio::select! {
                _ = session.cancel.cancelled() => return Err(NetError::Cancelled),
                permit = session.permits.acquire() => {
                    permit.map_err(|_| NetError::Cancelled)?
                }
            };
            session.cache.get_or_fetch(session.store.as_ref(), &id).await?
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let mut node = NetworkNode::new(&id, level, record);

        // The depth bound caps descent, not inclusion: a node at the bound
        // is kept, its edge set is never fetched.
        if session.max_depth.is_some_and(|depth| level >= depth) {
            return Ok(Some(node));
        }

        let edges = {
            let _permit = session
                .permits
                .acquire()
                .await
                .map_err(|_| NetError::Cancelled)?;
            match session.store.edges_from(&id).await {
                Ok(edges) => edges,
                Err(e) => {
                    warn!(id = %node.id, error = %e, "edge fetch failed; keeping node without descent");
                    session.store_errors.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(node));
                }
            }
        };
        if edges.is_empty() {
            return Ok(Some(node));
        }

        let mut child_path = path;
        child_path.push(id);

        let mut branches: JoinSet<(String, Result<Option<NetworkNode>, NetError>)> = JoinSet::new();
        for child_id in edges.into_keys() {
            let session = session.clone();
            let path = child_path.clone();
            branches.spawn(async move {
                let outcome = expand(session, child_id.clone(), level + 1, path).await;
                (child_id, outcome)
            });
        }

        while let Some(joined) = branches.join_next().await {
            let (child_id, outcome) = joined.map_err(|e| NetError::Task(e.to_string()))?;
            match outcome {
                Ok(Some(child)) => {
                    node.children.insert(child_id, child);
                }
                Ok(None) => {
                    // Dangling edge (deleted or corrupt record): skip the
                    // branch, keep the siblings.
                    debug!(child = %child_id, "edge points at missing record; skipping branch");
                    session.missing_skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(NetError::Cycle { id, path }) => {
                    error!(id = %id, ?path, "referral cycle detected; dropping branch");
                    session
                        .cycles
                        .lock()
                        .expect("cycle lock")
                        .push(CyclePath { id, path });
                }
                Err(NetError::Store(e)) => {
                    warn!(child = %child_id, error = %e, "child fetch failed; dropping subtree");
                    session.store_errors.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Some(node))
    })
}
