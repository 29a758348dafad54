//! In-memory shapes produced by network traversal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use refnet_store::{Status, UserRecord};

/// One user in a materialized network tree.
///
/// Owned exclusively by the materialization call that built it; only
/// `UserRecord`s are shared across calls (through the node cache), never
/// nodes. Children are keyed by identifier, so sibling order is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    /// Root-to-node path length; 0 for the traversal root.
    pub level: u32,
    pub record: UserRecord,
    pub children: BTreeMap<String, NetworkNode>,
}

impl NetworkNode {
    pub fn new(id: impl Into<String>, level: u32, record: UserRecord) -> Self {
        Self {
            id: id.into(),
            level,
            record,
            children: BTreeMap::new(),
        }
    }
}

/// Flattened view of one network member, the working unit of the query
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub points: u64,
    pub join_date: DateTime<Utc>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub status: Status,
    pub referrals_count: Option<u64>,
    pub level: u32,
}

impl MemberRow {
    pub fn from_record(id: impl Into<String>, record: &UserRecord, level: u32) -> Self {
        Self {
            id: id.into(),
            name: record.name.clone(),
            email: record.email.clone(),
            points: record.points,
            join_date: record.join_date,
            referral_code: record.referral_code.clone(),
            referred_by: record.referred_by.clone(),
            status: record.status,
            referrals_count: record.referrals_count,
            level,
        }
    }
}

/// Summary statistics over one materialized tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_members: u64,
    pub max_level: u32,
    pub total_points: u64,
}

/// A cycle tripped by the traversal guard: the offending identifier and
/// the ancestor path that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    pub id: String,
    pub path: Vec<String>,
}

/// What the traversal skipped or lost along the way.
///
/// The presentation layer uses this to distinguish "network partially
/// loaded" from "network unavailable" (a root-level error, which is a
/// [`NetError`](crate::error::NetError) instead) and "empty network"
/// (one node, clean report).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Edges whose target had no record; skipped silently.
    pub missing_skipped: u32,
    /// Non-root store failures; each dropped a subtree or a node's
    /// descent while the rest of the network survived.
    pub store_errors: u32,
    /// Cycles tripped by the ancestor guard. Never silently dropped:
    /// they indicate corrupted edge data.
    pub cycles: Vec<CyclePath>,
}

impl TraversalReport {
    /// True when some part of the network could not be loaded.
    pub fn partial(&self) -> bool {
        self.store_errors > 0
    }
}

/// Result of a bounded materialization.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub root: NetworkNode,
    pub report: TraversalReport,
}

/// Result of an unbounded collection.
#[derive(Debug, Clone)]
pub struct Collected {
    pub rows: Vec<MemberRow>,
    pub report: TraversalReport,
}
