//! Wire data model for the referral record store.
//!
//! Field names follow the schema the store already holds (camelCase JSON),
//! so records written by older clients deserialize unchanged:
//! - `users/{id}` holds a [`UserRecord`]
//! - `userReferrals/{id}/{childId}` holds an [`EdgeSnapshot`]
//! - `referralCodes/{code}` holds the owning user id as a bare string

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account standing of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
    Suspended,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Status::Active),
            "inactive" => Some(Status::Inactive),
            "suspended" => Some(Status::Suspended),
            _ => None,
        }
    }

    /// The status-toggle transition: active members are deactivated,
    /// everyone else (inactive or suspended) is reactivated.
    pub fn toggled(&self) -> Self {
        match self {
            Status::Active => Status::Inactive,
            _ => Status::Active,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Active
    }
}

/// A user record as stored under `users/{id}`.
///
/// The identifier is the store key, not a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    /// Point balance. Older records may omit the field entirely.
    #[serde(default)]
    pub points: u64,
    pub join_date: DateTime<Utc>,
    /// Unique share code, assigned at registration, immutable.
    pub referral_code: String,
    /// Identifier of the referring user. `None` for forest roots.
    #[serde(default)]
    pub referred_by: Option<String>,
    #[serde(default)]
    pub status: Status,
    /// Denormalized direct-referral count, refreshed after mutations.
    /// Derived data only; traversal never trusts it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrals_count: Option<u64>,
}

impl UserRecord {
    /// Build a fresh record for registration: zero points, active, joined now.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        referral_code: impl Into<String>,
        referred_by: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            points: 0,
            join_date: Utc::now(),
            referral_code: referral_code.into(),
            referred_by,
            status: Status::Active,
            referrals_count: None,
        }
    }
}

/// Denormalized snapshot of a referred user, written when the edge is
/// created and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSnapshot {
    pub name: String,
    pub email: String,
    pub join_date: DateTime<Utc>,
    /// Always 1 for a direct referral; kept for schema compatibility.
    pub level: u32,
    #[serde(default)]
    pub status: Status,
}

impl EdgeSnapshot {
    /// Snapshot a user record at edge-creation time.
    pub fn of(record: &UserRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            join_date: record.join_date,
            level: 1,
            status: record.status,
        }
    }
}
