//! User record model and partial updates.

use super::Rank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a user record.
pub type UserId = String;

/// Account status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// Unique identifier
    pub id: UserId,

    /// Display name
    pub name: String,

    pub email: String,

    /// This user's own code, handed out to people they refer
    pub referral_code: String,

    /// Accumulated points
    #[serde(default)]
    pub points: u64,

    #[serde(default)]
    pub rank: Rank,

    /// Code the user registered with, if any (write-once)
    pub referred_by: Option<String>,

    #[serde(default)]
    pub status: MemberStatus,

    /// Registration time (immutable)
    pub join_date: DateTime<Utc>,

    /// Operator flag
    #[serde(default)]
    pub is_admin: bool,

    /// Number of direct referrals
    #[serde(default)]
    pub referrals_count: u32,
}

impl UserRecord {
    /// Create a fresh rank 0 account with no points.
    pub fn new(id: UserId, name: String, email: String, referral_code: String) -> Self {
        Self {
            id,
            name,
            email,
            referral_code,
            points: 0,
            rank: Rank::BEGINNER,
            referred_by: None,
            status: MemberStatus::Active,
            join_date: Utc::now(),
            is_admin: false,
            referrals_count: 0,
        }
    }

    /// Apply a patch in place. Fields absent from the patch are untouched.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(points) = patch.points {
            self.points = points;
        }
        if let Some(rank) = patch.rank {
            self.rank = rank;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = is_admin;
        }
        if let Some(count) = patch.referrals_count {
            self.referrals_count = count;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Partial overwrite of a [`UserRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub points: Option<u64>,
    pub rank: Option<Rank>,
    pub status: Option<MemberStatus>,
    pub is_admin: Option<bool>,
    pub referrals_count: Option<u32>,
}

impl UserPatch {
    pub fn points(points: u64) -> Self {
        Self {
            points: Some(points),
            ..Self::default()
        }
    }

    pub fn rank(rank: Rank) -> Self {
        Self {
            rank: Some(rank),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Expected prior values for a compare-and-set patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchGuard {
    pub points: Option<u64>,
    pub rank: Option<Rank>,
}

impl PatchGuard {
    pub fn points(points: u64) -> Self {
        Self {
            points: Some(points),
            rank: None,
        }
    }

    pub fn rank(rank: Rank) -> Self {
        Self {
            points: None,
            rank: Some(rank),
        }
    }

    /// Whether `record` still holds the expected values.
    pub fn holds_for(&self, record: &UserRecord) -> bool {
        self.points.map_or(true, |p| record.points == p)
            && self.rank.map_or(true, |r| record.rank == r)
    }
}
