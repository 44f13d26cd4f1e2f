//! Referral edges.

use super::{MemberStatus, UserId, UserRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directed relation recorded when `referred_id` registers with the
/// referrer's code.
///
/// The name, email, join date and status are a snapshot of the referred user
/// taken when the edge was created; they are not kept in sync afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralEdge {
    pub referrer_id: UserId,
    pub referred_id: UserId,
    pub name: String,
    pub email: String,
    pub join_date: DateTime<Utc>,
    #[serde(default)]
    pub status: MemberStatus,
    /// Always 1: the referred user is a direct descendant
    #[serde(default = "direct_level")]
    pub level: u32,
}

fn direct_level() -> u32 {
    1
}

impl ReferralEdge {
    /// Snapshot `referred` as a direct referral of `referrer_id`.
    pub fn snapshot(referrer_id: &str, referred: &UserRecord) -> Self {
        Self {
            referrer_id: referrer_id.to_string(),
            referred_id: referred.id.clone(),
            name: referred.name.clone(),
            email: referred.email.clone(),
            join_date: referred.join_date,
            status: referred.status,
            level: direct_level(),
        }
    }
}
