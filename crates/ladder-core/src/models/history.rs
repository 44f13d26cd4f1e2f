//! Append-only audit entries.

use super::{Rank, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique id of a stored history entry.
pub type HistoryId = String;

/// History collection an entry is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryCollection {
    #[serde(rename = "pointsHistory")]
    Points,
    #[serde(rename = "promotionHistory")]
    Promotion,
}

impl HistoryCollection {
    /// Storage name of the collection.
    pub fn name(self) -> &'static str {
        match self {
            HistoryCollection::Points => "pointsHistory",
            HistoryCollection::Promotion => "promotionHistory",
        }
    }
}

impl fmt::Display for HistoryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A points award.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsHistoryEntry {
    /// Points added (the delta, not the new total)
    pub points: u64,
    pub reason: String,
    pub added_by: UserId,
    pub added_by_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_admin_action: bool,
}

/// A rank change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromotionHistoryEntry {
    pub from_rank: Rank,
    pub to_rank: Rank,
    pub timestamp: DateTime<Utc>,
}

/// Any history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Points(PointsHistoryEntry),
    Promotion(PromotionHistoryEntry),
}

impl HistoryEntry {
    /// The collection this entry belongs in.
    pub fn collection(&self) -> HistoryCollection {
        match self {
            HistoryEntry::Points(_) => HistoryCollection::Points,
            HistoryEntry::Promotion(_) => HistoryCollection::Promotion,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Points(e) => e.timestamp,
            HistoryEntry::Promotion(e) => e.timestamp,
        }
    }
}

/// A stored entry with its generated id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub subject_id: UserId,
    pub entry: HistoryEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names() {
        assert_eq!(HistoryCollection::Points.name(), "pointsHistory");
        assert_eq!(HistoryCollection::Promotion.to_string(), "promotionHistory");
    }

    #[test]
    fn entry_knows_its_collection() {
        let entry = HistoryEntry::Promotion(PromotionHistoryEntry {
            from_rank: Rank::BEGINNER,
            to_rank: Rank::new(1).unwrap(),
            timestamp: Utc::now(),
        });
        assert_eq!(entry.collection(), HistoryCollection::Promotion);
    }

    #[test]
    fn tagged_json() {
        let entry = HistoryEntry::Points(PointsHistoryEntry {
            points: 25,
            reason: "event bonus".into(),
            added_by: "u-admin".into(),
            added_by_name: "Admin".into(),
            timestamp: Utc::now(),
            is_admin_action: true,
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "points");
        assert_eq!(json["points"], 25);
    }
}
