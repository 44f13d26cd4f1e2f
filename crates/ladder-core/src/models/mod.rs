//! Data model for the referral network.
//!
//! # Stored Types
//!
//! - [`UserRecord`] - A registered user with points, rank and status
//! - [`ReferralEdge`] - Referrer -> referred relation with a snapshot of the referred user
//! - [`HistoryEntry`] - Append-only points and promotion audit entries
//!
//! # Derived Types
//!
//! - [`ReferralTree`] - Bounded referral tree, built per query
//! - [`Rank`] - Position on the 0..=5 ladder

mod history;
mod rank;
mod referral;
mod tree;
mod user;

pub use history::{
    HistoryCollection, HistoryEntry, HistoryId, HistoryRecord, PointsHistoryEntry,
    PromotionHistoryEntry,
};
pub use rank::Rank;
pub use referral::ReferralEdge;
pub use tree::{Descendants, ReferralTree};
pub use user::{MemberStatus, PatchGuard, UserId, UserPatch, UserRecord};
