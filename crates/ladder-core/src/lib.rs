//! Ladder - Referral Network Engine
//!
//! Users register with an optional referral code, earn points, and climb a
//! fixed ladder of ranks 0 through 5. Promotion past rank 1 depends on how
//! many members of the user's referral tree already hold the same rank.
//!
//! # Architecture
//!
//! - **Models**: Users, referral edges, history entries, the derived tree
//! - **Store**: [`RecordStore`] trait with an in-memory implementation
//! - **Tree**: Bounded breadth-first tree construction with cycle detection
//! - **Promotion**: Pure promotion rule plus the evaluator that applies it
//! - **Award**: Points award -> history -> promotion check
//! - **Registration / Admin / Members**: Account, operator and listing flows
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ladder_core::{Ladder, LadderConfig, MemoryStore, NewMember};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ladder = Ladder::new(Arc::new(MemoryStore::new()), LadderConfig::from_env()?)?;
//!     let reg = ladder
//!         .register(&NewMember {
//!             name: "Alice".into(),
//!             email: "alice@example.com".into(),
//!             referral_code: None,
//!         })
//!         .await?;
//!     println!("share this code: {}", reg.user.referral_code);
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod award;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod members;
pub mod models;
pub mod promotion;
pub mod registration;
pub mod session;
pub mod store;
pub mod tree;

pub use admin::{edit_member, grant_admin, MemberEdit};
pub use award::{award_points, AwardReceipt, AwardRequest};
pub use config::LadderConfig;
pub use engine::Ladder;
pub use error::{Error, Result};
pub use export::{export_csv, CSV_HEADER};
pub use members::{
    flatten, network_members, paginate, recent_referrals, sort_members, MemberFilter,
    NetworkMember, NetworkStats, Page, SortDirection, SortKey,
};
pub use models::{
    HistoryCollection, HistoryEntry, HistoryId, HistoryRecord, MemberStatus, PatchGuard,
    PointsHistoryEntry, PromotionHistoryEntry, Rank, ReferralEdge, ReferralTree, UserId,
    UserPatch, UserRecord,
};
pub use promotion::{PromotionOutcome, PromotionRule, RankEvaluator};
pub use registration::{generate_referral_code, register, NewMember, Registration};
pub use session::Session;
pub use store::{check_collection, MemoryStore, RecordStore};
pub use tree::TreeBuilder;
