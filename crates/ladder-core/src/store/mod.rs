//! Record store abstraction.
//!
//! The engine never owns user or referral state; it reads and patches it
//! through [`RecordStore`]. Each method is atomic on its own. Nothing spans
//! calls, so multi-step operations use [`RecordStore::patch_user_guarded`]
//! to detect interleaved writers.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{
    HistoryCollection, HistoryEntry, HistoryId, HistoryRecord, PatchGuard, ReferralEdge, UserId,
    UserPatch, UserRecord,
};
use async_trait::async_trait;

/// Storage backend for users, referral edges and audit history.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a user by id. Absence is `Ok(None)`, not an error.
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>>;

    /// Direct referrals of `id`, in the order they were added.
    async fn get_direct_referrals(&self, id: &str) -> Result<Vec<ReferralEdge>>;

    /// Overwrite the fields present in `patch`. Fails with `NotFound` if the
    /// user does not exist. Returns the updated record.
    async fn patch_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord>;

    /// Like [`RecordStore::patch_user`], but only if the stored record still
    /// satisfies `guard`; otherwise fails with `Conflict` and writes nothing.
    async fn patch_user_guarded(
        &self,
        id: &str,
        guard: &PatchGuard,
        patch: &UserPatch,
    ) -> Result<UserRecord>;

    /// Append an entry under `subject_id` in `collection`, returning its new id.
    async fn append_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
        entry: &HistoryEntry,
    ) -> Result<HistoryId>;

    /// Entries under `subject_id` in `collection`, oldest first.
    async fn list_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
    ) -> Result<Vec<HistoryRecord>>;

    /// Insert a new user. Fails with `Conflict` if the id is taken.
    async fn create_user(&self, record: &UserRecord) -> Result<()>;

    /// All users, ordered by id.
    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Bind `code` to `user_id` if the code is unused. Returns whether the
    /// claim succeeded.
    async fn claim_referral_code(&self, code: &str, user_id: &str) -> Result<bool>;

    /// Unbind `code` if it is still bound to `user_id`. A code owned by
    /// someone else, or not bound at all, is left alone.
    async fn release_referral_code(&self, code: &str, user_id: &str) -> Result<()>;

    /// Owner of a referral code.
    async fn resolve_referral_code(&self, code: &str) -> Result<Option<UserId>>;

    /// Record a direct referral under `referrer_id` and store the new direct
    /// referral count on the referrer's record, in one step. Returns that
    /// count. Fails with `NotFound` if the referrer does not exist and with
    /// `Conflict` if the edge is already there; neither writes anything.
    async fn add_referral(&self, referrer_id: &str, edge: &ReferralEdge) -> Result<u32>;
}

/// Reject an entry filed outside its own collection.
pub fn check_collection(
    collection: HistoryCollection,
    entry: &HistoryEntry,
) -> Result<()> {
    if entry.collection() != collection {
        return Err(crate::Error::InvalidInput(format!(
            "{} entry cannot be filed under {}",
            entry.collection(),
            collection
        )));
    }
    Ok(())
}
