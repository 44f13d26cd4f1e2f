//! In-memory record store.
//!
//! Used by tests and embedded setups. Failure switches let callers exercise
//! the unavailable and conflict paths without a real backend.

use super::{check_collection, RecordStore};
use crate::error::{Error, Result};
use crate::models::{
    HistoryCollection, HistoryEntry, HistoryId, HistoryRecord, PatchGuard, ReferralEdge, UserId,
    UserPatch, UserRecord,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    referrals: HashMap<UserId, Vec<ReferralEdge>>,
    codes: HashMap<String, UserId>,
    history: HashMap<(HistoryCollection, UserId), Vec<HistoryRecord>>,
}

/// Record store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    forced_conflicts: AtomicU32,
    failing_history: RwLock<Option<HistoryCollection>>,
    fail_creates: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with `Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with `Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `n` guarded patches with `Conflict`, as if another
    /// writer got there first.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make history appends to `collection` fail with `Unavailable`.
    pub async fn set_fail_history(&self, collection: Option<HistoryCollection>) {
        *self.failing_history.write().await = collection;
    }

    /// Make `create_user` fail with `Unavailable` while other writes go
    /// through.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Number of bound referral codes.
    pub async fn code_count(&self) -> usize {
        self.tables.read().await.codes.len()
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls that reached the tables so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a user and, if `referrer_id` is given, a referral edge, without
    /// going through registration. Handy for seeding test networks.
    pub async fn seed(&self, user: UserRecord, referrer_id: Option<&str>) {
        let mut tables = self.tables.write().await;
        tables
            .codes
            .insert(user.referral_code.clone(), user.id.clone());
        if let Some(referrer) = referrer_id {
            let edge = ReferralEdge::snapshot(referrer, &user);
            let edges = tables.referrals.entry(referrer.to_string()).or_default();
            edges.push(edge);
            let count = edges.len() as u32;
            if let Some(parent) = tables.users.get_mut(referrer) {
                parent.referrals_count = count;
            }
        }
        tables.users.insert(user.id.clone(), user);
    }

    /// Remove a user record, leaving any edges that point at it.
    pub async fn remove_user(&self, id: &str) -> Option<UserRecord> {
        self.tables.write().await.users.remove(id)
    }

    /// Add an edge with no checks at all. Lets tests build corrupted graphs.
    pub async fn insert_raw_edge(&self, referrer_id: &str, edge: ReferralEdge) {
        self.tables
            .write()
            .await
            .referrals
            .entry(referrer_id.to_string())
            .or_default()
            .push(edge);
    }

    fn begin_read(&self) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store reads disabled".into()));
        }
        Ok(())
    }

    fn begin_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store writes disabled".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        self.begin_read()?;
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn get_direct_referrals(&self, id: &str) -> Result<Vec<ReferralEdge>> {
        self.begin_read()?;
        Ok(self
            .tables
            .read()
            .await
            .referrals
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord> {
        self.patch_user_guarded(id, &PatchGuard::default(), patch)
            .await
    }

    async fn patch_user_guarded(
        &self,
        id: &str,
        guard: &PatchGuard,
        patch: &UserPatch,
    ) -> Result<UserRecord> {
        self.begin_write()?;
        let guarded = *guard != PatchGuard::default();
        if guarded && self.take_forced_conflict() {
            return Err(Error::Conflict(format!("user {} changed concurrently", id)));
        }

        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))?;
        if !guard.holds_for(user) {
            return Err(Error::Conflict(format!(
                "user {} no longer matches {:?}",
                id, guard
            )));
        }
        user.apply(patch);
        Ok(user.clone())
    }

    async fn append_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
        entry: &HistoryEntry,
    ) -> Result<HistoryId> {
        check_collection(collection, entry)?;
        if *self.failing_history.read().await == Some(collection) {
            return Err(Error::Unavailable(format!("{} appends disabled", collection)));
        }
        self.begin_write()?;
        let id = Uuid::new_v4().to_string();
        let record = HistoryRecord {
            id: id.clone(),
            subject_id: subject_id.to_string(),
            entry: entry.clone(),
        };
        self.tables
            .write()
            .await
            .history
            .entry((collection, subject_id.to_string()))
            .or_default()
            .push(record);
        Ok(id)
    }

    async fn list_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
    ) -> Result<Vec<HistoryRecord>> {
        self.begin_read()?;
        Ok(self
            .tables
            .read()
            .await
            .history
            .get(&(collection, subject_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_user(&self, record: &UserRecord) -> Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store user creation disabled".into()));
        }
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&record.id) {
            return Err(Error::Conflict(format!("user {} already exists", record.id)));
        }
        tables.users.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.begin_read()?;
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn claim_referral_code(&self, code: &str, user_id: &str) -> Result<bool> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if tables.codes.contains_key(code) {
            return Ok(false);
        }
        tables.codes.insert(code.to_string(), user_id.to_string());
        Ok(true)
    }

    async fn release_referral_code(&self, code: &str, user_id: &str) -> Result<()> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if tables.codes.get(code).is_some_and(|owner| owner == user_id) {
            tables.codes.remove(code);
        }
        Ok(())
    }

    async fn resolve_referral_code(&self, code: &str) -> Result<Option<UserId>> {
        self.begin_read()?;
        Ok(self.tables.read().await.codes.get(code).cloned())
    }

    async fn add_referral(&self, referrer_id: &str, edge: &ReferralEdge) -> Result<u32> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let Tables { users, referrals, .. } = &mut *tables;
        let referrer = users
            .get_mut(referrer_id)
            .ok_or_else(|| Error::NotFound(format!("referrer {}", referrer_id)))?;
        let edges = referrals.entry(referrer_id.to_string()).or_default();
        if edges.iter().any(|e| e.referred_id == edge.referred_id) {
            return Err(Error::Conflict(format!(
                "{} is already referred by {}",
                edge.referred_id, referrer_id
            )));
        }
        edges.push(edge.clone());
        referrer.referrals_count = edges.len() as u32;
        Ok(referrer.referrals_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PointsHistoryEntry, Rank};
    use chrono::Utc;

    fn user(id: &str) -> UserRecord {
        UserRecord::new(
            id.to_string(),
            id.to_string(),
            format!("{}@example.com", id),
            format!("CODE{:0>4}", id),
        )
    }

    #[tokio::test]
    async fn create_get_patch() {
        let store = MemoryStore::new();
        store.create_user(&user("a")).await.unwrap();
        assert!(matches!(
            store.create_user(&user("a")).await,
            Err(Error::Conflict(_))
        ));

        let updated = store.patch_user("a", &UserPatch::points(30)).await.unwrap();
        assert_eq!(updated.points, 30);
        assert_eq!(store.get_user("a").await.unwrap().unwrap().points, 30);
        assert!(store.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_missing_user_is_not_found() {
        let store = MemoryStore::new();
        let err = store.patch_user("ghost", &UserPatch::points(1)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn guarded_patch_detects_stale_expectation() {
        let store = MemoryStore::new();
        store.create_user(&user("a")).await.unwrap();

        let err = store
            .patch_user_guarded("a", &PatchGuard::points(5), &UserPatch::points(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.get_user("a").await.unwrap().unwrap().points, 0);

        store
            .patch_user_guarded("a", &PatchGuard::rank(Rank::BEGINNER), &UserPatch::points(10))
            .await
            .unwrap();
        assert_eq!(store.get_user("a").await.unwrap().unwrap().points, 10);
    }

    #[tokio::test]
    async fn forced_conflicts_are_consumed() {
        let store = MemoryStore::new();
        store.create_user(&user("a")).await.unwrap();
        store.force_conflicts(1);
        let guard = PatchGuard::points(0);
        assert!(store
            .patch_user_guarded("a", &guard, &UserPatch::points(1))
            .await
            .is_err());
        assert!(store
            .patch_user_guarded("a", &guard, &UserPatch::points(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn referrals_keep_insertion_order() {
        let store = MemoryStore::new();
        for id in ["root", "z", "a", "m"] {
            store.create_user(&user(id)).await.unwrap();
        }
        for id in ["z", "a", "m"] {
            let child = store.get_user(id).await.unwrap().unwrap();
            store
                .add_referral("root", &ReferralEdge::snapshot("root", &child))
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .get_direct_referrals("root")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.referred_id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);

        let dup = store.get_user("a").await.unwrap().unwrap();
        assert!(store
            .add_referral("root", &ReferralEdge::snapshot("root", &dup))
            .await
            .is_err());
        assert_eq!(
            store.get_user("root").await.unwrap().unwrap().referrals_count,
            3
        );
    }

    #[tokio::test]
    async fn referral_needs_existing_referrer() {
        let store = MemoryStore::new();
        let err = store
            .add_referral("ghost", &ReferralEdge::snapshot("ghost", &user("a")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.get_direct_referrals("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn referral_codes_claim_once() {
        let store = MemoryStore::new();
        assert!(store.claim_referral_code("ABCD1234", "a").await.unwrap());
        assert!(!store.claim_referral_code("ABCD1234", "b").await.unwrap());
        assert_eq!(
            store.resolve_referral_code("ABCD1234").await.unwrap(),
            Some("a".to_string())
        );
        assert_eq!(store.resolve_referral_code("NOPE0000").await.unwrap(), None);

        store.release_referral_code("ABCD1234", "b").await.unwrap();
        assert_eq!(store.code_count().await, 1);
        store.release_referral_code("ABCD1234", "a").await.unwrap();
        assert_eq!(store.resolve_referral_code("ABCD1234").await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_appends_with_unique_ids() {
        let store = MemoryStore::new();
        let entry = HistoryEntry::Points(PointsHistoryEntry {
            points: 10,
            reason: "welcome".into(),
            added_by: "admin".into(),
            added_by_name: "Admin".into(),
            timestamp: Utc::now(),
            is_admin_action: false,
        });
        let first = store
            .append_history(HistoryCollection::Points, "a", &entry)
            .await
            .unwrap();
        let second = store
            .append_history(HistoryCollection::Points, "a", &entry)
            .await
            .unwrap();
        assert_ne!(first, second);

        let listed = store
            .list_history(HistoryCollection::Points, "a")
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);

        assert!(store
            .append_history(HistoryCollection::Promotion, "a", &entry)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn failure_switches() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        assert!(matches!(
            store.get_user("a").await,
            Err(Error::Unavailable(_))
        ));
        store.set_fail_reads(false);

        store.set_fail_writes(true);
        assert!(matches!(
            store.create_user(&user("a")).await,
            Err(Error::Unavailable(_))
        ));
        assert_eq!(store.write_count(), 0);
    }
}
