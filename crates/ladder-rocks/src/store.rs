//! Persistent record store using RocksDB.
//!
//! Documents are JSON values under prefixed keys:
//!
//! | key                                          | value                 |
//! |----------------------------------------------|-----------------------|
//! | `user:{id}`                                  | `UserRecord`          |
//! | `referrals:{id}`                             | `Vec<ReferralEdge>`   |
//! | `code:{code}`                                | owning user id        |
//! | `history:{collection}:{len}:{id}:{seq:020}`  | `HistoryRecord`       |
//! | `histseq:{collection}:{len}:{id}`            | next `seq` to use     |
//!
//! History keys carry the subject id's byte length ahead of the id, so a
//! subject prefix never matches the keys of a longer id containing `:`.
//!
//! Read-modify-write sequences take `write_lock` so two patches to one
//! record cannot interleave. Writes touching more than one key go through a
//! single `WriteBatch`.

use crate::error::Result as StoreResult;
use crate::RocksConfig;
use async_trait::async_trait;
use ladder_core::store::check_collection;
use ladder_core::{
    Error, HistoryCollection, HistoryEntry, HistoryId, HistoryRecord, PatchGuard, RecordStore,
    ReferralEdge, Result, UserId, UserPatch, UserRecord,
};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// [`RecordStore`] backed by a RocksDB database.
pub struct RocksStore {
    db: DB,
    write_lock: Mutex<()>,
}

fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

fn referrals_key(id: &str) -> String {
    format!("referrals:{}", id)
}

fn code_key(code: &str) -> String {
    format!("code:{}", code)
}

fn subject(id: &str) -> String {
    format!("{}:{}", id.len(), id)
}

fn history_prefix(collection: HistoryCollection, subject_id: &str) -> String {
    format!("history:{}:{}:", collection.name(), subject(subject_id))
}

fn history_seq_key(collection: HistoryCollection, subject_id: &str) -> String {
    format!("histseq:{}:{}", collection.name(), subject(subject_id))
}

fn batch_put_json<T: Serialize + ?Sized>(
    batch: &mut WriteBatch,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    batch.put(key.as_bytes(), serde_json::to_vec(value)?);
    Ok(())
}

impl RocksStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Create the data directory if needed, then open the store in it.
    pub fn open_with(config: &RocksConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        debug!(path = ?config.data_dir, "Opening record store");
        Self::open(&config.data_dir)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let value = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.db.get_pinned(key.as_bytes())?.is_some())
    }

    /// Every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut values = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                values.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(values)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RocksStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.get_json(&user_key(id))?)
    }

    async fn get_direct_referrals(&self, id: &str) -> Result<Vec<ReferralEdge>> {
        Ok(self
            .get_json::<Vec<ReferralEdge>>(&referrals_key(id))?
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
        let _guard = self.write_lock.lock().await;
        let key = user_key(id);
        let mut user: UserRecord = self
            .get_json(&key)?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))?;
        if !guard.holds_for(&user) {
            return Err(Error::Conflict(format!(
                "user {} no longer matches {:?}",
                id, guard
            )));
        }
        user.apply(patch);
        self.put_json(&key, &user)?;
        Ok(user)
    }

    async fn append_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
        entry: &HistoryEntry,
    ) -> Result<HistoryId> {
        check_collection(collection, entry)?;
        let _guard = self.write_lock.lock().await;
        let seq_key = history_seq_key(collection, subject_id);
        let seq: u64 = self.get_json(&seq_key)?.unwrap_or(0);
        let record = HistoryRecord {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            entry: entry.clone(),
        };

        let mut batch = WriteBatch::default();
        let key = format!("{}{:020}", history_prefix(collection, subject_id), seq);
        batch_put_json(&mut batch, &key, &record)?;
        batch_put_json(&mut batch, &seq_key, &(seq + 1))?;
        self.write(batch)?;
        Ok(record.id)
    }

    async fn list_history(
        &self,
        collection: HistoryCollection,
        subject_id: &str,
    ) -> Result<Vec<HistoryRecord>> {
        Ok(self.scan(&history_prefix(collection, subject_id))?)
    }

    async fn create_user(&self, record: &UserRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = user_key(&record.id);
        if self.exists(&key)? {
            return Err(Error::Conflict(format!("user {} already exists", record.id)));
        }
        self.put_json(&key, record)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.scan("user:")?)
    }

    async fn claim_referral_code(&self, code: &str, user_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = code_key(code);
        if self.exists(&key)? {
            return Ok(false);
        }
        self.put_json(&key, user_id)?;
        Ok(true)
    }

    async fn release_referral_code(&self, code: &str, user_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = code_key(code);
        let owner: Option<UserId> = self.get_json(&key)?;
        if owner.as_deref() == Some(user_id) {
            self.delete(&key)?;
        }
        Ok(())
    }

    async fn resolve_referral_code(&self, code: &str) -> Result<Option<UserId>> {
        Ok(self.get_json(&code_key(code))?)
    }

    async fn add_referral(&self, referrer_id: &str, edge: &ReferralEdge) -> Result<u32> {
        let _guard = self.write_lock.lock().await;
        let user_key = user_key(referrer_id);
        let mut referrer: UserRecord = self
            .get_json(&user_key)?
            .ok_or_else(|| Error::NotFound(format!("referrer {}", referrer_id)))?;
        let key = referrals_key(referrer_id);
        let mut edges: Vec<ReferralEdge> = self.get_json(&key)?.unwrap_or_default();
        if edges.iter().any(|e| e.referred_id == edge.referred_id) {
            return Err(Error::Conflict(format!(
                "{} is already referred by {}",
                edge.referred_id, referrer_id
            )));
        }
        edges.push(edge.clone());
        referrer.referrals_count = edges.len() as u32;

        let mut batch = WriteBatch::default();
        batch_put_json(&mut batch, &key, &edges)?;
        batch_put_json(&mut batch, &user_key, &referrer)?;
        self.write(batch)?;
        Ok(referrer.referrals_count)
    }
}
