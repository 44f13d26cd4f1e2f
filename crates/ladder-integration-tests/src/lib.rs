//! Shared harness for the end-to-end tests.
//!
//! Every scenario runs once per backend: [`Harness::all`] yields an engine
//! over a fresh [`MemoryStore`] and one over a [`RocksStore`] in a temporary
//! directory.

use ladder_core::{
    Ladder, LadderConfig, MemoryStore, NewMember, Rank, RecordStore, Result, Session, UserPatch,
    UserRecord,
};
use ladder_rocks::RocksStore;
use std::fmt;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Rocks,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => f.write_str("memory"),
            Backend::Rocks => f.write_str("rocksdb"),
        }
    }
}

/// An engine over one backend, plus whatever keeps that backend alive.
pub struct Harness {
    pub backend: Backend,
    pub ladder: Ladder<dyn RecordStore>,
    _dir: Option<TempDir>,
}

impl Harness {
    pub fn memory(config: LadderConfig) -> Result<Self> {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        Ok(Self {
            backend: Backend::Memory,
            ladder: Ladder::new(store, config)?,
            _dir: None,
        })
    }

    pub fn rocks(config: LadderConfig) -> Result<Self> {
        let dir = tempfile::tempdir().map_err(ladder_rocks::StoreError::from)?;
        let store: Arc<dyn RecordStore> = Arc::new(RocksStore::open(dir.path())?);
        Ok(Self {
            backend: Backend::Rocks,
            ladder: Ladder::new(store, config)?,
            _dir: Some(dir),
        })
    }

    /// One harness per backend, all sharing `config`.
    pub fn all(config: LadderConfig) -> Result<Vec<Self>> {
        ladder_logging::init_for_tests();
        Ok(vec![Self::memory(config.clone())?, Self::rocks(config)?])
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.ladder.store()
    }

    /// Register `name`, under `referrer` when given.
    pub async fn join(&self, name: &str, referrer: Option<&UserRecord>) -> Result<UserRecord> {
        let registration = self
            .ladder
            .register(&NewMember {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                referral_code: referrer.map(|r| r.referral_code.clone()),
            })
            .await?;
        registration.referrer?;
        Ok(registration.user)
    }

    /// Register an operator and open a session for it. The admin flag is set
    /// on the store directly, since granting it needs an admin already.
    pub async fn operator(&self) -> Result<Session> {
        let user = self.join("Operator", None).await?;
        self.store()
            .patch_user(
                &user.id,
                &UserPatch {
                    is_admin: Some(true),
                    ..UserPatch::default()
                },
            )
            .await?;
        self.ladder.open_session(&user.id).await
    }

    /// Force a rank, bypassing promotion.
    pub async fn set_rank(&self, user_id: &str, rank: u8) -> Result<UserRecord> {
        self.store()
            .patch_user(user_id, &UserPatch::rank(Rank::new(rank)?))
            .await
    }

    /// Register a straight line of `len` users, each referred by the one
    /// before. The first has no referrer.
    pub async fn chain(&self, prefix: &str, len: usize) -> Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = Vec::with_capacity(len);
        for i in 0..len {
            let user = self.join(&format!("{}{}", prefix, i), users.last()).await?;
            users.push(user);
        }
        Ok(users)
    }
}
