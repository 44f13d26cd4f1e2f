//! Explicit session context.
//!
//! A [`Session`] is opened for a signed-in user, handed to every privileged
//! operation, and dropped on logout. It replaces any process-wide notion of
//! "the current user".

use crate::error::{Error, Result};
use crate::models::{UserId, UserRecord};
use crate::store::RecordStore;

/// Snapshot of the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: UserId,
    name: String,
    is_admin: bool,
}

impl Session {
    /// Open a session for an existing user.
    pub async fn open<S: RecordStore + ?Sized>(store: &S, user_id: &str) -> Result<Self> {
        let user = store
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        Ok(Self::from_record(&user))
    }

    pub fn from_record(user: &UserRecord) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
        }
    }

    /// Reload the snapshot, picking up a changed admin flag or name.
    pub async fn refresh<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        *self = Self::open(store, &self.user_id).await?;
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Fail with `Unauthorized` unless the actor holds the admin flag.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "{} requires an admin, {} is not one",
                action, self.user_id
            )))
        }
    }
}
