//! Operator actions: granting the admin flag and editing member records.

use crate::error::{Error, Result};
use crate::models::{
    HistoryCollection, HistoryEntry, MemberStatus, PatchGuard, PromotionHistoryEntry, Rank,
    UserPatch, UserRecord,
};
use crate::session::Session;
use crate::store::RecordStore;
use chrono::Utc;
use tracing::{error, info};

/// Fields an operator may change on a member. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<MemberStatus>,
    /// New rank; must not be below the current one
    pub rank: Option<Rank>,
}

/// Give `target_id` the admin flag.
pub async fn grant_admin<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    target_id: &str,
) -> Result<UserRecord> {
    session.require_admin("granting admin")?;
    if target_id.trim().is_empty() {
        return Err(Error::InvalidInput("user id is required".into()));
    }
    let user = store
        .patch_user(
            target_id,
            &UserPatch {
                is_admin: Some(true),
                ..UserPatch::default()
            },
        )
        .await?;
    info!(user = target_id, by = session.user_id(), "Admin granted");
    Ok(user)
}

/// Apply an operator edit to `target_id`.
///
/// Raising the rank is guarded on the rank read here and recorded as a
/// promotion; if the record cannot be written the rank is put back and the
/// error returned. Lowering it is rejected.
pub async fn edit_member<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    target_id: &str,
    edit: &MemberEdit,
) -> Result<UserRecord> {
    session.require_admin("editing members")?;
    let name = trimmed("name", edit.name.as_deref())?;
    let email = trimmed("email", edit.email.as_deref())?;
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(Error::InvalidInput("email must contain '@'".into()));
    }

    let current = store
        .get_user(target_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", target_id)))?;

    let raised = match edit.rank {
        Some(rank) if rank < current.rank => {
            return Err(Error::InvalidInput(format!(
                "rank cannot go from {} down to {}",
                current.rank, rank
            )));
        }
        Some(rank) if rank > current.rank => Some(rank),
        _ => None,
    };

    let patch = UserPatch {
        name,
        email,
        status: edit.status,
        rank: raised,
        ..UserPatch::default()
    };
    if patch.is_empty() {
        return Ok(current);
    }

    let guard = match raised {
        Some(_) => PatchGuard::rank(current.rank),
        None => PatchGuard::default(),
    };
    let updated = store.patch_user_guarded(target_id, &guard, &patch).await?;

    if let Some(to_rank) = raised {
        let entry = HistoryEntry::Promotion(PromotionHistoryEntry {
            from_rank: current.rank,
            to_rank,
            timestamp: Utc::now(),
        });
        if let Err(e) = store
            .append_history(HistoryCollection::Promotion, target_id, &entry)
            .await
        {
            // Unrecorded rank changes are not allowed to stand
            let revert = UserPatch::rank(current.rank);
            if let Err(revert_err) = store
                .patch_user_guarded(target_id, &PatchGuard::rank(to_rank), &revert)
                .await
            {
                error!(
                    user = target_id,
                    to = %to_rank,
                    error = %revert_err,
                    "Rank edit could not be recorded or reverted"
                );
            }
            return Err(e);
        }
        info!(
            user = target_id,
            from = %current.rank,
            to = %to_rank,
            by = session.user_id(),
            "Rank raised by operator"
        );
    }
    info!(user = target_id, by = session.user_id(), "Member edited");
    Ok(updated)
}

fn trimmed(field: &str, value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        Some("") => Err(Error::InvalidInput(format!("{} cannot be blank", field))),
        other => Ok(other.map(str::to_string)),
    }
}
