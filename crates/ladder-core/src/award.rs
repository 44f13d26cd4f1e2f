//! Points award: add points, record the award, then check for promotion.
//!
//! The order is fixed. Promotion is judged on the post-award total, and the
//! history entry exists before the promotion check runs, so a failing check
//! still leaves an audit trail. A failed check does not roll the award back;
//! it is reported in [`AwardReceipt::promotion`].

use crate::config::LadderConfig;
use crate::error::{Error, Result};
use crate::models::{
    HistoryCollection, HistoryEntry, HistoryId, PatchGuard, PointsHistoryEntry, UserId, UserPatch,
};
use crate::promotion::{PromotionOutcome, RankEvaluator};
use crate::session::Session;
use crate::store::RecordStore;
use chrono::Utc;
use tracing::{error, info, warn};

/// A request to add points to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardRequest {
    pub user_id: UserId,
    /// Points to add; must be positive
    pub delta: i64,
    pub reason: String,
    /// Issued from the admin panel rather than the management view
    pub admin_action: bool,
}

impl AwardRequest {
    pub fn new(user_id: impl Into<UserId>, delta: i64, reason: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            delta,
            reason: reason.into(),
            admin_action: false,
        }
    }

    /// Mark the award as coming from the admin panel.
    pub fn from_admin_panel(mut self) -> Self {
        self.admin_action = true;
        self
    }

    fn validate(&self) -> Result<u64> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id is required".into()));
        }
        if self.delta <= 0 {
            return Err(Error::InvalidInput(format!(
                "points to award must be positive, got {}",
                self.delta
            )));
        }
        Ok(self.delta as u64)
    }
}

/// What an award did.
#[derive(Debug)]
pub struct AwardReceipt {
    pub user_id: UserId,
    pub previous_points: u64,
    pub new_points: u64,
    /// Id of the points history entry
    pub history_id: HistoryId,
    /// Outcome of the promotion check that followed the award
    pub promotion: Result<PromotionOutcome>,
}

impl AwardReceipt {
    pub fn promoted(&self) -> bool {
        matches!(&self.promotion, Ok(outcome) if outcome.is_promoted())
    }
}

/// Award points on behalf of `session`.
///
/// Invalid requests and non-admin actors are rejected before any store
/// call. The points write is a compare-and-set on the total that was read;
/// if another writer moved it in between, the read and write are retried up
/// to `config.conflict_retries` times.
pub async fn award_points<S: RecordStore + ?Sized>(
    store: &S,
    config: &LadderConfig,
    session: &Session,
    request: &AwardRequest,
) -> Result<AwardReceipt> {
    let delta = request.validate()?;
    session.require_admin("awarding points")?;
    let user_id = request.user_id.as_str();

    let mut retries = 0;
    let (previous_points, new_points) = loop {
        let user = store
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        let new_points = user.points.checked_add(delta).ok_or_else(|| {
            Error::InvalidInput(format!("awarding {} overflows {} points", delta, user.points))
        })?;

        match store
            .patch_user_guarded(
                user_id,
                &PatchGuard::points(user.points),
                &UserPatch::points(new_points),
            )
            .await
        {
            Ok(_) => break (user.points, new_points),
            Err(Error::Conflict(reason)) if retries < config.conflict_retries => {
                retries += 1;
                warn!(
                    user = user_id,
                    retries,
                    %reason,
                    "Points changed underneath award, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    };

    let entry = HistoryEntry::Points(PointsHistoryEntry {
        points: delta,
        reason: request.reason.trim().to_string(),
        added_by: session.user_id().to_string(),
        added_by_name: session.name().to_string(),
        timestamp: Utc::now(),
        is_admin_action: request.admin_action,
    });
    let history_id = store
        .append_history(HistoryCollection::Points, user_id, &entry)
        .await
        .map_err(|e| {
            error!(
                user = user_id,
                new_points,
                error = %e,
                "Points written but history append failed"
            );
            e
        })?;

    info!(
        user = user_id,
        by = session.user_id(),
        delta,
        new_points,
        "Points awarded"
    );

    let promotion = RankEvaluator::new(store, config)
        .evaluate(user_id, new_points)
        .await;
    if let Err(e) = &promotion {
        error!(user = user_id, error = %e, "Promotion check failed after award");
    }

    Ok(AwardReceipt {
        user_id: user_id.to_string(),
        previous_points,
        new_points,
        history_id,
        promotion,
    })
}
