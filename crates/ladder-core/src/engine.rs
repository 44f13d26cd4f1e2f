//! The engine handle: one store, one config, every operation.

use crate::admin::{self, MemberEdit};
use crate::award::{self, AwardReceipt, AwardRequest};
use crate::config::LadderConfig;
use crate::error::Result;
use crate::members::{self, NetworkMember};
use crate::models::{HistoryCollection, HistoryRecord, ReferralEdge, ReferralTree, UserRecord};
use crate::promotion::{PromotionOutcome, RankEvaluator};
use crate::registration::{self, NewMember, Registration};
use crate::session::Session;
use crate::store::RecordStore;
use crate::tree::TreeBuilder;
use std::sync::Arc;

/// Shared handle over a [`RecordStore`]. Cheap to clone.
pub struct Ladder<S: RecordStore + ?Sized> {
    store: Arc<S>,
    config: LadderConfig,
}

impl<S: RecordStore + ?Sized> Clone for Ladder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: RecordStore + ?Sized> Ladder<S> {
    /// Create an engine. Fails if `config` does not validate.
    pub fn new(store: Arc<S>, config: LadderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &LadderConfig {
        &self.config
    }

    pub async fn register(&self, member: &NewMember) -> Result<Registration> {
        registration::register(self.store.as_ref(), &self.config, member).await
    }

    pub async fn open_session(&self, user_id: &str) -> Result<Session> {
        Session::open(self.store.as_ref(), user_id).await
    }

    /// Referral tree of `root_id`, bounded by the configured depth.
    pub async fn build_tree(&self, root_id: &str) -> Result<Option<ReferralTree>> {
        TreeBuilder::new(self.store.as_ref(), &self.config)
            .build(root_id, self.config.max_depth)
            .await
    }

    pub async fn evaluate_promotion(
        &self,
        user_id: &str,
        new_points: u64,
    ) -> Result<PromotionOutcome> {
        RankEvaluator::new(self.store.as_ref(), &self.config)
            .evaluate(user_id, new_points)
            .await
    }

    pub async fn award_points(
        &self,
        session: &Session,
        request: &AwardRequest,
    ) -> Result<AwardReceipt> {
        award::award_points(self.store.as_ref(), &self.config, session, request).await
    }

    pub async fn grant_admin(&self, session: &Session, target_id: &str) -> Result<UserRecord> {
        admin::grant_admin(self.store.as_ref(), session, target_id).await
    }

    pub async fn edit_member(
        &self,
        session: &Session,
        target_id: &str,
        edit: &MemberEdit,
    ) -> Result<UserRecord> {
        admin::edit_member(self.store.as_ref(), session, target_id, edit).await
    }

    pub async fn network_members(&self, root_id: &str) -> Result<Vec<NetworkMember>> {
        members::network_members(self.store.as_ref(), &self.config, root_id).await
    }

    pub async fn recent_referrals(&self, user_id: &str, limit: usize) -> Result<Vec<ReferralEdge>> {
        members::recent_referrals(self.store.as_ref(), user_id, limit).await
    }

    pub async fn history(
        &self,
        collection: HistoryCollection,
        user_id: &str,
    ) -> Result<Vec<HistoryRecord>> {
        self.store.list_history(collection, user_id).await
    }

    /// Every user, for the admin panel.
    pub async fn all_users(&self, session: &Session) -> Result<Vec<UserRecord>> {
        session.require_admin("listing users")?;
        self.store.list_users().await
    }
}
