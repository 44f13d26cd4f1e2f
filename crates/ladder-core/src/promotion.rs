//! Rank promotion.
//!
//! | current rank | condition                                                   | next |
//! |--------------|-------------------------------------------------------------|------|
//! | 0            | points >= `entry_points`                                    | 1    |
//! | 1..=4        | team members with rank >= current rank >= `team_quorum`     | +1   |
//! | 5            | none                                                        | 5    |
//!
//! The team is every node of the user's referral tree within `max_depth`,
//! excluding the user. A single evaluation moves at most one step.

use crate::config::LadderConfig;
use crate::error::{Error, Result};
use crate::models::{
    HistoryCollection, HistoryEntry, PatchGuard, PromotionHistoryEntry, Rank, ReferralTree,
    UserPatch,
};
use crate::store::RecordStore;
use crate::tree::TreeBuilder;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Result of a promotion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    NoChange,
    Promoted { from: Rank, to: Rank },
}

impl PromotionOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, PromotionOutcome::Promoted { .. })
    }
}

/// The promotion policy, free of any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionRule {
    pub entry_points: u64,
    pub team_quorum: usize,
}

impl PromotionRule {
    pub fn from_config(config: &LadderConfig) -> Self {
        Self {
            entry_points: config.entry_points,
            team_quorum: config.team_quorum,
        }
    }

    /// Whether deciding for `current` requires the team tree.
    pub fn needs_team(&self, current: Rank) -> bool {
        current > Rank::BEGINNER && !current.is_top()
    }

    /// The rank `current` should move to, if any.
    ///
    /// `team` is consulted only for ranks 1 through 4; passing `None` there
    /// means no team is known and nobody qualifies.
    pub fn next_rank(
        &self,
        current: Rank,
        points: u64,
        team: Option<&ReferralTree>,
    ) -> Option<Rank> {
        if current == Rank::BEGINNER {
            return (points >= self.entry_points)
                .then(|| current.next())
                .flatten();
        }
        if !self.needs_team(current) {
            return None;
        }
        let qualifying = team.map_or(0, |t| t.count_at_or_above(current));
        if qualifying >= self.team_quorum {
            current.next()
        } else {
            None
        }
    }
}

/// Evaluates and applies promotions against a [`RecordStore`].
pub struct RankEvaluator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    config: &'a LadderConfig,
    rule: PromotionRule,
}

impl<'a, S: RecordStore + ?Sized> RankEvaluator<'a, S> {
    pub fn new(store: &'a S, config: &'a LadderConfig) -> Self {
        Self {
            store,
            config,
            rule: PromotionRule::from_config(config),
        }
    }

    /// Check `user_id` against the ladder given its post-award point total.
    ///
    /// On promotion writes the new rank (guarded on the rank read here, so a
    /// concurrent evaluation cannot promote twice from the same rank) and
    /// appends one promotion history entry. Writes nothing otherwise. If the
    /// history append fails the rank is put back before the error is returned.
    pub async fn evaluate(&self, user_id: &str, new_points: u64) -> Result<PromotionOutcome> {
        if user_id.is_empty() {
            return Err(Error::InvalidInput("user id is required".into()));
        }
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        let current = user.rank;

        let team = if self.rule.needs_team(current) {
            let tree = TreeBuilder::new(self.store, self.config)
                .build(user_id, self.config.max_depth)
                .await?;
            if tree.is_none() {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
            tree
        } else {
            None
        };

        let Some(next) = self.rule.next_rank(current, new_points, team.as_ref()) else {
            debug!(
                user = user_id,
                rank = current.value(),
                points = new_points,
                team = team.as_ref().map_or(0, |t| t.team_size()),
                "No promotion"
            );
            return Ok(PromotionOutcome::NoChange);
        };

        self.store
            .patch_user_guarded(user_id, &PatchGuard::rank(current), &UserPatch::rank(next))
            .await?;
        let entry = HistoryEntry::Promotion(PromotionHistoryEntry {
            from_rank: current,
            to_rank: next,
            timestamp: Utc::now(),
        });
        if let Err(e) = self
            .store
            .append_history(HistoryCollection::Promotion, user_id, &entry)
            .await
        {
            self.revert_rank(user_id, next, current).await;
            return Err(e);
        }

        info!(user = user_id, from = %current, to = %next, "User promoted");
        Ok(PromotionOutcome::Promoted {
            from: current,
            to: next,
        })
    }

    /// Undo a rank write whose history entry could not be recorded. Guarded
    /// on `raised` so a later promotion is never clobbered.
    async fn revert_rank(&self, user_id: &str, raised: Rank, previous: Rank) {
        match self
            .store
            .patch_user_guarded(user_id, &PatchGuard::rank(raised), &UserPatch::rank(previous))
            .await
        {
            Ok(_) => warn!(
                user = user_id,
                from = %previous,
                to = %raised,
                "Promotion history append failed, rank reverted"
            ),
            Err(e) => error!(
                user = user_id,
                from = %previous,
                to = %raised,
                error = %e,
                "Promotion history append failed and rank could not be reverted"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use crate::store::MemoryStore;

    fn rank(value: u8) -> Rank {
        Rank::new(value).unwrap()
    }

    fn user(id: &str, r: u8) -> UserRecord {
        let mut u = UserRecord::new(
            id.to_string(),
            id.to_string(),
            format!("{}@example.com", id),
            format!("R{:0>7}", id),
        );
        u.rank = rank(r);
        u
    }

    /// Root `lead` at `lead_rank` with one direct referral per entry of
    /// `team_ranks`.
    async fn team(lead_rank: u8, team_ranks: &[u8]) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(user("lead", lead_rank), None).await;
        for (i, r) in team_ranks.iter().enumerate() {
            store.seed(user(&format!("m{}", i), *r), Some("lead")).await;
        }
        store
    }

    async fn promotions(store: &MemoryStore, id: &str) -> usize {
        store
            .list_history(HistoryCollection::Promotion, id)
            .await
            .unwrap()
            .len()
    }

    #[test]
    fn rule_entry_threshold() {
        let rule = PromotionRule::from_config(&LadderConfig::default());
        assert_eq!(rule.next_rank(Rank::BEGINNER, 99, None), None);
        assert_eq!(rule.next_rank(Rank::BEGINNER, 100, None), Some(rank(1)));
        assert!(!rule.needs_team(Rank::BEGINNER));
        assert!(rule.needs_team(rank(1)));
        assert!(!rule.needs_team(Rank::TOP));
    }

    #[test]
    fn rule_top_is_terminal() {
        let rule = PromotionRule::from_config(&LadderConfig::default());
        assert_eq!(rule.next_rank(Rank::TOP, u64::MAX, None), None);
    }

    #[tokio::test]
    async fn beginner_below_entry_points() {
        let store = team(0, &[]).await;
        let config = LadderConfig::default();
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 99).await.unwrap();
        assert_eq!(outcome, PromotionOutcome::NoChange);
        assert_eq!(promotions(&store, "lead").await, 0);
    }

    #[tokio::test]
    async fn beginner_at_entry_points() {
        let store = team(0, &[]).await;
        let config = LadderConfig::default();
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 100).await.unwrap();
        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                from: rank(0),
                to: rank(1)
            }
        );
        assert_eq!(store.get_user("lead").await.unwrap().unwrap().rank, rank(1));
        assert_eq!(promotions(&store, "lead").await, 1);
    }

    #[tokio::test]
    async fn rank_two_needs_three_qualifying_members() {
        let config = LadderConfig::default();

        let store = team(2, &[2, 3, 1]).await;
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 0).await.unwrap();
        assert_eq!(outcome, PromotionOutcome::NoChange);
        assert_eq!(store.get_user("lead").await.unwrap().unwrap().rank, rank(2));

        let store = team(2, &[2, 3, 1, 2]).await;
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 0).await.unwrap();
        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                from: rank(2),
                to: rank(3)
            }
        );
    }

    #[tokio::test]
    async fn deep_members_count_toward_team() {
        let store = MemoryStore::new();
        store.seed(user("lead", 1), None).await;
        store.seed(user("a", 1), Some("lead")).await;
        store.seed(user("b", 1), Some("a")).await;
        store.seed(user("c", 1), Some("b")).await;
        let config = LadderConfig::default();
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 0).await.unwrap();
        assert!(outcome.is_promoted());
    }

    #[tokio::test]
    async fn members_beyond_depth_bound_do_not_count() {
        let store = MemoryStore::new();
        store.seed(user("lead", 1), None).await;
        store.seed(user("a", 0), Some("lead")).await;
        store.seed(user("b", 0), Some("a")).await;
        store.seed(user("c", 1), Some("b")).await;
        store.seed(user("d", 1), Some("c")).await;
        store.seed(user("e", 1), Some("d")).await;
        let config = LadderConfig::default().with_max_depth(4);
        let outcome = RankEvaluator::new(&store, &config).evaluate("lead", 0).await.unwrap();
        assert_eq!(outcome, PromotionOutcome::NoChange);
    }

    #[tokio::test]
    async fn top_rank_never_changes() {
        let store = team(5, &[5, 5, 5, 5]).await;
        let config = LadderConfig::default();
        let outcome = RankEvaluator::new(&store, &config)
            .evaluate("lead", 1_000_000)
            .await
            .unwrap();
        assert_eq!(outcome, PromotionOutcome::NoChange);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn one_step_per_evaluation() {
        // Plenty of points and a strong team, but rank 0 only moves to 1
        let store = team(0, &[4, 4, 4, 4]).await;
        let config = LadderConfig::default();
        let evaluator = RankEvaluator::new(&store, &config);
        let outcome = evaluator.evaluate("lead", 10_000).await.unwrap();
        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                from: rank(0),
                to: rank(1)
            }
        );
        let outcome = evaluator.evaluate("lead", 10_000).await.unwrap();
        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                from: rank(1),
                to: rank(2)
            }
        );
    }

    #[tokio::test]
    async fn missing_user_is_an_error() {
        let store = MemoryStore::new();
        let config = LadderConfig::default();
        let err = RankEvaluator::new(&store, &config)
            .evaluate("ghost", 500)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unavailable_store_propagates() {
        let store = team(1, &[1, 1, 1]).await;
        store.set_fail_reads(true);
        let config = LadderConfig::default();
        let err = RankEvaluator::new(&store, &config)
            .evaluate("lead", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn lost_race_writes_no_history() {
        let store = team(0, &[]).await;
        store.force_conflicts(1);
        let config = LadderConfig::default();
        let err = RankEvaluator::new(&store, &config)
            .evaluate("lead", 150)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(promotions(&store, "lead").await, 0);
    }

    #[tokio::test]
    async fn failed_history_append_reverts_rank() {
        let store = team(0, &[]).await;
        store.set_fail_history(Some(HistoryCollection::Promotion)).await;
        let config = LadderConfig::default();
        let err = RankEvaluator::new(&store, &config)
            .evaluate("lead", 150)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(store.get_user("lead").await.unwrap().unwrap().rank, Rank::BEGINNER);
        assert_eq!(promotions(&store, "lead").await, 0);

        // Once history is writable again the same evaluation goes through
        store.set_fail_history(None).await;
        let outcome = RankEvaluator::new(&store, &config)
            .evaluate("lead", 150)
            .await
            .unwrap();
        assert!(outcome.is_promoted());
        assert_eq!(promotions(&store, "lead").await, 1);
    }
}
