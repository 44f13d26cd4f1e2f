//! Bounded referral tree construction.
//!
//! The tree is built level by level. For each level the builder fetches the
//! referral edges of every frontier node, then the user records of every new
//! child, with at most `fetch_concurrency` reads in flight. Results are joined
//! in request order, so siblings keep the order their edges were added in.
//!
//! Edges pointing at deleted users are dropped. An id that is already in the
//! tree is never placed a second time, which keeps a corrupted store (a cycle,
//! or a user listed under two referrers) from duplicating subtrees.

use crate::config::LadderConfig;
use crate::error::Result;
use crate::models::{ReferralTree, UserId, UserRecord};
use crate::store::RecordStore;
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Builds [`ReferralTree`]s from a [`RecordStore`].
pub struct TreeBuilder<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    fetch_concurrency: usize,
}

/// Arena slot used while a tree is being assembled.
struct Slot {
    user: UserRecord,
    level: u32,
    children: Vec<usize>,
}

impl<'a, S: RecordStore + ?Sized> TreeBuilder<'a, S> {
    pub fn new(store: &'a S, config: &LadderConfig) -> Self {
        Self {
            store,
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Build the tree rooted at `root_id`, materializing levels `0..=max_depth`.
    ///
    /// Returns `Ok(None)` if the root user does not exist. Referrals below
    /// `max_depth` are silently left out.
    pub async fn build(&self, root_id: &str, max_depth: u32) -> Result<Option<ReferralTree>> {
        let Some(root) = self.store.get_user(root_id).await? else {
            debug!(root = root_id, "Tree root not found");
            return Ok(None);
        };

        let mut arena = vec![Slot {
            user: root,
            level: 0,
            children: Vec::new(),
        }];
        let mut placed: HashSet<UserId> = HashSet::from([root_id.to_string()]);
        let mut frontier = vec![0usize];

        for level in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }

            let parent_ids: Vec<UserId> = frontier
                .iter()
                .map(|&slot| arena[slot].user.id.clone())
                .collect();
            let edge_lists: Vec<_> = stream::iter(parent_ids.iter())
                .map(|id| self.store.get_direct_referrals(id))
                .buffered(self.fetch_concurrency)
                .try_collect()
                .await?;

            let mut candidates: Vec<(usize, UserId)> = Vec::new();
            for (&parent, edges) in frontier.iter().zip(edge_lists) {
                for edge in edges {
                    if !placed.insert(edge.referred_id.clone()) {
                        warn!(
                            referrer = %arena[parent].user.id,
                            referred = %edge.referred_id,
                            "Referral edge revisits a user already in the tree, skipping"
                        );
                        continue;
                    }
                    candidates.push((parent, edge.referred_id));
                }
            }

            let users: Vec<Option<UserRecord>> = stream::iter(candidates.iter())
                .map(|(_, id)| self.store.get_user(id))
                .buffered(self.fetch_concurrency)
                .try_collect()
                .await?;

            let mut next = Vec::with_capacity(users.len());
            for ((parent, id), user) in candidates.into_iter().zip(users) {
                let Some(user) = user else {
                    debug!(referred = %id, "Dropping referral edge to deleted user");
                    continue;
                };
                let slot = arena.len();
                arena.push(Slot {
                    user,
                    level,
                    children: Vec::new(),
                });
                arena[parent].children.push(slot);
                next.push(slot);
            }

            debug!(root = root_id, level, nodes = next.len(), "Tree level loaded");
            frontier = next;
        }

        Ok(assemble(arena))
    }
}

/// Turn the arena into a nested tree. Children always sit at higher indices
/// than their parent, so a reverse sweep builds every subtree before it is
/// needed.
fn assemble(arena: Vec<Slot>) -> Option<ReferralTree> {
    let mut built: Vec<Option<ReferralTree>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);
    for (slot, entry) in arena.into_iter().enumerate().rev() {
        let children = entry
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[slot] = Some(ReferralTree {
            user_id: entry.user.id.clone(),
            user: entry.user,
            level: entry.level,
            children,
        });
    }
    built.into_iter().next().flatten()
}
