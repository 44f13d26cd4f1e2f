//! Referral tree built on demand from the record store.

use super::{Rank, UserId, UserRecord};
use serde::Serialize;

/// A node in a bounded referral tree.
///
/// `level` is 0 at the root and grows by exactly one per edge. Trees are
/// derived data: nothing persists them and nothing updates them in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferralTree {
    pub user_id: UserId,
    pub user: UserRecord,
    pub level: u32,
    /// Direct referrals, in edge insertion order
    pub children: Vec<ReferralTree>,
}

impl ReferralTree {
    /// A node with no children.
    pub fn leaf(user: UserRecord, level: u32) -> Self {
        Self {
            user_id: user.id.clone(),
            user,
            level,
            children: Vec::new(),
        }
    }

    /// Every node below this one, depth-first pre-order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Team size: all descendants, excluding this node.
    pub fn team_size(&self) -> usize {
        self.descendants().count()
    }

    /// Descendants whose rank is at least `rank`.
    pub fn count_at_or_above(&self, rank: Rank) -> usize {
        self.descendants().filter(|n| n.user.rank >= rank).count()
    }

    /// Deepest level present in the tree.
    pub fn max_level(&self) -> u32 {
        self.descendants()
            .map(|n| n.level)
            .max()
            .unwrap_or(self.level)
    }

    /// Find a node by user id.
    pub fn find(&self, user_id: &str) -> Option<&ReferralTree> {
        if self.user_id == user_id {
            return Some(self);
        }
        self.descendants().find(|n| n.user_id == user_id)
    }
}

/// Pre-order iterator over the nodes below a tree root.
pub struct Descendants<'a> {
    stack: Vec<&'a ReferralTree>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ReferralTree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
