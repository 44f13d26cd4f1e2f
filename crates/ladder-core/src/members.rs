//! Member listing for the management view.
//!
//! The network is flattened from a referral tree, then narrowed with
//! [`MemberFilter`], ordered with [`sort_members`] and cut into pages with
//! [`paginate`]. All of it except [`network_members`] and
//! [`recent_referrals`] is pure.

use crate::config::LadderConfig;
use crate::error::{Error, Result};
use crate::models::{MemberStatus, ReferralEdge, ReferralTree, UserRecord};
use crate::store::RecordStore;
use crate::tree::TreeBuilder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// A network member together with its depth below the viewing user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkMember {
    pub user: UserRecord,
    /// 1 for direct referrals
    pub level: u32,
}

/// Every descendant of `tree`, depth-first pre-order.
pub fn flatten(tree: &ReferralTree) -> Vec<NetworkMember> {
    tree.descendants()
        .map(|node| NetworkMember {
            user: node.user.clone(),
            level: node.level - tree.level,
        })
        .collect()
}

/// The network below `root_id`, down to `config.max_depth`.
pub async fn network_members<S: RecordStore + ?Sized>(
    store: &S,
    config: &LadderConfig,
    root_id: &str,
) -> Result<Vec<NetworkMember>> {
    let tree = TreeBuilder::new(store, config)
        .build(root_id, config.max_depth)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", root_id)))?;
    Ok(flatten(&tree))
}

/// Criteria for narrowing a member list. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberFilter {
    pub level: Option<u32>,
    pub status: Option<MemberStatus>,
    /// Inclusive lower bound on the join date
    pub joined_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the join date
    pub joined_to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the name or email
    pub search: Option<String>,
}

impl MemberFilter {
    pub fn matches(&self, member: &NetworkMember) -> bool {
        let user = &member.user;
        if self.level.is_some_and(|l| l != member.level) {
            return false;
        }
        if self.status.is_some_and(|s| s != user.status) {
            return false;
        }
        if self.joined_from.is_some_and(|from| user.join_date < from) {
            return false;
        }
        if self.joined_to.is_some_and(|to| user.join_date > to) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                user.name.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }

    pub fn apply(&self, members: &[NetworkMember]) -> Vec<NetworkMember> {
        members.iter().filter(|m| self.matches(m)).cloned().collect()
    }
}

/// Column to order members by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    JoinDate,
    Name,
    Email,
    Level,
    Points,
    Referrals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// The other direction, as when a column header is clicked twice.
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

fn compare(key: SortKey, a: &NetworkMember, b: &NetworkMember) -> Ordering {
    match key {
        SortKey::JoinDate => a.user.join_date.cmp(&b.user.join_date),
        SortKey::Name => a.user.name.cmp(&b.user.name),
        SortKey::Email => a.user.email.cmp(&b.user.email),
        SortKey::Level => a.level.cmp(&b.level),
        SortKey::Points => a.user.points.cmp(&b.user.points),
        SortKey::Referrals => a.user.referrals_count.cmp(&b.user.referrals_count),
    }
}

/// Sort in place. Equal keys keep their relative order in both directions.
pub fn sort_members(members: &mut [NetworkMember], key: SortKey, direction: SortDirection) {
    members.sort_by(|a, b| match direction {
        SortDirection::Ascending => compare(key, a, b),
        SortDirection::Descending => compare(key, b, a),
    });
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Cut page `page` (1-based) of `page_size` items out of `items`.
///
/// A page past the end is empty rather than an error.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Result<Page<T>> {
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be positive".into()));
    }
    if page == 0 {
        return Err(Error::InvalidInput("pages are numbered from 1".into()));
    }
    let total_items = items.len();
    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);
    Ok(Page {
        items: items[start..end].to_vec(),
        page,
        total_pages: total_items.div_ceil(page_size),
        total_items,
    })
}

/// Headline numbers for a member list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub total_members: usize,
    pub active_members: usize,
    pub total_points: u64,
}

impl NetworkStats {
    pub fn from_members(members: &[NetworkMember]) -> Self {
        members.iter().fold(Self::default(), |mut stats, m| {
            stats.total_members += 1;
            if m.user.is_active() {
                stats.active_members += 1;
            }
            stats.total_points = stats.total_points.saturating_add(m.user.points);
            stats
        })
    }
}

/// The `limit` most recent direct referrals of `user_id`, newest first.
pub async fn recent_referrals<S: RecordStore + ?Sized>(
    store: &S,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ReferralEdge>> {
    let mut edges = store.get_direct_referrals(user_id).await?;
    edges.sort_by(|a, b| b.join_date.cmp(&a.join_date));
    edges.truncate(limit);
    Ok(edges)
}
