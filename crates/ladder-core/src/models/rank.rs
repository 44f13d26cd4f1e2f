//! Rank ladder.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position on the fixed rank ladder, 0 (Beginner) through 5 (General Manager).
///
/// Ranks only move upward. The wire form is the bare integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    /// Entry rank for every new account.
    pub const BEGINNER: Rank = Rank(0);

    /// Terminal rank; no promotion past it.
    pub const TOP: Rank = Rank(5);

    /// Titles indexed by rank value.
    const TITLES: [&'static str; 6] = [
        "Beginner",
        "Member",
        "Leader",
        "Deputy Manager",
        "Manager",
        "General Manager",
    ];

    /// Construct a rank, rejecting values above [`Rank::TOP`].
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::TOP.0 {
            return Err(Error::InvalidInput(format!(
                "rank {} is above the top rank {}",
                value,
                Self::TOP.0
            )));
        }
        Ok(Self(value))
    }

    /// Numeric value.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Display title.
    pub fn title(self) -> &'static str {
        Self::TITLES[self.0 as usize]
    }

    pub fn is_top(self) -> bool {
        self == Self::TOP
    }

    /// The rank one step up, or `None` at the top.
    pub fn next(self) -> Option<Rank> {
        if self.is_top() {
            None
        } else {
            Some(Rank(self.0 + 1))
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Rank::new(value)
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.title())
    }
}
