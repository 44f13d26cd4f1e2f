//! Ladder policy and tuning configuration.
//!
//! Every call site that needs the depth bound or a promotion constant reads
//! it from [`LadderConfig`]; nothing else hardcodes them.

use crate::error::{Error, Result};

/// Default depth bound for team traversal.
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Points needed to leave rank 0.
pub const DEFAULT_ENTRY_POINTS: u64 = 100;

/// Qualifying team members needed for every tier from 1->2 to 4->5.
pub const DEFAULT_TEAM_QUORUM: usize = 3;

/// Configuration for the referral engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderConfig {
    /// Deepest tree level materialized (root is level 0)
    pub max_depth: u32,

    /// Points at which a rank 0 user is promoted
    pub entry_points: u64,

    /// Team members at or above the current rank required to promote
    pub team_quorum: usize,

    /// Maximum in-flight store reads while building a tree
    pub fetch_concurrency: usize,

    /// Retries of a guarded points write after a conflict
    pub conflict_retries: u32,

    /// Attempts at generating an unused referral code
    pub code_attempts: u32,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            entry_points: DEFAULT_ENTRY_POINTS,
            team_quorum: DEFAULT_TEAM_QUORUM,
            fetch_concurrency: 8,
            conflict_retries: 3,
            code_attempts: 10,
        }
    }
}

impl LadderConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_depth: env_or("LADDER_MAX_DEPTH", defaults.max_depth)?,
            entry_points: env_or("LADDER_ENTRY_POINTS", defaults.entry_points)?,
            team_quorum: env_or("LADDER_TEAM_QUORUM", defaults.team_quorum)?,
            fetch_concurrency: env_or("LADDER_FETCH_CONCURRENCY", defaults.fetch_concurrency)?,
            conflict_retries: env_or("LADDER_CONFLICT_RETRIES", defaults.conflict_retries)?,
            code_attempts: env_or("LADDER_CODE_ATTEMPTS", defaults.code_attempts)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the depth bound.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Builder-style override of the fetch fan-out.
    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::InvalidInput("max_depth must be at least 1".into()));
        }
        if self.team_quorum == 0 {
            return Err(Error::InvalidInput("team_quorum must be at least 1".into()));
        }
        if self.fetch_concurrency == 0 {
            return Err(Error::InvalidInput(
                "fetch_concurrency must be at least 1".into(),
            ));
        }
        if self.code_attempts == 0 {
            return Err(Error::InvalidInput("code_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::InvalidInput(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ladder_policy() {
        let config = LadderConfig::default();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.entry_points, 100);
        assert_eq!(config.team_quorum, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_depth_rejected() {
        let config = LadderConfig::default().with_max_depth(0);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = LadderConfig::default().with_fetch_concurrency(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_or_parses_and_reports() {
        std::env::set_var("LADDER_TEST_ENV_OR_OK", " 7 ");
        std::env::set_var("LADDER_TEST_ENV_OR_BAD", "seven");
        assert_eq!(env_or("LADDER_TEST_ENV_OR_OK", 1u32).unwrap(), 7);
        assert_eq!(env_or("LADDER_TEST_ENV_OR_MISSING", 4u32).unwrap(), 4);
        let err = env_or("LADDER_TEST_ENV_OR_BAD", 1u32).unwrap_err();
        assert!(err.to_string().contains("LADDER_TEST_ENV_OR_BAD"));
    }
}
