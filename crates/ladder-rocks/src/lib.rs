//! RocksDB record store for Ladder.
//!
//! ```no_run
//! use ladder_core::{Ladder, LadderConfig};
//! use ladder_rocks::{RocksConfig, RocksStore};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RocksStore::open_with(&RocksConfig::from_env())?;
//! let ladder = Ladder::new(Arc::new(store), LadderConfig::default())?;
//! # let _ = ladder;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::RocksStore;

use std::path::PathBuf;

/// Where the store keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocksConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RocksConfig {
    /// Read `LADDER_DATA_DIR`, defaulting to `./ladder-data`.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("LADDER_DATA_DIR").unwrap_or_else(|_| "./ladder-data".to_string()),
        );
        Self { data_dir }
    }
}
