//! Ledger configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! none at all) is valid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::network::NetworkRegistry;

/// Default location of the ABI cache database.
pub const DEFAULT_ABI_CACHE_PATH: &str = "./abi_cache/abi_cache.db";

/// Default number of transaction lookups in flight per extraction.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite path (or `sqlite:` URL, or `:memory:`) of the ABI cache.
    pub abi_cache_path: String,

    /// Maximum concurrent transaction lookups while hydrating the
    /// transaction list.
    pub fetch_concurrency: usize,

    pub networks: NetworkRegistry,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            abi_cache_path: DEFAULT_ABI_CACHE_PATH.to_string(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            networks: NetworkRegistry::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse ledger config")?;
        if config.fetch_concurrency == 0 {
            anyhow::bail!("fetch_concurrency must be at least 1");
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn abi_cache_path(&self) -> PathBuf {
        PathBuf::from(&self.abi_cache_path)
    }
}
