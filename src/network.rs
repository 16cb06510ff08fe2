//! Supported networks and their endpoints.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Closed set of networks the ledger knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkId {
    #[serde(rename = "AVAX")]
    Avalanche,
    #[serde(rename = "ETHE")]
    Ethereum,
}

impl NetworkId {
    /// Short code used in configuration and cache keys.
    pub fn code(&self) -> &'static str {
        match self {
            NetworkId::Avalanche => "AVAX",
            NetworkId::Ethereum => "ETHE",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for NetworkId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AVAX" | "AVALANCHE" => Ok(NetworkId::Avalanche),
            "ETHE" | "ETH" | "ETHEREUM" => Ok(NetworkId::Ethereum),
            _ => Err(LedgerError::UnsupportedNetwork(s.to_string())),
        }
    }
}

/// Endpoint and currency settings for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_api_url: String,
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    pub native_symbol: String,
}

impl NetworkConfig {
    pub fn avalanche() -> Self {
        Self {
            chain_id: 43114,
            rpc_url: "https://api.avax.network/ext/bc/C/rpc".to_string(),
            explorer_api_url: "https://api.snowtrace.io/api".to_string(),
            explorer_api_key: None,
            native_symbol: "AVAX".to_string(),
        }
    }

    pub fn ethereum() -> Self {
        Self {
            chain_id: 1,
            rpc_url: "https://eth-mainnet.alchemyapi.io/v2".to_string(),
            explorer_api_url: "https://api.etherscan.io/api".to_string(),
            explorer_api_key: None,
            native_symbol: "ETH".to_string(),
        }
    }
}

/// Maps a network to its endpoints.
///
/// A network may be known to [`NetworkId`] but absent from a registry built
/// from configuration; lookups for such networks fail with
/// `UnsupportedNetwork`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkRegistry {
    networks: BTreeMap<NetworkId, NetworkConfig>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::empty()
            .with_network(NetworkId::Avalanche, NetworkConfig::avalanche())
            .with_network(NetworkId::Ethereum, NetworkConfig::ethereum())
    }
}

impl NetworkRegistry {
    pub fn empty() -> Self {
        Self {
            networks: BTreeMap::new(),
        }
    }

    pub fn with_network(mut self, id: NetworkId, config: NetworkConfig) -> Self {
        self.networks.insert(id, config);
        self
    }

    pub fn get(&self, id: NetworkId) -> Result<&NetworkConfig> {
        self.networks
            .get(&id)
            .ok_or_else(|| LedgerError::UnsupportedNetwork(id.code().to_string()))
    }

    /// Look up a network by its configuration code.
    pub fn resolve(&self, code: &str) -> Result<(NetworkId, &NetworkConfig)> {
        let id: NetworkId = code.parse()?;
        Ok((id, self.get(id)?))
    }

    pub fn ids(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.networks.keys().copied()
    }
}
