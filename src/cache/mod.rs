//! Persistent ABI cache.
//!
//! The resolver writes one [`CachedAbi`] per resolved (address, network) and
//! rebuilds its whole in-memory cache from [`AbiCacheStore::load_all`] on
//! startup.

mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ledger_common::Address;

pub use sqlite::{SqliteAbiCache, SqliteAbiCacheConfig};

use crate::network::NetworkId;
use crate::resolver::{ContractAbi, ContractDescriptor, ContractInterface, InterfaceOrigin};

/// Persisted form of a resolved contract descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAbi {
    pub address: Address,
    pub network: NetworkId,
    /// Interface origin and its JSON ABI; `None` when nothing is known.
    pub interface: Option<(InterfaceOrigin, String)>,
    pub implementation: Option<Address>,
}

impl CachedAbi {
    pub fn from_descriptor(descriptor: &ContractDescriptor) -> Self {
        Self {
            address: descriptor.address,
            network: descriptor.network,
            interface: descriptor
                .interface
                .as_ref()
                .map(|interface| (interface.origin, interface.abi.json().to_string())),
            implementation: descriptor.implementation,
        }
    }

    pub fn into_descriptor(self) -> Result<ContractDescriptor> {
        let interface = match self.interface {
            Some((origin, json)) => {
                let abi = ContractAbi::parse(&json).context(format!(
                    "Cached ABI for {} on {} is invalid",
                    self.address, self.network
                ))?;
                Some(ContractInterface::new(origin, abi))
            }
            None => None,
        };

        let mut descriptor = ContractDescriptor::resolved(self.address, self.network, interface);
        descriptor.implementation = self.implementation;
        Ok(descriptor)
    }
}

/// Durable storage of resolved descriptors.
#[async_trait]
pub trait AbiCacheStore: Send + Sync {
    /// Every persisted entry.
    async fn load_all(&self) -> Result<Vec<CachedAbi>>;

    /// Insert or replace the entry for `(entry.address, entry.network)`.
    async fn persist(&self, entry: &CachedAbi) -> Result<()>;
}
