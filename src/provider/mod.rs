//! Collaborator seams: chain node access and block explorer listings.
//!
//! Implementations own transport, authentication, response parsing, and any
//! retry policy. The ledger core never retries: an `Err` from any method
//! aborts the extraction that issued it.

use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use ledger_common::{Address, U256};
use primitive_types::H256;
use serde::{Deserialize, Serialize};

use crate::model::{Transaction, TxHash};
use crate::network::NetworkId;

/// Result of a read-only call emulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Call completed; raw ABI-encoded return data (possibly empty).
    Returned(Vec<u8>),
    /// Call reverted.
    Reverted(Revert),
}

/// Revert payload of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Revert {
    /// Raw revert data (e.g. an `Error(string)` or custom error encoding).
    pub data: Vec<u8>,
    /// Decoded reason string, if the node provided one.
    pub reason: Option<String>,
}

impl Revert {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// A revert carrying neither data nor reason, which is what dispatch
    /// produces when the selector matches no function.
    pub fn is_bare(&self) -> bool {
        self.data.is_empty() && self.reason.is_none()
    }
}

/// Node access for one or more networks.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Full transaction details, including gas used from the receipt.
    async fn transaction(&self, network: NetworkId, hash: TxHash) -> Result<Transaction>;

    /// Raw 32-byte storage word of `address` at `slot`.
    async fn storage_at(&self, network: NetworkId, address: Address, slot: H256) -> Result<H256>;

    /// Emulate a call against the latest state.
    async fn call(&self, network: NetworkId, to: Address, calldata: Vec<u8>) -> Result<CallOutcome>;

    /// Convert an integer wei amount into native currency units.
    fn to_native_units(&self, _network: NetworkId, wei: &BigInt) -> BigDecimal {
        BigDecimal::new(wei.clone(), i64::from(ledger_common::NATIVE_DECIMALS))
    }
}

/// Verified interface lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiLookup {
    /// JSON ABI of a verified contract.
    Verified(String),
    /// Source not verified on the explorer.
    Unverified,
}

/// A single page of a listing. `has_more` signals truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: false,
        }
    }

    pub fn truncated(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: true,
        }
    }
}

/// Fungible token transfer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferRecord {
    pub hash: TxHash,
    pub timestamp: u64,
    pub from: Address,
    pub to: Address,
    pub contract: Address,
    pub symbol: String,
    pub decimals: u32,
    /// Raw integer amount, unscaled.
    pub value: U256,
}

/// Non-fungible token transfer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTransferRecord {
    pub hash: TxHash,
    pub timestamp: u64,
    pub from: Address,
    pub to: Address,
    pub contract: Address,
    pub symbol: String,
    pub token_id: U256,
}

/// Native currency moved by contract execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransferRecord {
    pub hash: TxHash,
    pub timestamp: u64,
    pub from: Address,
    pub to: Address,
    /// Amount in wei.
    pub value: U256,
}

/// Block explorer / indexer listings for one or more networks.
///
/// Every listing is single-page; implementations must report `has_more`
/// faithfully rather than paging internally.
#[async_trait]
pub trait ExplorerProvider: Send + Sync {
    async fn contract_abi(&self, network: NetworkId, address: Address) -> Result<AbiLookup>;

    async fn token_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<TokenTransferRecord>>;

    async fn nft_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<NftTransferRecord>>;

    async fn internal_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<InternalTransferRecord>>;

    /// Hashes of the address's top-level transactions, oldest first.
    async fn transaction_hashes(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<TxHash>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnitsOnly;

    #[async_trait]
    impl ChainDataProvider for UnitsOnly {
        async fn transaction(&self, _network: NetworkId, _hash: TxHash) -> Result<Transaction> {
            anyhow::bail!("unused")
        }

        async fn storage_at(
            &self,
            _network: NetworkId,
            _address: Address,
            _slot: H256,
        ) -> Result<H256> {
            anyhow::bail!("unused")
        }

        async fn call(
            &self,
            _network: NetworkId,
            _to: Address,
            _calldata: Vec<u8>,
        ) -> Result<CallOutcome> {
            anyhow::bail!("unused")
        }
    }

    #[test]
    fn test_default_native_units() {
        let wei = BigInt::from(1_500_000_000_000_000_000u64);
        let units = UnitsOnly.to_native_units(NetworkId::Ethereum, &wei);
        assert_eq!(units, "1.5".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn test_bare_revert() {
        assert!(Revert::default().is_bare());
        assert!(!Revert::with_reason("Ownable: caller is not the owner").is_bare());
        assert!(!Revert {
            data: vec![0x08, 0xc3, 0x79, 0xa0],
            reason: None
        }
        .is_bare());
    }
}
