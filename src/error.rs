//! Error taxonomy for ledger extraction.
//!
//! Fatal kinds abort the current extraction or replay. Non-fatal kinds
//! (`UnresolvableInterface`, `ProxyResolutionMiss`) are never returned from a
//! public operation; they are built only to be logged so operators can see
//! where classification degraded.

use bigdecimal::BigDecimal;
use ledger_common::Address;
use thiserror::Error;

use crate::model::TxHash;
use crate::network::NetworkId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Incomplete data: {listing} for {address} on {network} has more results than one page")]
    IncompleteData {
        listing: &'static str,
        address: Address,
        network: NetworkId,
    },

    #[error("Unexpected topology in transaction {hash:?}: {reason}")]
    UnexpectedTopology { hash: TxHash, reason: String },

    #[error("Negative balance: {token} is {balance} after transaction {hash:?}")]
    NegativeBalance {
        token: String,
        hash: TxHash,
        balance: BigDecimal,
    },

    #[error("Unresolvable interface for {address} on {network}: {reason}")]
    UnresolvableInterface {
        address: Address,
        network: NetworkId,
        reason: String,
    },

    #[error("Proxy resolution miss for {address} on {network}: {reason}")]
    ProxyResolutionMiss {
        address: Address,
        network: NetworkId,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0:#}")]
    Provider(#[source] anyhow::Error),

    #[error("ABI cache error: {0:#}")]
    Cache(#[source] anyhow::Error),
}

impl LedgerError {
    /// Whether this error must abort the current extraction.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LedgerError::UnresolvableInterface { .. } | LedgerError::ProxyResolutionMiss { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
