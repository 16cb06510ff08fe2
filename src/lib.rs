//! Wallet ledger - per-wallet balance reconstruction for EVM networks.
//!
//! Raw transaction history is fetched from a block explorer and a node,
//! classified against the wallet with the help of a caching contract
//! resolver, and replayed into per-token balances that must never go
//! negative.
//!
//! Data flow:
//!
//! ```text
//! TransferFetcher -> TransactionClassifier (ContractResolver) -> LedgerReplayer -> Balances
//! ```
//!
//! Transport is supplied by the embedding application through
//! [`ChainDataProvider`] and [`ExplorerProvider`]; contract interfaces are
//! persisted through an [`AbiCacheStore`] such as [`SqliteAbiCache`].

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod model;
pub mod network;
pub mod provider;
pub mod replay;
pub mod resolver;

// Re-export commonly used types for provider implementors
pub use async_trait::async_trait;
pub use ledger_common::{Address, FunctionSelector, H256, U256};

pub use cache::{AbiCacheStore, CachedAbi, SqliteAbiCache, SqliteAbiCacheConfig};
pub use classifier::{
    CallIntent, ClassificationContext, ClassifiedTransaction, Direction, Interaction,
    TransactionClassifier,
};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use extractor::{WalletExtractor, WalletLedger};
pub use fetcher::{FetchedHistory, TransferFetcher};
pub use model::{TokenKind, Transaction, Transfer, TxHash};
pub use network::{NetworkConfig, NetworkId, NetworkRegistry};
pub use provider::{
    AbiLookup, CallOutcome, ChainDataProvider, ExplorerProvider, InternalTransferRecord,
    NftTransferRecord, Page, Revert, TokenTransferRecord,
};
pub use replay::{Balances, LedgerReplayer};
pub use resolver::{
    ContractDescriptor, ContractInterface, ContractResolver, InterfaceOrigin, ProbeOutcome,
    ProbeRule,
};
