//! Per-wallet extraction flow: fetch, classify, replay.

use std::sync::Arc;

use futures::future::join_all;
use ledger_common::Address;
use serde::Serialize;

use crate::cache::{SqliteAbiCache, SqliteAbiCacheConfig};
use crate::classifier::{ClassificationContext, ClassifiedTransaction, TransactionClassifier};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::fetcher::TransferFetcher;
use crate::model::Transfer;
use crate::network::{NetworkId, NetworkRegistry};
use crate::provider::{ChainDataProvider, ExplorerProvider};
use crate::replay::{Balances, LedgerReplayer};
use crate::resolver::ContractResolver;

/// Result of one extraction.
#[derive(Debug, Clone, Serialize)]
pub struct WalletLedger {
    pub address: Address,
    pub network: NetworkId,
    /// Every transfer that went into the replay, fee records included.
    pub transfers: Vec<Transfer>,
    #[serde(skip)]
    pub classified: Vec<ClassifiedTransaction>,
    pub balances: Balances,
}

pub struct WalletExtractor {
    networks: NetworkRegistry,
    resolver: Arc<ContractResolver>,
    fetcher: TransferFetcher,
    classifier: TransactionClassifier,
}

impl WalletExtractor {
    pub fn new(
        config: &LedgerConfig,
        chain: Arc<dyn ChainDataProvider>,
        explorer: Arc<dyn ExplorerProvider>,
        resolver: Arc<ContractResolver>,
    ) -> Self {
        Self {
            networks: config.networks.clone(),
            fetcher: TransferFetcher::new(chain.clone(), explorer, config.fetch_concurrency),
            classifier: TransactionClassifier::new(resolver.clone(), chain),
            resolver,
        }
    }

    /// Open the SQLite ABI cache named by `config`, warm a resolver from it
    /// and build an extractor around them.
    pub async fn open(
        config: &LedgerConfig,
        chain: Arc<dyn ChainDataProvider>,
        explorer: Arc<dyn ExplorerProvider>,
    ) -> Result<Self> {
        let store = SqliteAbiCache::new(SqliteAbiCacheConfig {
            path: config.abi_cache_path.clone(),
        })
        .await
        .map_err(LedgerError::Cache)?;

        let resolver = ContractResolver::new(chain.clone(), explorer.clone(), Arc::new(store));
        resolver.load_from_store().await?;

        Ok(Self::new(config, chain, explorer, Arc::new(resolver)))
    }

    pub fn resolver(&self) -> &Arc<ContractResolver> {
        &self.resolver
    }

    pub async fn extract(&self, address: Address, network: NetworkId) -> Result<WalletLedger> {
        let native_symbol = self.networks.get(network)?.native_symbol.as_str();

        tracing::info!(
            target: "wallet_ledger::extractor",
            address = %address,
            network = %network,
            "Starting extraction"
        );

        let history = self.fetcher.fetch(address, network, native_symbol).await?;

        let context = ClassificationContext {
            wallet: address,
            network,
            native_symbol,
            explained: &history.explained_hashes,
        };

        let mut transfers = history.transfers;
        let mut classified = Vec::with_capacity(history.transactions.len());
        for tx in &history.transactions {
            let result = self.classifier.classify(tx, &context).await?;
            transfers.extend(result.transfers.iter().cloned());
            classified.push(result);
        }

        let balances = LedgerReplayer::new(address, network, native_symbol).replay(&transfers)?;

        tracing::info!(
            target: "wallet_ledger::extractor",
            address = %address,
            network = %network,
            transactions = classified.len(),
            tokens = balances.len(),
            "Extraction finished"
        );

        Ok(WalletLedger {
            address,
            network,
            transfers,
            classified,
            balances,
        })
    }

    /// Run independent extractions concurrently. Each result stands alone:
    /// one failed flow does not affect the others.
    pub async fn extract_all(&self, targets: &[(Address, NetworkId)]) -> Vec<Result<WalletLedger>> {
        let flows = targets
            .iter()
            .map(|&(address, network)| self.extract(address, network));
        let results = join_all(flows).await;

        for (target, result) in targets.iter().zip(&results) {
            if let Err(e) = result {
                tracing::error!(
                    target: "wallet_ledger::extractor",
                    address = %target.0,
                    network = %target.1,
                    error = %e,
                    "Extraction failed"
                );
            }
        }

        results
    }
}
