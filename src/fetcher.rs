//! Transfer history retrieval for one (address, network).

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use futures::stream::{self, StreamExt, TryStreamExt};
use ledger_common::Address;

use crate::error::{LedgerError, Result};
use crate::model::{TokenKind, Transaction, Transfer, TxHash};
use crate::network::NetworkId;
use crate::provider::{ChainDataProvider, ExplorerProvider, Page};

/// Everything known about an address on one network before classification.
#[derive(Debug, Clone, Default)]
pub struct FetchedHistory {
    /// Token, NFT and internal native transfers, all with zero fee.
    pub transfers: Vec<Transfer>,
    /// Top-level transactions, in listing order.
    pub transactions: Vec<Transaction>,
    /// Hashes already accounted for by a token, NFT or internal record.
    pub explained_hashes: HashSet<TxHash>,
}

pub struct TransferFetcher {
    chain: Arc<dyn ChainDataProvider>,
    explorer: Arc<dyn ExplorerProvider>,
    concurrency: usize,
}

impl TransferFetcher {
    pub fn new(
        chain: Arc<dyn ChainDataProvider>,
        explorer: Arc<dyn ExplorerProvider>,
        concurrency: usize,
    ) -> Self {
        Self {
            chain,
            explorer,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn fetch(
        &self,
        address: Address,
        network: NetworkId,
        native_symbol: &str,
    ) -> Result<FetchedHistory> {
        let mut history = FetchedHistory::default();

        self.fetch_token_transfers(address, network, &mut history).await?;
        self.fetch_nft_transfers(address, network, &mut history).await?;
        self.fetch_internal_transfers(address, network, native_symbol, &mut history)
            .await?;
        history.transactions = self.fetch_transactions(address, network).await?;

        tracing::info!(
            target: "wallet_ledger::fetcher",
            address = %address,
            network = %network,
            transfers = history.transfers.len(),
            transactions = history.transactions.len(),
            explained = history.explained_hashes.len(),
            "Fetched transfer history"
        );

        Ok(history)
    }

    async fn fetch_token_transfers(
        &self,
        address: Address,
        network: NetworkId,
        history: &mut FetchedHistory,
    ) -> Result<()> {
        let page = self
            .explorer
            .token_transfers(network, address)
            .await
            .map_err(LedgerError::Provider)?;
        let records = complete(page, "token transfers", address, network)?;

        for record in records {
            let value = ledger_common::u256_to_decimal(record.value, record.decimals);
            history.explained_hashes.insert(record.hash);
            history.transfers.push(Transfer::new(
                record.hash,
                network,
                record.timestamp,
                record.from,
                record.to,
                record.symbol,
                TokenKind::Fungible,
                value,
                BigDecimal::zero(),
            )?);
        }
        Ok(())
    }

    async fn fetch_nft_transfers(
        &self,
        address: Address,
        network: NetworkId,
        history: &mut FetchedHistory,
    ) -> Result<()> {
        let page = self
            .explorer
            .nft_transfers(network, address)
            .await
            .map_err(LedgerError::Provider)?;
        let records = complete(page, "nft transfers", address, network)?;

        for record in records {
            tracing::trace!(
                target: "wallet_ledger::fetcher",
                contract = %record.contract,
                token_id = %record.token_id,
                "NFT transfer"
            );
            history.explained_hashes.insert(record.hash);
            history.transfers.push(Transfer::new(
                record.hash,
                network,
                record.timestamp,
                record.from,
                record.to,
                record.symbol,
                TokenKind::NonFungible,
                BigDecimal::from(1),
                BigDecimal::zero(),
            )?);
        }
        Ok(())
    }

    async fn fetch_internal_transfers(
        &self,
        address: Address,
        network: NetworkId,
        native_symbol: &str,
        history: &mut FetchedHistory,
    ) -> Result<()> {
        let page = self
            .explorer
            .internal_transfers(network, address)
            .await
            .map_err(LedgerError::Provider)?;
        let records = complete(page, "internal transfers", address, network)?;

        for record in records {
            let value = self
                .chain
                .to_native_units(network, &ledger_common::u256_to_bigint(record.value));
            history.explained_hashes.insert(record.hash);
            history.transfers.push(Transfer::new(
                record.hash,
                network,
                record.timestamp,
                record.from,
                record.to,
                native_symbol,
                TokenKind::Native,
                value,
                BigDecimal::zero(),
            )?);
        }
        Ok(())
    }

    /// List the top-level hashes, then look each one up with at most
    /// `concurrency` requests in flight. Listing order is preserved.
    async fn fetch_transactions(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<Vec<Transaction>> {
        let page = self
            .explorer
            .transaction_hashes(network, address)
            .await
            .map_err(LedgerError::Provider)?;
        let hashes = complete(page, "transactions", address, network)?;

        let chain = &self.chain;
        stream::iter(hashes)
            .map(|hash| async move {
                chain.transaction(network, hash).await.map_err(|e| {
                    let e = e.context(format!("Failed to fetch transaction {hash:?}"));
                    LedgerError::Provider(e)
                })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

/// Unwrap a listing page, rejecting truncated ones.
fn complete<T>(
    page: Page<T>,
    listing: &'static str,
    address: Address,
    network: NetworkId,
) -> Result<Vec<T>> {
    if page.has_more {
        return Err(LedgerError::IncompleteData {
            listing,
            address,
            network,
        });
    }
    Ok(page.items)
}
