use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ledger_common::{Address, FunctionSelector};
use primitive_types::H256;
use wallet_ledger::{
    AbiCacheStore, AbiLookup, CachedAbi, CallOutcome, ChainDataProvider, ExplorerProvider,
    InternalTransferRecord, NetworkId, NftTransferRecord, Page, Revert, TokenTransferRecord,
    Transaction, TxHash,
};

/// Node stub. Unknown calls revert bare (no such function), unknown storage
/// reads return zero and unknown transactions are errors.
#[derive(Default)]
pub struct MockChain {
    transactions: HashMap<(NetworkId, TxHash), Transaction>,
    storage: HashMap<(Address, H256), H256>,
    calls: HashMap<(Address, FunctionSelector), CallOutcome>,
    failing_calls: Vec<Address>,
    call_count: AtomicUsize,
    storage_reads: AtomicUsize,
    transaction_count: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, network: NetworkId, tx: Transaction) -> Self {
        self.transactions.insert((network, tx.hash), tx);
        self
    }

    pub fn with_storage(mut self, address: Address, slot: H256, value: H256) -> Self {
        self.storage.insert((address, slot), value);
        self
    }

    /// Answer calls to `signature` on `address` with `outcome`.
    pub fn with_call(mut self, address: Address, signature: &str, outcome: CallOutcome) -> Self {
        self.calls
            .insert((address, FunctionSelector::from_signature(signature)), outcome);
        self
    }

    /// Every call to `address` fails at the transport level.
    pub fn with_failing_calls(mut self, address: Address) -> Self {
        self.failing_calls.push(address);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn storage_reads(&self) -> usize {
        self.storage_reads.load(Ordering::SeqCst)
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainDataProvider for MockChain {
    async fn transaction(&self, network: NetworkId, hash: TxHash) -> Result<Transaction> {
        self.transaction_count.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .get(&(network, hash))
            .cloned()
            .ok_or_else(|| anyhow!("unknown transaction {hash:?} on {network}"))
    }

    async fn storage_at(&self, _network: NetworkId, address: Address, slot: H256) -> Result<H256> {
        self.storage_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.storage.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn call(
        &self,
        _network: NetworkId,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<CallOutcome> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&to) {
            return Err(anyhow!("connection reset calling {to}"));
        }
        let Some(selector) = FunctionSelector::from_calldata(&calldata) else {
            return Ok(CallOutcome::Reverted(Revert::default()));
        };
        Ok(self
            .calls
            .get(&(to, selector))
            .cloned()
            .unwrap_or_else(|| CallOutcome::Reverted(Revert::default())))
    }
}

/// Explorer stub. Unknown contracts are unverified and unknown listings are
/// empty and complete.
#[derive(Default)]
pub struct MockExplorer {
    abis: HashMap<(NetworkId, Address), AbiLookup>,
    token_transfers: HashMap<(NetworkId, Address), Page<TokenTransferRecord>>,
    nft_transfers: HashMap<(NetworkId, Address), Page<NftTransferRecord>>,
    internal_transfers: HashMap<(NetworkId, Address), Page<InternalTransferRecord>>,
    transaction_hashes: HashMap<(NetworkId, Address), Page<TxHash>>,
    abi_latency: Option<Duration>,
    abi_lookups: Mutex<HashMap<Address, usize>>,
}

impl MockExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verified_abi(
        mut self,
        network: NetworkId,
        address: Address,
        json: impl Into<String>,
    ) -> Self {
        self.abis.insert((network, address), AbiLookup::Verified(json.into()));
        self
    }

    pub fn with_token_transfers(
        mut self,
        network: NetworkId,
        address: Address,
        page: Page<TokenTransferRecord>,
    ) -> Self {
        self.token_transfers.insert((network, address), page);
        self
    }

    pub fn with_nft_transfers(
        mut self,
        network: NetworkId,
        address: Address,
        page: Page<NftTransferRecord>,
    ) -> Self {
        self.nft_transfers.insert((network, address), page);
        self
    }

    pub fn with_internal_transfers(
        mut self,
        network: NetworkId,
        address: Address,
        page: Page<InternalTransferRecord>,
    ) -> Self {
        self.internal_transfers.insert((network, address), page);
        self
    }

    pub fn with_transaction_hashes(
        mut self,
        network: NetworkId,
        address: Address,
        page: Page<TxHash>,
    ) -> Self {
        self.transaction_hashes.insert((network, address), page);
        self
    }

    /// Delay every ABI lookup, so concurrent resolutions overlap.
    pub fn with_abi_latency(mut self, latency: Duration) -> Self {
        self.abi_latency = Some(latency);
        self
    }

    /// ABI lookups issued for `address`.
    pub fn abi_lookups(&self, address: Address) -> usize {
        self.abi_lookups
            .lock()
            .map(|lookups| lookups.get(&address).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_abi_lookups(&self) -> usize {
        self.abi_lookups
            .lock()
            .map(|lookups| lookups.values().sum())
            .unwrap_or(0)
    }
}

fn listing<T: Clone>(
    pages: &HashMap<(NetworkId, Address), Page<T>>,
    key: (NetworkId, Address),
) -> Page<T> {
    pages.get(&key).cloned().unwrap_or_else(|| Page::complete(Vec::new()))
}

#[async_trait]
impl ExplorerProvider for MockExplorer {
    async fn contract_abi(&self, network: NetworkId, address: Address) -> Result<AbiLookup> {
        if let Ok(mut lookups) = self.abi_lookups.lock() {
            *lookups.entry(address).or_default() += 1;
        }
        if let Some(latency) = self.abi_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .abis
            .get(&(network, address))
            .cloned()
            .unwrap_or(AbiLookup::Unverified))
    }

    async fn token_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<TokenTransferRecord>> {
        Ok(listing(&self.token_transfers, (network, address)))
    }

    async fn nft_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<NftTransferRecord>> {
        Ok(listing(&self.nft_transfers, (network, address)))
    }

    async fn internal_transfers(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<InternalTransferRecord>> {
        Ok(listing(&self.internal_transfers, (network, address)))
    }

    async fn transaction_hashes(
        &self,
        network: NetworkId,
        address: Address,
    ) -> Result<Page<TxHash>> {
        Ok(listing(&self.transaction_hashes, (network, address)))
    }
}

/// In-memory `AbiCacheStore` that counts writes.
#[derive(Default)]
pub struct MemoryAbiCache {
    entries: Mutex<HashMap<(Address, NetworkId), CachedAbi>>,
    persist_count: AtomicUsize,
}

impl MemoryAbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, as left behind by an earlier run.
    pub fn with_entries(entries: impl IntoIterator<Item = CachedAbi>) -> Self {
        let cache = Self::default();
        if let Ok(mut map) = cache.entries.lock() {
            for entry in entries {
                map.insert((entry.address, entry.network), entry);
            }
        }
        cache
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }

    pub fn get(&self, address: Address, network: NetworkId) -> Option<CachedAbi> {
        self.entries
            .lock()
            .ok()
            .and_then(|map| map.get(&(address, network)).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AbiCacheStore for MemoryAbiCache {
    async fn load_all(&self) -> Result<Vec<CachedAbi>> {
        let map = self.entries.lock().map_err(|_| anyhow!("abi cache lock poisoned"))?;
        Ok(map.values().cloned().collect())
    }

    async fn persist(&self, entry: &CachedAbi) -> Result<()> {
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        let mut map = self.entries.lock().map_err(|_| anyhow!("abi cache lock poisoned"))?;
        map.insert((entry.address, entry.network), entry.clone());
        Ok(())
    }
}
