//! Contract interface resolution.
//!
//! The resolver turns a contract address into the interface callers should
//! use to name its functions. It
//! 1. answers from its in-memory cache when possible,
//! 2. otherwise asks the explorer for a verified ABI, falling back to
//!    probing for a token standard when the source is unverified,
//! 3. unwraps proxies so the implementation's interface is returned,
//! 4. persists the result so a later run can rebuild the cache offline.
//!
//! # Concurrency
//!
//! Every (address, network) key owns a `OnceCell`. Concurrent callers for
//! the same key wait on the first caller's lookup instead of starting their
//! own; a failed lookup leaves the cell empty so the next caller retries.
//!
//! A proxy lookup that waits on its implementation's cell records the edge
//! in a resolver-wide wait graph. An edge that would close a loop, whether
//! within one flow or across concurrent flows, is refused and the proxy
//! keeps its shell descriptor.

mod abi;
mod descriptor;
mod probe;
mod proxy;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use ledger_common::{Address, FunctionSelector};
use tokio::sync::{Mutex, OnceCell};

pub use abi::{ContractAbi, ContractInterface, InterfaceOrigin, ERC20_ABI, ERC721_ABI};
pub use descriptor::ContractDescriptor;
pub use probe::{default_probe_rules, FungibleProbe, NonFungibleProbe, ProbeOutcome, ProbeRule};
pub use proxy::{implementation_slots, AccessorResult, IMPLEMENTATION_ACCESSOR};

use crate::cache::{AbiCacheStore, CachedAbi};
use crate::error::{LedgerError, Result};
use crate::network::NetworkId;
use crate::provider::{AbiLookup, ChainDataProvider, ExplorerProvider};

type CacheKey = (Address, NetworkId);

/// Resolves and caches contract descriptors.
///
/// Owned explicitly and shared by reference (usually behind an `Arc`) between
/// every extraction flow of a process.
pub struct ContractResolver {
    chain: Arc<dyn ChainDataProvider>,
    explorer: Arc<dyn ExplorerProvider>,
    store: Arc<dyn AbiCacheStore>,

    /// Probes for unverified contracts, tried in order.
    rules: Vec<Box<dyn ProbeRule>>,

    /// Per-key resolution slots. An initialized cell is a cache entry; an
    /// uninitialized one may have a lookup in flight.
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<ContractDescriptor>>>>,

    /// Proxy lookups in flight, each mapped to the implementation it waits on.
    waits: std::sync::Mutex<HashMap<CacheKey, CacheKey>>,
}

impl ContractResolver {
    pub fn new(
        chain: Arc<dyn ChainDataProvider>,
        explorer: Arc<dyn ExplorerProvider>,
        store: Arc<dyn AbiCacheStore>,
    ) -> Self {
        Self {
            chain,
            explorer,
            store,
            rules: default_probe_rules(),
            cache: Mutex::new(HashMap::new()),
            waits: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Replace the probe rules used for unverified contracts.
    pub fn with_rules(mut self, rules: Vec<Box<dyn ProbeRule>>) -> Self {
        for rule in &rules {
            tracing::debug!(
                target: "wallet_ledger::resolver",
                "Registered probe rule: {}",
                rule.name()
            );
        }
        self.rules = rules;
        self
    }

    /// Load every persisted descriptor into the in-memory cache.
    ///
    /// Entries that fail to decode are skipped and will be resolved again.
    pub async fn load_from_store(&self) -> Result<usize> {
        let entries = self.store.load_all().await.map_err(LedgerError::Cache)?;

        let mut cache = self.cache.lock().await;
        let mut loaded = 0;
        for entry in entries {
            let key = (entry.address, entry.network);
            match entry.into_descriptor() {
                Ok(descriptor) => {
                    cache.insert(key, Arc::new(OnceCell::new_with(Some(descriptor))));
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "wallet_ledger::resolver",
                        contract = %key.0,
                        network = %key.1,
                        error = %e,
                        "Skipping unreadable cache entry"
                    );
                }
            }
        }

        tracing::info!(
            target: "wallet_ledger::resolver",
            "Loaded {} contract descriptors from cache",
            loaded
        );

        Ok(loaded)
    }

    /// Cached descriptor, without triggering a lookup.
    pub async fn cached(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Option<ContractDescriptor> {
        let cache = self.cache.lock().await;
        cache.get(&(address, network)).and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved descriptors in memory.
    pub async fn len(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resolve the effective descriptor of `address` on `network`.
    pub async fn resolve(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<ContractDescriptor> {
        self.resolve_boxed(address, network).await
    }

    /// Name of the function behind `selector`, or the selector itself.
    /// Never fails: unverified contracts still classify under an opaque name.
    pub fn resolve_function_name(
        descriptor: &ContractDescriptor,
        selector: &FunctionSelector,
    ) -> String {
        descriptor.function_name(selector)
    }

    /// Boxed so proxy unwrapping can recurse into the implementation.
    fn resolve_boxed(
        &self,
        address: Address,
        network: NetworkId,
    ) -> BoxFuture<'_, Result<ContractDescriptor>> {
        async move {
            let cell = self.slot(address, network).await;

            if let Some(descriptor) = cell.get() {
                metrics::counter!(
                    "ledger_resolver_cache_hits_total",
                    "network" => network.code()
                )
                .increment(1);
                return Ok(descriptor.clone());
            }

            let descriptor = cell
                .get_or_try_init(|| self.lookup(address, network))
                .await?;
            Ok(descriptor.clone())
        }
        .boxed()
    }

    async fn slot(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Arc<OnceCell<ContractDescriptor>> {
        let mut cache = self.cache.lock().await;
        cache
            .entry((address, network))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Uncached resolution: fetch or guess the interface, unwrap proxies and
    /// persist the result.
    async fn lookup(&self, address: Address, network: NetworkId) -> Result<ContractDescriptor> {
        metrics::counter!("ledger_resolver_lookups_total", "network" => network.code())
            .increment(1);
        tracing::debug!(
            target: "wallet_ledger::resolver",
            contract = %address,
            network = %network,
            "Resolving contract interface"
        );

        let interface = self.fetch_interface(address, network).await?;
        let mut descriptor = ContractDescriptor::resolved(address, network, interface);

        let exposes_accessor = descriptor
            .interface
            .as_ref()
            .is_some_and(|interface| interface.abi.has_function(IMPLEMENTATION_ACCESSOR));

        if exposes_accessor {
            if let Some(effective) = self.unwrap_proxy(address, network).await? {
                descriptor = effective;
            }
        }

        self.store
            .persist(&CachedAbi::from_descriptor(&descriptor))
            .await
            .map_err(LedgerError::Cache)?;

        if let Some(interface) = &descriptor.interface {
            tracing::info!(
                target: "wallet_ledger::resolver",
                contract = %address,
                network = %network,
                origin = interface.origin.as_str(),
                implementation = ?descriptor.implementation,
                "Contract resolved"
            );
        }

        Ok(descriptor)
    }

    async fn fetch_interface(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<Option<ContractInterface>> {
        let lookup = self
            .explorer
            .contract_abi(network, address)
            .await
            .map_err(LedgerError::Provider)?;

        match lookup {
            AbiLookup::Verified(json) => match ContractAbi::parse(&json) {
                Ok(abi) => Ok(Some(ContractInterface::new(InterfaceOrigin::Verified, abi))),
                Err(e) => {
                    report(LedgerError::UnresolvableInterface {
                        address,
                        network,
                        reason: format!("verified ABI does not parse: {e:#}"),
                    });
                    Ok(None)
                }
            },
            AbiLookup::Unverified => self.guess_interface(address, network).await,
        }
    }

    /// Probe an unverified contract for a known token standard.
    async fn guess_interface(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<Option<ContractInterface>> {
        for rule in &self.rules {
            let call = self
                .chain
                .call(network, address, rule.calldata())
                .await
                .map_err(LedgerError::Provider)?;
            let outcome = ProbeOutcome::from_call(&call);
            metrics::counter!(
                "ledger_resolver_probes_total",
                "rule" => rule.name().to_string()
            )
            .increment(1);

            tracing::debug!(
                target: "wallet_ledger::resolver",
                contract = %address,
                rule = rule.name(),
                outcome = ?outcome,
                "Probe finished"
            );

            if outcome.confirms() {
                let interface = rule.interface().map_err(|e| {
                    LedgerError::InvalidInput(format!("bundled {} ABI: {e:#}", rule.name()))
                })?;
                return Ok(Some(interface));
            }
        }

        report(LedgerError::UnresolvableInterface {
            address,
            network,
            reason: "source unverified and no standard probe matched".to_string(),
        });
        Ok(None)
    }

    /// Find the implementation behind a potential proxy and resolve it.
    ///
    /// Returns `None` when the shell descriptor must be kept.
    async fn unwrap_proxy(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<Option<ContractDescriptor>> {
        let call = self
            .chain
            .call(network, address, proxy::accessor_calldata())
            .await
            .map_err(LedgerError::Provider)?;

        let implementation = match AccessorResult::from_call(&call) {
            AccessorResult::Implementation(implementation) => Some(implementation),
            AccessorResult::StorageFallback => {
                self.read_implementation_slot(address, network).await?
            }
            AccessorResult::NotProxy => None,
        };

        let Some(implementation) = implementation else {
            report(LedgerError::ProxyResolutionMiss {
                address,
                network,
                reason: "no implementation address found".to_string(),
            });
            return Ok(None);
        };

        let Some(_wait) = self.wait_on((address, network), (implementation, network)) else {
            report(LedgerError::ProxyResolutionMiss {
                address,
                network,
                reason: format!("implementation {implementation} cycles back into the proxy chain"),
            });
            return Ok(None);
        };

        tracing::debug!(
            target: "wallet_ledger::resolver",
            proxy = %address,
            implementation = %implementation,
            "Unwrapping proxy"
        );
        metrics::counter!("ledger_proxy_unwraps_total", "network" => network.code())
            .increment(1);

        let target = self.resolve_boxed(implementation, network).await?;

        Ok(Some(ContractDescriptor {
            address,
            network,
            interface: target.interface,
            implementation: Some(implementation),
            resolved: true,
        }))
    }

    /// Record that `proxy`'s lookup waits on `target`, unless following the
    /// recorded waits from `target` leads back to `proxy`.
    ///
    /// The edge is removed when the returned guard drops.
    fn wait_on(&self, proxy: CacheKey, target: CacheKey) -> Option<WaitGuard<'_>> {
        let mut waits = self.waits.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = Some(target);
        while let Some(key) = next {
            if key == proxy {
                return None;
            }
            next = waits.get(&key).copied();
        }

        waits.insert(proxy, target);
        Some(WaitGuard {
            waits: &self.waits,
            proxy,
        })
    }

    /// First non-zero standardized implementation slot, as an address.
    async fn read_implementation_slot(
        &self,
        address: Address,
        network: NetworkId,
    ) -> Result<Option<Address>> {
        for slot in implementation_slots() {
            let word = self
                .chain
                .storage_at(network, address, slot)
                .await
                .map_err(LedgerError::Provider)?;

            if !word.is_zero() {
                return Ok(Some(Address::from_word(word)));
            }
        }
        Ok(None)
    }
}

/// Edge of the wait graph, held while a proxy awaits its implementation.
struct WaitGuard<'a> {
    waits: &'a std::sync::Mutex<HashMap<CacheKey, CacheKey>>,
    proxy: CacheKey,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut waits = self.waits.lock().unwrap_or_else(PoisonError::into_inner);
        waits.remove(&self.proxy);
    }
}

/// Log a non-fatal resolution problem.
fn report(error: LedgerError) {
    debug_assert!(!error.is_fatal());
    tracing::warn!(
        target: "wallet_ledger::resolver",
        error = %error,
        "Degraded contract resolution"
    );
}
