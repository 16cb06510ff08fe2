//! SQLite-backed ABI cache.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ledger_common::Address;
use sqlx::{any::AnyPoolOptions, Any, Pool, Row};

use super::{AbiCacheStore, CachedAbi};
use crate::network::NetworkId;
use crate::resolver::InterfaceOrigin;

/// Embedded SQL schema
const SCHEMA_SQL: &str = include_str!("../../sql/abi_cache.sql");

const TABLE: &str = "contract_abis";

/// ABI cache database configuration
#[derive(Debug, Clone)]
pub struct SqliteAbiCacheConfig {
    /// File path, `sqlite:` URL, or `:memory:`.
    pub path: String,
}

pub struct SqliteAbiCache {
    pool: Pool<Any>,
}

impl SqliteAbiCache {
    pub async fn new(config: SqliteAbiCacheConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let is_memory = config.path == ":memory:" || config.path == "sqlite::memory:";
        let is_url = config.path.starts_with("sqlite:");

        // Ensure parent directory exists for file databases.
        if !is_memory && !is_url {
            if let Some(parent) = Path::new(&config.path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let database_url = if is_memory {
            "sqlite::memory:".to_string()
        } else if is_url {
            config.path.clone()
        } else {
            format!("sqlite://{}?mode=rwc", config.path)
        };

        tracing::debug!(
            target: "wallet_ledger::cache",
            "Connecting to ABI cache: {}",
            database_url
        );

        // Every connection to `sqlite::memory:` opens a separate database.
        let max_connections = if is_memory { 1 } else { 4 };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(&database_url)
            .await
            .context("Failed to connect to ABI cache database")?;

        let cache = Self { pool };
        cache.init_schema(is_memory).await?;

        Ok(cache)
    }

    async fn init_schema(&self, is_memory: bool) -> Result<()> {
        if !is_memory {
            sqlx::query("PRAGMA journal_mode=WAL").execute(&self.pool).await?;
            sqlx::query("PRAGMA synchronous=NORMAL").execute(&self.pool).await?;
        }

        for statement in SCHEMA_SQL.split(';') {
            let clean_sql: Vec<&str> = statement
                .lines()
                .filter(|line| {
                    let trimmed = line.trim();
                    !trimmed.is_empty() && !trimmed.starts_with("--")
                })
                .collect();

            if clean_sql.is_empty() {
                continue;
            }

            let clean_sql = clean_sql.join("\n");
            sqlx::query(&clean_sql)
                .execute(&self.pool)
                .await
                .context(format!(
                    "Failed to execute SQL: {}",
                    clean_sql.lines().next().unwrap_or("")
                ))?;
        }

        tracing::info!(target: "wallet_ledger::cache", "ABI cache schema initialized");
        Ok(())
    }

    /// Number of persisted entries.
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl AbiCacheStore for SqliteAbiCache {
    async fn load_all(&self) -> Result<Vec<CachedAbi>> {
        let rows = sqlx::query(&format!(
            "SELECT contract_address, network, origin, abi, implementation FROM {TABLE}"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let address_hex: String = row.try_get(0)?;
            let network_code: String = row.try_get(1)?;
            let origin: Option<String> = row.try_get(2)?;
            let abi: Option<String> = row.try_get(3)?;
            let implementation: Option<String> = row.try_get(4)?;

            let address: Address = address_hex.parse()?;
            let network: NetworkId = network_code
                .parse()
                .context(format!("Unknown network in ABI cache: {network_code}"))?;

            let interface = match (origin, abi) {
                (Some(origin), Some(abi)) => {
                    let origin = InterfaceOrigin::parse(&origin)
                        .with_context(|| format!("Unknown interface origin: {origin}"))?;
                    Some((origin, abi))
                }
                _ => None,
            };

            let implementation = implementation.map(|addr| addr.parse::<Address>()).transpose()?;

            entries.push(CachedAbi {
                address,
                network,
                interface,
                implementation,
            });
        }

        tracing::debug!(
            target: "wallet_ledger::cache",
            count = entries.len(),
            "Loaded cached contract interfaces"
        );

        Ok(entries)
    }

    async fn persist(&self, entry: &CachedAbi) -> Result<()> {
        let (origin, abi) = match &entry.interface {
            Some((origin, abi)) => (Some(origin.as_str().to_string()), Some(abi.clone())),
            None => (None, None),
        };

        let sql = format!(
            "INSERT INTO {TABLE} (contract_address, network, origin, abi, implementation, resolved_at) \
             VALUES (?, ?, ?, ?, ?, strftime('%s', 'now')) \
             ON CONFLICT(contract_address, network) \
             DO UPDATE SET origin = excluded.origin, abi = excluded.abi, \
             implementation = excluded.implementation, resolved_at = strftime('%s', 'now')"
        );

        sqlx::query(&sql)
            .bind(entry.address.to_lower_hex())
            .bind(entry.network.code())
            .bind(origin)
            .bind(abi)
            .bind(entry.implementation.map(|addr| addr.to_lower_hex()))
            .execute(&self.pool)
            .await
            .context(format!("Failed to persist ABI for {} on {}", entry.address, entry.network))?;

        Ok(())
    }
}
