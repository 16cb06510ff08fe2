//! Ledger data model: raw transactions and normalised transfers.

use bigdecimal::{BigDecimal, Zero};
use ledger_common::{Address, U256};
use primitive_types::H256;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::network::NetworkId;

/// Transaction hash.
pub type TxHash = H256;

/// Token standard of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Native,
    Fungible,
    NonFungible,
}

/// A single value movement, always stored with a non-negative value.
///
/// The sign of a movement is only decided during replay, from the wallet's
/// position as sender or recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    hash: TxHash,
    network: NetworkId,
    timestamp: u64,
    from: Address,
    to: Address,
    symbol: String,
    kind: TokenKind,
    value: BigDecimal,
    fee: BigDecimal,
}

impl Transfer {
    pub fn new(
        hash: TxHash,
        network: NetworkId,
        timestamp: u64,
        from: Address,
        to: Address,
        symbol: impl Into<String>,
        kind: TokenKind,
        value: BigDecimal,
        fee: BigDecimal,
    ) -> Result<Self> {
        if value < BigDecimal::zero() {
            return Err(LedgerError::InvalidInput(format!(
                "negative transfer value {value} in {hash:?}"
            )));
        }
        if fee < BigDecimal::zero() {
            return Err(LedgerError::InvalidInput(format!(
                "negative fee {fee} in {hash:?}"
            )));
        }
        Ok(Self {
            hash,
            network,
            timestamp,
            from,
            to,
            symbol: symbol.into(),
            kind,
            value,
            fee,
        })
    }

    /// Zero-value record carrying only the gas paid by `from` for `hash`.
    pub fn fee_record(
        hash: TxHash,
        network: NetworkId,
        timestamp: u64,
        from: Address,
        to: Address,
        native_symbol: impl Into<String>,
        fee: BigDecimal,
    ) -> Result<Self> {
        Self::new(
            hash,
            network,
            timestamp,
            from,
            to,
            native_symbol,
            TokenKind::Native,
            BigDecimal::zero(),
            fee,
        )
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn value(&self) -> &BigDecimal {
        &self.value
    }

    pub fn fee(&self) -> &BigDecimal {
        &self.fee
    }

    pub fn is_zero_value(&self) -> bool {
        self.value.is_zero()
    }
}

/// A raw top-level transaction as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    /// Attached native value in wei.
    pub value: U256,
    pub gas_used: U256,
    pub gas_price: U256,
    pub timestamp: u64,
}

impl Transaction {
    /// Gas cost in wei, as an exact integer.
    pub fn fee_wei(&self) -> bigdecimal::num_bigint::BigInt {
        ledger_common::u256_to_bigint(self.gas_used) * ledger_common::u256_to_bigint(self.gas_price)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        ledger_common::parse_hex_bytes(&s).map_err(serde::de::Error::custom)
    }
}
