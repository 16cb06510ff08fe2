//! Common utilities for the wallet ledger
//!
//! Provides EVM primitives (addresses, selectors, Keccak-256) and conversions
//! between on-chain integer amounts and decimal token units.

pub mod address;
pub mod selector;

use anyhow::{Context, Result};
use bigdecimal::num_bigint::{BigInt, BigUint};
use bigdecimal::BigDecimal;
use sha3::{Digest, Keccak256};

pub use address::Address;
pub use primitive_types::{H256, U256};
pub use selector::FunctionSelector;

/// Decimals of the native currency on every supported EVM network.
pub const NATIVE_DECIMALS: u32 = 18;

// ===== Hashing =====

/// Keccak-256 digest (the pre-standard SHA-3 variant used by the EVM).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

// ===== Amount conversions =====

/// Convert U256 to an unsigned big integer (limbs are little-endian u64).
pub fn u256_to_bigint(value: U256) -> BigInt {
    let digits: Vec<u32> = value
        .0
        .iter()
        .flat_map(|limb| [*limb as u32, (*limb >> 32) as u32])
        .collect();
    BigInt::from(BigUint::new(digits))
}

/// Scale a raw on-chain amount by `10^-decimals`.
///
/// The result keeps `decimals` digits of scale, so `10000` with 2 decimals
/// is `100.00`.
pub fn u256_to_decimal(value: U256, decimals: u32) -> BigDecimal {
    BigDecimal::new(u256_to_bigint(value), i64::from(decimals))
}

/// Parse a decimal string amount as reported by explorers (no sign, no
/// exponent).
pub fn parse_u256_dec(value: &str) -> Result<U256> {
    U256::from_dec_str(value.trim())
        .map_err(|e| anyhow::anyhow!("Invalid integer amount {value:?}: {e:?}"))
}

// ===== Hex conversions =====

/// Decode `0x`-prefixed (or bare) hex, e.g. call data.
pub fn parse_hex_bytes(value: &str) -> Result<Vec<u8>> {
    let digits = value.trim().trim_start_matches("0x");
    hex::decode(digits).context(format!("Invalid hex data: {value}"))
}

/// Parse a 32-byte hash (transaction hash, storage slot).
pub fn parse_h256(value: &str) -> Result<H256> {
    let bytes = parse_hex_bytes(value)?;
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32 bytes, got {}: {value}", bytes.len());
    }
    Ok(H256::from_slice(&bytes))
}

// ===== ABI decoding =====

/// Decode a single `string` return value, such as the answer to `symbol()`.
///
/// Older tokens return a right-padded `bytes32` instead; a lone 32-byte word
/// is read that way. Empty or non-UTF-8 content yields `None`.
pub fn decode_abi_string(data: &[u8]) -> Option<String> {
    let bytes = if data.len() == 32 {
        let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        &data[..end]
    } else {
        let offset = word_to_usize(data.get(..32)?)?;
        let len_end = offset.checked_add(32)?;
        let len = word_to_usize(data.get(offset..len_end)?)?;
        data.get(len_end..len_end.checked_add(len)?)?
    };

    if bytes.is_empty() {
        return None;
    }
    String::from_utf8(bytes.to_vec()).ok()
}

/// Big-endian 32-byte word as a length or offset.
fn word_to_usize(word: &[u8]) -> Option<usize> {
    let (high, low) = word.split_at(24);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    let low: [u8; 8] = low.try_into().ok()?;
    usize::try_from(u64::from_be_bytes(low)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_u256_to_decimal_scales() {
        let value = u256_to_decimal(U256::from(10_000u64), 2);
        assert_eq!(value, BigDecimal::from_str("100.00").unwrap());
        assert_eq!(value, BigDecimal::from(100));
    }

    #[test]
    fn test_u256_to_bigint_large() {
        let value = U256::from(u64::MAX) * U256::from(u64::MAX);
        let expected = BigInt::from(u64::MAX) * BigInt::from(u64::MAX);
        assert_eq!(u256_to_bigint(value), expected);
    }

    #[test]
    fn test_one_ether() {
        let wei = parse_u256_dec("1000000000000000000").unwrap();
        assert_eq!(u256_to_decimal(wei, NATIVE_DECIMALS), BigDecimal::from(1));
    }

    #[test]
    fn test_parse_h256() {
        let hash =
            parse_h256("0x00000000000000000000000000000000000000000000000000000000000000ff")
                .unwrap();
        assert_eq!(hash.as_bytes()[31], 0xff);
        assert!(parse_h256("0x00ff").is_err());
    }

    #[test]
    fn test_decode_abi_string() {
        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[63] = 4;
        data[64..68].copy_from_slice(b"USDC");
        assert_eq!(decode_abi_string(&data).as_deref(), Some("USDC"));

        let mut legacy = [0u8; 32];
        legacy[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_abi_string(&legacy).as_deref(), Some("MKR"));

        // Length pointing past the end of the data.
        data[63] = 200;
        assert_eq!(decode_abi_string(&data), None);
        assert_eq!(decode_abi_string(&[]), None);
        assert_eq!(decode_abi_string(&[0u8; 32]), None);
    }
}
