//! 20-byte EVM address.
//!
//! Parsing accepts any letter case (with or without the `0x` prefix). The
//! canonical textual form, used by `Display` and serde, is the EIP-55
//! mixed-case checksum.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use primitive_types::{H160, H256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keccak256;

/// An account or contract address. Equality is byte equality, so two
/// spellings differing only in case compare equal once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(H160);

impl Address {
    pub const ZERO: Address = Address(H160([0u8; 20]));

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(H160(bytes))
    }

    /// Take the low 20 bytes of a 32-byte storage word.
    pub fn from_word(word: H256) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word.as_bytes()[12..]);
        Self::from_bytes(bytes)
    }

    /// Left-pad the address into a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(self.as_bytes());
        word
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0 .0
    }

    pub fn is_zero(&self) -> bool {
        self.0 .0 == [0u8; 20]
    }

    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }

    /// EIP-55 checksum encoding.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.as_bytes());
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            bail!("Invalid address length ({} hex digits): {s}", digits.len());
        }

        let decoded = hex::decode(digits).context(format!("Invalid address hex: {s}"))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl From<H160> for Address {
    fn from(value: H160) -> Self {
        Self(value)
    }
}

impl From<Address> for H160 {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Vectors from EIP-55.
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for expected in CHECKSUMMED {
            let addr: Address = expected.to_lowercase().parse().unwrap();
            assert_eq!(addr.to_checksum(), expected);
            assert_eq!(addr.to_string(), expected);
        }
    }

    #[test]
    fn test_case_insensitive_equality() {
        let lower: Address = CHECKSUMMED[0].to_lowercase().parse().unwrap();
        let upper: Address = CHECKSUMMED[0].to_uppercase().replacen("0X", "0x", 1).parse().unwrap();
        let mixed: Address = CHECKSUMMED[0].parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_parse_without_prefix() {
        let addr: Address = "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(addr.to_string(), CHECKSUMMED[0]);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzzzb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>().is_err());
    }

    #[test]
    fn test_word_roundtrip() {
        let addr: Address = CHECKSUMMED[1].parse().unwrap();
        let word = H256(addr.to_word());
        assert_eq!(Address::from_word(word), addr);
        assert!(Address::ZERO.is_zero());
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_serde_uses_checksum() {
        let addr: Address = CHECKSUMMED[2].to_lowercase().parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[2]));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
