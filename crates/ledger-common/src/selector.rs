//! 4-byte function selectors.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keccak256;

/// First four bytes of `keccak256(signature)`, used for call dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionSelector([u8; 4]);

impl FunctionSelector {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Selector of a canonical signature such as `transfer(address,uint256)`.
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        Self([hash[0], hash[1], hash[2], hash[3]])
    }

    /// Leading selector of call data; `None` for plain value transfers and
    /// any input shorter than four bytes.
    pub fn from_calldata(calldata: &[u8]) -> Option<Self> {
        match calldata {
            [a, b, c, d, ..] => Some(Self([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for FunctionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for FunctionSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("0x");
        if digits.len() != 8 {
            bail!("Invalid selector: {s}");
        }
        let decoded = hex::decode(digits).context(format!("Invalid selector hex: {s}"))?;
        Ok(Self([decoded[0], decoded[1], decoded[2], decoded[3]]))
    }
}

impl Serialize for FunctionSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FunctionSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_selectors() {
        let cases = [
            ("transfer(address,uint256)", "0xa9059cbb"),
            ("approve(address,uint256)", "0x095ea7b3"),
            ("balanceOf(address)", "0x70a08231"),
            ("totalSupply()", "0x18160ddd"),
            ("ownerOf(uint256)", "0x6352211e"),
            ("implementation()", "0x5c60da1b"),
        ];
        for (signature, expected) in cases {
            assert_eq!(FunctionSelector::from_signature(signature).to_hex(), expected);
        }
    }

    #[test]
    fn test_from_calldata() {
        let data = hex::decode("a9059cbb000000000000").unwrap();
        let selector = FunctionSelector::from_calldata(&data).unwrap();
        assert_eq!(selector.to_string(), "0xa9059cbb");
        assert!(FunctionSelector::from_calldata(&[0xa9, 0x05]).is_none());
        assert!(FunctionSelector::from_calldata(&[]).is_none());
    }

    #[test]
    fn test_parse() {
        let selector: FunctionSelector = "0x095ea7b3".parse().unwrap();
        assert_eq!(selector, FunctionSelector::from_signature("approve(address,uint256)"));
        assert!("0x095e".parse::<FunctionSelector>().is_err());
    }
}
