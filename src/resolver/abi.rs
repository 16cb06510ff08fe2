//! Contract ABI parsing and selector → name lookup.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use ledger_common::FunctionSelector;
use serde::{Deserialize, Serialize};

/// Bundled interface of the fungible token standard.
pub const ERC20_ABI: &str = include_str!("../../abi/erc20.json");

/// Bundled interface of the non-fungible token standard.
pub const ERC721_ABI: &str = include_str!("../../abi/erc721.json");

#[derive(Debug, Clone, Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Vec<AbiParam>,
}

#[derive(Debug, Clone, Deserialize)]
struct AbiItem {
    #[serde(rename = "type", default = "default_item_type")]
    item_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<AbiParam>,
}

// Solidity omits `type` for functions in some legacy ABIs.
fn default_item_type() -> String {
    "function".to_string()
}

/// Canonical type as used in signatures: tuples are expanded into their
/// component list and the `uint`/`int` aliases are widened.
fn canonical_type(param: &AbiParam) -> String {
    if let Some(suffix) = param.kind.strip_prefix("tuple") {
        let inner: Vec<String> = param.components.iter().map(canonical_type).collect();
        return format!("({}){suffix}", inner.join(","));
    }

    let (base, suffix) = match param.kind.find('[') {
        Some(idx) => param.kind.split_at(idx),
        None => (param.kind.as_str(), ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        other => other,
    };
    format!("{base}{suffix}")
}

/// A parsed contract ABI.
///
/// Keeps the source JSON so the interface can be persisted and rebuilt
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAbi {
    json: String,
    functions: BTreeMap<FunctionSelector, String>,
}

impl ContractAbi {
    pub fn parse(json: &str) -> Result<Self> {
        let items: Vec<AbiItem> =
            serde_json::from_str(json).context("ABI is not a JSON array of entries")?;

        let mut functions = BTreeMap::new();
        for item in items {
            if item.item_type != "function" {
                continue;
            }
            let Some(name) = item.name else {
                continue;
            };
            let types: Vec<String> = item.inputs.iter().map(canonical_type).collect();
            let signature = format!("{name}({})", types.join(","));
            functions.insert(FunctionSelector::from_signature(&signature), name);
        }

        Ok(Self {
            json: json.to_string(),
            functions,
        })
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.values().any(|n| n == name)
    }

    pub fn function_name(&self, selector: &FunctionSelector) -> Option<&str> {
        self.functions.get(selector).map(String::as_str)
    }

    pub fn functions(&self) -> &BTreeMap<FunctionSelector, String> {
        &self.functions
    }
}

/// How an interface was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceOrigin {
    /// Published by the explorer for verified source.
    Verified,
    /// Unverified source; the non-fungible probe confirmed the standard.
    GuessedNonFungible,
    /// Unverified source; the fungible probe confirmed the standard.
    GuessedFungible,
}

impl InterfaceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceOrigin::Verified => "verified",
            InterfaceOrigin::GuessedNonFungible => "guessed_non_fungible",
            InterfaceOrigin::GuessedFungible => "guessed_fungible",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verified" => Some(InterfaceOrigin::Verified),
            "guessed_non_fungible" => Some(InterfaceOrigin::GuessedNonFungible),
            "guessed_fungible" => Some(InterfaceOrigin::GuessedFungible),
            _ => None,
        }
    }
}

/// Known callable interface of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInterface {
    pub origin: InterfaceOrigin,
    pub abi: ContractAbi,
}

impl ContractInterface {
    pub fn new(origin: InterfaceOrigin, abi: ContractAbi) -> Self {
        Self { origin, abi }
    }

    pub fn erc20() -> Result<Self> {
        Ok(Self::new(InterfaceOrigin::GuessedFungible, ContractAbi::parse(ERC20_ABI)?))
    }

    pub fn erc721() -> Result<Self> {
        Ok(Self::new(InterfaceOrigin::GuessedNonFungible, ContractAbi::parse(ERC721_ABI)?))
    }
}
