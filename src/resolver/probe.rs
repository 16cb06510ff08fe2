//! Interface guessing for unverified contracts.
//!
//! Each [`ProbeRule`] names one function that only exists on a given token
//! standard. The resolver calls it and turns the raw [`CallOutcome`] into a
//! [`ProbeOutcome`]; rules are tried in order and the first one whose probe
//! confirms the function supplies the bundled interface.

use anyhow::Result;
use ledger_common::FunctionSelector;

use super::abi::ContractInterface;
use crate::provider::CallOutcome;

/// What a probe call tells us about a function's existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The call returned data.
    Present,
    /// Dispatch found no such function (empty return or bare revert).
    Absent,
    /// The function ran and reverted on its own logic (authorization,
    /// missing token id, ...), which still proves it exists.
    InconclusiveRevert,
}

impl ProbeOutcome {
    pub fn from_call(outcome: &CallOutcome) -> Self {
        match outcome {
            CallOutcome::Returned(data) if data.is_empty() => ProbeOutcome::Absent,
            CallOutcome::Returned(_) => ProbeOutcome::Present,
            CallOutcome::Reverted(revert) if revert.is_bare() => ProbeOutcome::Absent,
            CallOutcome::Reverted(_) => ProbeOutcome::InconclusiveRevert,
        }
    }

    /// Whether the probed function exists.
    pub fn confirms(&self) -> bool {
        match self {
            ProbeOutcome::Present | ProbeOutcome::InconclusiveRevert => true,
            ProbeOutcome::Absent => false,
        }
    }
}

/// Pluggable interface probe.
///
/// Rules run in registration order; the first confirmed probe wins.
pub trait ProbeRule: Send + Sync {
    /// Unique name for this rule (for logging).
    fn name(&self) -> &str;

    /// Call data of the read-only probe.
    fn calldata(&self) -> Vec<u8>;

    /// Interface adopted when the probe confirms.
    fn interface(&self) -> Result<ContractInterface>;
}

/// Non-fungible standard probe: `ownerOf(0)`.
pub struct NonFungibleProbe;

impl ProbeRule for NonFungibleProbe {
    fn name(&self) -> &str {
        "erc721"
    }

    fn calldata(&self) -> Vec<u8> {
        let mut data = FunctionSelector::from_signature("ownerOf(uint256)").as_bytes().to_vec();
        data.extend_from_slice(&[0u8; 32]);
        data
    }

    fn interface(&self) -> Result<ContractInterface> {
        ContractInterface::erc721()
    }
}

/// Fungible standard probe: `totalSupply()`.
pub struct FungibleProbe;

impl ProbeRule for FungibleProbe {
    fn name(&self) -> &str {
        "erc20"
    }

    fn calldata(&self) -> Vec<u8> {
        FunctionSelector::from_signature("totalSupply()").as_bytes().to_vec()
    }

    fn interface(&self) -> Result<ContractInterface> {
        ContractInterface::erc20()
    }
}

/// Probes in the order they must be tried. `ownerOf` comes first because
/// non-fungible contracts commonly also expose `totalSupply`.
pub fn default_probe_rules() -> Vec<Box<dyn ProbeRule>> {
    vec![Box::new(NonFungibleProbe), Box::new(FungibleProbe)]
}
