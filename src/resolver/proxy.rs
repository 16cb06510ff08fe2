//! Proxy detection helpers.
//!
//! A contract whose interface exposes `implementation()` may be a proxy. The
//! accessor is tried first; when it is permissioned, the implementation is
//! read from the standardized storage slots instead.

use ledger_common::{keccak256, Address, FunctionSelector};
use primitive_types::H256;

use crate::provider::CallOutcome;

/// Name of the accessor that marks a potential proxy.
pub const IMPLEMENTATION_ACCESSOR: &str = "implementation";

/// Storage slots probed for an implementation address, in order:
/// 1. EIP-1967 `keccak256("eip1967.proxy.implementation") - 1`
/// 2. ZeppelinOS `keccak256("org.zeppelinos.proxy.implementation")`
pub fn implementation_slots() -> [H256; 2] {
    let mut eip1967 = keccak256(b"eip1967.proxy.implementation");
    decrement_be(&mut eip1967);

    [H256(eip1967), H256(keccak256(b"org.zeppelinos.proxy.implementation"))]
}

fn decrement_be(word: &mut [u8; 32]) {
    for byte in word.iter_mut().rev() {
        let (value, borrow) = byte.overflowing_sub(1);
        *byte = value;
        if !borrow {
            break;
        }
    }
}

pub fn accessor_calldata() -> Vec<u8> {
    FunctionSelector::from_signature("implementation()").as_bytes().to_vec()
}

/// Interpretation of an `implementation()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorResult {
    /// The accessor returned a non-zero address.
    Implementation(Address),
    /// Access-control revert or zero address: read the standard slots.
    StorageFallback,
    /// The accessor does not dispatch (or returns nothing usable).
    NotProxy,
}

impl AccessorResult {
    pub fn from_call(outcome: &CallOutcome) -> Self {
        match outcome {
            CallOutcome::Returned(data) if data.len() >= 32 => {
                let address = Address::from_word(H256::from_slice(&data[..32]));
                if address.is_zero() {
                    AccessorResult::StorageFallback
                } else {
                    AccessorResult::Implementation(address)
                }
            }
            CallOutcome::Returned(_) => AccessorResult::NotProxy,
            CallOutcome::Reverted(revert) if revert.is_bare() => AccessorResult::NotProxy,
            CallOutcome::Reverted(_) => AccessorResult::StorageFallback,
        }
    }
}
