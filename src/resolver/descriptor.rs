use ledger_common::{Address, FunctionSelector};

use super::abi::ContractInterface;
use crate::network::NetworkId;

/// Effective callable interface of a contract on one network.
///
/// For a proxy, `address` stays the proxy's address while `interface` is the
/// implementation's and `implementation` records where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub address: Address,
    pub network: NetworkId,
    pub interface: Option<ContractInterface>,
    pub implementation: Option<Address>,
    /// Set once a lookup completed, even when it found no interface.
    pub resolved: bool,
}

impl ContractDescriptor {
    pub fn resolved(
        address: Address,
        network: NetworkId,
        interface: Option<ContractInterface>,
    ) -> Self {
        Self {
            address,
            network,
            interface,
            implementation: None,
            resolved: true,
        }
    }

    pub fn has_interface(&self) -> bool {
        self.interface.is_some()
    }

    pub fn is_proxy(&self) -> bool {
        self.implementation.is_some()
    }

    /// Name of the function behind `selector`, or the selector itself when
    /// the interface is unknown or does not contain it.
    pub fn function_name(&self, selector: &FunctionSelector) -> String {
        self.interface
            .as_ref()
            .and_then(|interface| interface.abi.function_name(selector))
            .map_or_else(|| selector.to_hex(), str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name_without_interface_is_selector() {
        let descriptor = ContractDescriptor::resolved(Address::ZERO, NetworkId::Ethereum, None);
        let selector: FunctionSelector = "0xdeadbeef".parse().unwrap();
        assert_eq!(descriptor.function_name(&selector), "0xdeadbeef");
    }

    #[test]
    fn test_function_name_with_interface() {
        let descriptor = ContractDescriptor::resolved(
            Address::ZERO,
            NetworkId::Ethereum,
            Some(ContractInterface::erc20().unwrap()),
        );
        let approve = FunctionSelector::from_signature("approve(address,uint256)");
        assert_eq!(descriptor.function_name(&approve), "approve");

        // Unknown selector on a known interface still degrades to the selector.
        let unknown: FunctionSelector = "0x12345678".parse().unwrap();
        assert_eq!(descriptor.function_name(&unknown), "0x12345678");
    }
}
