use ledger_common::{Address, FunctionSelector, U256};
use primitive_types::H256;
use wallet_ledger::{
    CallOutcome, InternalTransferRecord, NftTransferRecord, Revert, TokenTransferRecord,
    Transaction, TxHash,
};

/// Wallet under test in most scenarios.
pub const WALLET: Address = Address::ZERO;

/// Gas price used by [`tx`]: 25 gwei.
pub const GAS_PRICE_WEI: u64 = 25_000_000_000;

/// Gas used by [`tx`].
pub const GAS_USED: u64 = 21_000;

/// Verified ABI of a transparent proxy shell.
pub const PROXY_ABI: &str = r#"[
  {"type": "constructor", "inputs": [{"name": "logic", "type": "address"}]},
  {"type": "function", "name": "implementation", "stateMutability": "view", "inputs": [], "outputs": [{"name": "", "type": "address"}]},
  {"type": "function", "name": "upgradeTo", "stateMutability": "nonpayable", "inputs": [{"name": "newImplementation", "type": "address"}], "outputs": []},
  {"type": "function", "name": "admin", "stateMutability": "view", "inputs": [], "outputs": [{"name": "", "type": "address"}]}
]"#;

/// Verified ABI of a router with one swap function.
pub const ROUTER_ABI: &str = r#"[
  {"type": "function", "name": "swapExactTokensForTokens", "stateMutability": "nonpayable", "inputs": [
    {"name": "amountIn", "type": "uint256"},
    {"name": "amountOutMin", "type": "uint256"},
    {"name": "path", "type": "address[]"},
    {"name": "to", "type": "address"},
    {"name": "deadline", "type": "uint256"}
  ], "outputs": [{"name": "amounts", "type": "uint256[]"}]}
]"#;

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

pub fn hash(n: u64) -> TxHash {
    H256::from_low_u64_be(n)
}

/// `units` whole native coins, in wei.
pub fn ether(units: u64) -> U256 {
    U256::from(units) * U256::exp10(18)
}

/// Fee paid by a transaction built with [`tx`], in wei.
pub fn default_fee_wei() -> U256 {
    U256::from(GAS_USED) * U256::from(GAS_PRICE_WEI)
}

/// Top-level transaction with default gas.
pub fn tx(
    n: u64,
    timestamp: u64,
    from: Address,
    to: Option<Address>,
    value: U256,
    input: Vec<u8>,
) -> Transaction {
    Transaction {
        hash: hash(n),
        from,
        to,
        input,
        value,
        gas_used: U256::from(GAS_USED),
        gas_price: U256::from(GAS_PRICE_WEI),
        timestamp,
    }
}

/// Call data for `signature` followed by 32-byte arguments.
pub fn calldata(signature: &str, args: &[[u8; 32]]) -> Vec<u8> {
    let mut data = FunctionSelector::from_signature(signature).as_bytes().to_vec();
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
    calldata("approve(address,uint256)", &[spender.to_word(), word(amount)])
}

pub fn transfer_calldata(to: Address, amount: U256) -> Vec<u8> {
    calldata("transfer(address,uint256)", &[to.to_word(), word(amount)])
}

/// Big-endian ABI word of `value`.
pub fn word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, limb) in value.0.iter().enumerate() {
        let end = 32 - i * 8;
        out[end - 8..end].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

/// Successful call returning one ABI word.
pub fn returns_word(value: [u8; 32]) -> CallOutcome {
    CallOutcome::Returned(value.to_vec())
}

/// Successful call returning one ABI-encoded `string`.
pub fn returns_string(value: &str) -> CallOutcome {
    let mut data = word(U256::from(32u64)).to_vec();
    data.extend_from_slice(&word(U256::from(value.len())));
    let mut tail = value.as_bytes().to_vec();
    tail.resize(value.len().div_ceil(32) * 32, 0);
    data.extend_from_slice(&tail);
    CallOutcome::Returned(data)
}

/// Call reverted with a reason string.
pub fn reverts_with(reason: &str) -> CallOutcome {
    CallOutcome::Reverted(Revert::with_reason(reason))
}

pub fn token_transfer(
    n: u64,
    timestamp: u64,
    from: Address,
    to: Address,
    symbol: &str,
    decimals: u32,
    raw: u64,
) -> TokenTransferRecord {
    TokenTransferRecord {
        hash: hash(n),
        timestamp,
        from,
        to,
        contract: addr(0xc0),
        symbol: symbol.to_string(),
        decimals,
        value: U256::from(raw),
    }
}

pub fn nft_transfer(
    n: u64,
    timestamp: u64,
    from: Address,
    to: Address,
    symbol: &str,
    token_id: u64,
) -> NftTransferRecord {
    NftTransferRecord {
        hash: hash(n),
        timestamp,
        from,
        to,
        contract: addr(0xc1),
        symbol: symbol.to_string(),
        token_id: U256::from(token_id),
    }
}

pub fn internal_transfer(
    n: u64,
    timestamp: u64,
    from: Address,
    to: Address,
    wei: U256,
) -> InternalTransferRecord {
    InternalTransferRecord {
        hash: hash(n),
        timestamp,
        from,
        to,
        value: wei,
    }
}
