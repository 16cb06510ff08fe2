use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use ledger_test_utils::{
    addr, approve_calldata, calldata, ether, hash, returns_string, returns_word, reverts_with,
    transfer_calldata, tx, MemoryAbiCache, MockChain, MockExplorer, ROUTER_ABI, WALLET,
};
use wallet_ledger::{
    CallIntent, ClassificationContext, ContractResolver, Direction, Interaction, LedgerError,
    NetworkId, TokenKind, TransactionClassifier, TxHash, U256,
};

const NET: NetworkId = NetworkId::Avalanche;

fn classifier(
    chain: MockChain,
    explorer: MockExplorer,
) -> (TransactionClassifier, Arc<MockExplorer>) {
    let chain = Arc::new(chain);
    let explorer = Arc::new(explorer);
    let store = Arc::new(MemoryAbiCache::new());
    let resolver = ContractResolver::new(chain.clone(), explorer.clone(), store);
    (TransactionClassifier::new(Arc::new(resolver), chain), explorer)
}

fn context(explained: &HashSet<TxHash>) -> ClassificationContext<'_> {
    ClassificationContext {
        wallet: WALLET,
        network: NET,
        native_symbol: "AVAX",
        explained,
    }
}

fn amount(value: &str) -> BigDecimal {
    value.parse().unwrap()
}

#[tokio::test]
async fn test_every_transaction_yields_fee_record() {
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let transaction = tx(1, 100, WALLET, Some(WALLET), U256::zero(), Vec::new());

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();

    assert_eq!(classified.interaction, Interaction::SelfCall);
    assert_eq!(classified.transfers.len(), 1);
    let fee = &classified.transfers[0];
    assert!(fee.is_zero_value());
    assert_eq!(fee.from(), WALLET);
    assert_eq!(fee.symbol(), "AVAX");
    // 21000 gas at 25 gwei.
    assert_eq!(fee.fee(), &amount("0.000525"));
}

#[tokio::test]
async fn test_explained_transaction_skips_resolution() {
    let router = addr(0x70);
    let (classifier, explorer) = classifier(MockChain::new(), MockExplorer::new());
    let explained: HashSet<TxHash> = [hash(2)].into_iter().collect();
    let transaction = tx(2, 100, WALLET, Some(router), U256::zero(), calldata("swap()", &[]));

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();

    assert_eq!(classified.interaction, Interaction::Explained);
    assert_eq!(classified.transfers.len(), 1);
    assert_eq!(explorer.total_abi_lookups(), 0);
}

#[tokio::test]
async fn test_explained_transaction_keeps_native_value() {
    let router = addr(0x70);
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained: HashSet<TxHash> = [hash(3)].into_iter().collect();
    let input = calldata("swapExactAVAXForTokens()", &[]);
    let transaction = tx(3, 100, WALLET, Some(router), ether(2), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();

    assert_eq!(classified.interaction, Interaction::Explained);
    assert_eq!(classified.transfers.len(), 2);
    assert_eq!(classified.transfers[1].value(), &BigDecimal::from(2));
    assert_eq!(classified.transfers[1].kind(), TokenKind::Native);
}

#[tokio::test]
async fn test_native_transfer_directions() {
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();

    let outgoing = tx(4, 1, WALLET, Some(addr(5)), ether(1), Vec::new());
    let classified = classifier.classify(&outgoing, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::NativeTransfer {
            direction: Direction::Outgoing
        }
    );
    let value = &classified.transfers[1];
    assert_eq!(value.value(), &BigDecimal::from(1));
    assert_eq!(value.fee(), &BigDecimal::zero());

    let incoming = tx(5, 2, addr(5), Some(WALLET), ether(1), Vec::new());
    let classified = classifier.classify(&incoming, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::NativeTransfer {
            direction: Direction::Incoming
        }
    );
}

#[tokio::test]
async fn test_native_transfer_without_wallet_is_unexpected() {
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let transaction = tx(6, 1, addr(5), Some(addr(6)), ether(1), Vec::new());

    let err = classifier
        .classify(&transaction, &context(&explained))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnexpectedTopology { hash: h, .. } if h == hash(6)));
}

#[tokio::test]
async fn test_approval() {
    let token = addr(0x71);
    let chain = MockChain::new().with_call(token, "totalSupply()", returns_word([0x01; 32]));
    let (classifier, _) = classifier(chain, MockExplorer::new());
    let explained = HashSet::new();
    let input = approve_calldata(addr(0x72), U256::MAX);
    let transaction = tx(7, 1, WALLET, Some(token), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::Approval {
            contract: token,
            function: "approve".to_string(),
        }
    );
}

#[tokio::test]
async fn test_operator_approval_is_approval() {
    let collection = addr(0x78);
    let chain = MockChain::new().with_call(
        collection,
        "ownerOf(uint256)",
        returns_word(addr(0x99).to_word()),
    );
    let (classifier, _) = classifier(chain, MockExplorer::new());
    let explained = HashSet::new();
    let mut approved = [0u8; 32];
    approved[31] = 1;
    let input = calldata(
        "setApprovalForAll(address,bool)",
        &[addr(0x72).to_word(), approved],
    );
    let transaction = tx(14, 1, WALLET, Some(collection), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::Approval {
            contract: collection,
            function: "setApprovalForAll".to_string(),
        }
    );
}

#[tokio::test]
async fn test_transfer_call_carries_token_symbol() {
    let token = addr(0x71);
    let chain = MockChain::new()
        .with_call(token, "totalSupply()", returns_word([0x01; 32]))
        .with_call(token, "symbol()", returns_string("WAVAX"));
    let (classifier, _) = classifier(chain, MockExplorer::new());
    let explained = HashSet::new();
    let input = transfer_calldata(addr(0x72), U256::one());
    let transaction = tx(8, 1, WALLET, Some(token), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::ContractCall {
            contract: token,
            function: "transfer".to_string(),
            intent: CallIntent::Transfer,
            symbol: Some("WAVAX".to_string()),
        }
    );
}

#[tokio::test]
async fn test_transfer_call_without_symbol() {
    let token = addr(0x79);
    let chain = MockChain::new()
        .with_call(token, "totalSupply()", returns_word([0x01; 32]))
        .with_call(token, "symbol()", reverts_with("not supported"));
    let (classifier, _) = classifier(chain, MockExplorer::new());
    let explained = HashSet::new();
    let input = transfer_calldata(addr(0x72), U256::one());
    let transaction = tx(15, 1, WALLET, Some(token), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert!(matches!(
        classified.interaction,
        Interaction::ContractCall {
            intent: CallIntent::Transfer,
            symbol: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_contract_call_on_verified_router() {
    let router = addr(0x73);
    let explorer = MockExplorer::new().with_verified_abi(NET, router, ROUTER_ABI);
    let (classifier, _) = classifier(MockChain::new(), explorer);
    let explained = HashSet::new();
    let input = calldata(
        "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
        &[[0u8; 32]; 5],
    );
    let transaction = tx(9, 1, WALLET, Some(router), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::ContractCall {
            contract: router,
            function: "swapExactTokensForTokens".to_string(),
            intent: CallIntent::Unrecognized("swapExactTokensForTokens".to_string()),
            symbol: None,
        }
    );
}

#[tokio::test]
async fn test_unverified_call_keeps_raw_selector() {
    let contract = addr(0x74);
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let input = vec![0xde, 0xad, 0xbe, 0xef];
    let transaction = tx(10, 1, WALLET, Some(contract), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::ContractCall {
            contract,
            function: "0xdeadbeef".to_string(),
            intent: CallIntent::Unrecognized("0xdeadbeef".to_string()),
            symbol: None,
        }
    );
}

#[tokio::test]
async fn test_zero_value_call_into_wallet_is_unexpected() {
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let transaction = tx(11, 1, addr(0x75), Some(WALLET), U256::zero(), Vec::new());

    let err = classifier
        .classify(&transaction, &context(&explained))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnexpectedTopology { .. }));
}

#[tokio::test]
async fn test_third_party_effect() {
    let contract = addr(0x76);
    let (classifier, explorer) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let input = calldata("airdrop()", &[]);
    let transaction = tx(12, 1, addr(0x77), Some(contract), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert!(matches!(
        classified.interaction,
        Interaction::ThirdPartyEffect { contract: c, symbol: None, .. } if c == contract
    ));
    // Resolved for diagnostics.
    assert_eq!(explorer.abi_lookups(contract), 1);
}

#[tokio::test]
async fn test_third_party_transfer_carries_token_symbol() {
    let token = addr(0x7a);
    let chain = MockChain::new()
        .with_call(token, "totalSupply()", returns_word([0x01; 32]))
        .with_call(token, "symbol()", returns_string("USDT"));
    let (classifier, _) = classifier(chain, MockExplorer::new());
    let explained = HashSet::new();
    let input = transfer_calldata(WALLET, U256::one());
    let transaction = tx(16, 1, addr(0x77), Some(token), U256::zero(), input);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(
        classified.interaction,
        Interaction::ThirdPartyEffect {
            contract: token,
            function: "transfer".to_string(),
            symbol: Some("USDT".to_string()),
        }
    );
}

#[tokio::test]
async fn test_contract_creation() {
    let (classifier, _) = classifier(MockChain::new(), MockExplorer::new());
    let explained = HashSet::new();
    let transaction = tx(13, 1, WALLET, None, U256::zero(), vec![0x60, 0x80, 0x60, 0x40]);

    let classified = classifier.classify(&transaction, &context(&explained)).await.unwrap();
    assert_eq!(classified.interaction, Interaction::ContractCreation);
    assert_eq!(classified.transfers[0].to(), WALLET);
}
