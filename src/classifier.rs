//! Classification of top-level transactions relative to a wallet.

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use ledger_common::{Address, FunctionSelector};

use crate::error::{LedgerError, Result};
use crate::model::{TokenKind, Transaction, Transfer, TxHash};
use crate::network::NetworkId;
use crate::provider::{CallOutcome, ChainDataProvider};
use crate::resolver::ContractResolver;

const FALLBACK_FUNCTION: &str = "fallback";
const SYMBOL_SIGNATURE: &str = "symbol()";

/// Which side of a native transfer the wallet is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// What a named contract call is trying to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallIntent {
    Transfer,
    Approve,
    Unrecognized(String),
}

impl CallIntent {
    pub fn from_function_name(name: &str) -> Self {
        match name {
            "transfer" | "transferFrom" | "safeTransferFrom" => CallIntent::Transfer,
            "approve" | "setApprovalForAll" | "increaseAllowance" | "decreaseAllowance" => {
                CallIntent::Approve
            }
            other => CallIntent::Unrecognized(other.to_string()),
        }
    }
}

/// Relationship of a transaction to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Token legs are already covered by fetched transfer records.
    Explained,
    NativeTransfer { direction: Direction },
    SelfCall,
    /// Any call whose intent is [`CallIntent::Approve`].
    Approval { contract: Address, function: String },
    ContractCall {
        contract: Address,
        function: String,
        intent: CallIntent,
        /// Token symbol, looked up for transfer calls only.
        symbol: Option<String>,
    },
    ContractCreation,
    /// The wallet is neither sender nor recipient.
    ThirdPartyEffect {
        contract: Address,
        function: String,
        symbol: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTransaction {
    pub hash: TxHash,
    pub interaction: Interaction,
    /// Fee record first, then any native value movement.
    pub transfers: Vec<Transfer>,
}

/// Per-extraction inputs shared by every `classify` call.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationContext<'a> {
    pub wallet: Address,
    pub network: NetworkId,
    pub native_symbol: &'a str,
    pub explained: &'a HashSet<TxHash>,
}

pub struct TransactionClassifier {
    resolver: Arc<ContractResolver>,
    chain: Arc<dyn ChainDataProvider>,
}

impl TransactionClassifier {
    pub fn new(resolver: Arc<ContractResolver>, chain: Arc<dyn ChainDataProvider>) -> Self {
        Self { resolver, chain }
    }

    pub async fn classify(
        &self,
        tx: &Transaction,
        context: &ClassificationContext<'_>,
    ) -> Result<ClassifiedTransaction> {
        let wallet = context.wallet;
        let fee = self.chain.to_native_units(context.network, &tx.fee_wei());
        let fee_record = Transfer::fee_record(
            tx.hash,
            context.network,
            tx.timestamp,
            tx.from,
            tx.to.unwrap_or(tx.from),
            context.native_symbol,
            fee,
        )?;
        let mut transfers = vec![fee_record];

        let has_value = !tx.value.is_zero();

        let interaction = if context.explained.contains(&tx.hash) {
            if has_value {
                transfers.push(self.native_transfer(tx, context)?);
            }
            Interaction::Explained
        } else if tx.to.is_none() {
            if tx.from != wallet {
                return Err(topology(tx, "contract creation not sent by the wallet"));
            }
            if has_value {
                transfers.push(self.native_transfer(tx, context)?);
            }
            Interaction::ContractCreation
        } else if has_value {
            let direction = native_direction(tx, wallet)?;
            transfers.push(self.native_transfer(tx, context)?);
            Interaction::NativeTransfer { direction }
        } else {
            self.classify_call(tx, context).await?
        };

        tracing::debug!(
            target: "wallet_ledger::classifier",
            hash = ?tx.hash,
            interaction = ?interaction,
            "Transaction classified"
        );

        Ok(ClassifiedTransaction {
            hash: tx.hash,
            interaction,
            transfers,
        })
    }

    /// Rules for a zero-value transaction with a recipient.
    async fn classify_call(
        &self,
        tx: &Transaction,
        context: &ClassificationContext<'_>,
    ) -> Result<Interaction> {
        let wallet = context.wallet;
        let network = context.network;
        let Some(to) = tx.to else {
            return Ok(Interaction::ContractCreation);
        };

        match (tx.from == wallet, to == wallet) {
            (true, true) => Ok(Interaction::SelfCall),
            (true, false) => {
                let function = self.function_name(to, network, &tx.input).await?;
                let intent = CallIntent::from_function_name(&function);
                if intent == CallIntent::Approve {
                    return Ok(Interaction::Approval {
                        contract: to,
                        function,
                    });
                }
                let symbol = self.transfer_symbol(to, network, &intent).await?;
                Ok(Interaction::ContractCall {
                    contract: to,
                    function,
                    intent,
                    symbol,
                })
            }
            (false, true) => Err(topology(
                tx,
                "zero-value call into the wallet from another account",
            )),
            (false, false) => {
                let function = self.function_name(to, network, &tx.input).await?;
                let intent = CallIntent::from_function_name(&function);
                let symbol = self.transfer_symbol(to, network, &intent).await?;
                tracing::debug!(
                    target: "wallet_ledger::classifier",
                    hash = ?tx.hash,
                    from = %tx.from,
                    contract = %to,
                    function = %function,
                    symbol = ?symbol,
                    "Third-party transaction affecting wallet"
                );
                Ok(Interaction::ThirdPartyEffect {
                    contract: to,
                    function,
                    symbol,
                })
            }
        }
    }

    /// Symbol of the token moved by a transfer call. Other intents make no
    /// call. A missing or undecodable symbol is logged and left as `None`.
    async fn transfer_symbol(
        &self,
        contract: Address,
        network: NetworkId,
        intent: &CallIntent,
    ) -> Result<Option<String>> {
        if *intent != CallIntent::Transfer {
            return Ok(None);
        }

        let calldata = FunctionSelector::from_signature(SYMBOL_SIGNATURE)
            .as_bytes()
            .to_vec();
        let outcome = self
            .chain
            .call(network, contract, calldata)
            .await
            .map_err(LedgerError::Provider)?;

        let symbol = match &outcome {
            CallOutcome::Returned(data) => ledger_common::decode_abi_string(data),
            CallOutcome::Reverted(_) => None,
        };
        if symbol.is_none() {
            tracing::warn!(
                target: "wallet_ledger::classifier",
                contract = %contract,
                network = %network,
                outcome = ?outcome,
                "Token symbol unavailable"
            );
        }
        Ok(symbol)
    }

    /// Function name behind `input`, or its raw selector. Call data too
    /// short to carry a selector hits the fallback function.
    async fn function_name(
        &self,
        contract: Address,
        network: NetworkId,
        input: &[u8],
    ) -> Result<String> {
        let Some(selector) = FunctionSelector::from_calldata(input) else {
            return Ok(FALLBACK_FUNCTION.to_string());
        };
        let descriptor = self.resolver.resolve(contract, network).await?;
        Ok(ContractResolver::resolve_function_name(&descriptor, &selector))
    }

    fn native_transfer(
        &self,
        tx: &Transaction,
        context: &ClassificationContext<'_>,
    ) -> Result<Transfer> {
        let value = self
            .chain
            .to_native_units(context.network, &ledger_common::u256_to_bigint(tx.value));
        Transfer::new(
            tx.hash,
            context.network,
            tx.timestamp,
            tx.from,
            tx.to.unwrap_or(Address::ZERO),
            context.native_symbol,
            TokenKind::Native,
            value,
            BigDecimal::zero(),
        )
    }
}

fn native_direction(tx: &Transaction, wallet: Address) -> Result<Direction> {
    let to = tx.to.unwrap_or(Address::ZERO);
    match (tx.from == wallet, to == wallet) {
        (true, false) => Ok(Direction::Outgoing),
        (false, true) => Ok(Direction::Incoming),
        (true, true) => Err(topology(tx, "native value sent from the wallet to itself")),
        (false, false) => Err(topology(tx, "native value moved between two other accounts")),
    }
}

fn topology(tx: &Transaction, reason: &str) -> LedgerError {
    LedgerError::UnexpectedTopology {
        hash: tx.hash,
        reason: reason.to_string(),
    }
}
