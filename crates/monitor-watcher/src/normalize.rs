//! Builds canonical [`Transaction`] records from chain-native data.
//!
//! Values are copied in the chain's native unit. Nothing here converts,
//! validates or looks anything up.

use crate::implementations::ethereum::EthBlock;
use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use monitor_types::{Chain, Transaction};

fn block_time(seconds: i64) -> DateTime<Utc> {
	DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// One spent input of a Bitcoin transaction, attributed to `user_id`.
///
/// The source is the input's previous-output reference (`txid:vout`). No
/// destination, amount or fees are derived.
pub fn bitcoin_input(
	user_id: &str,
	input: &bitcoin::TxIn,
	tx: &bitcoin::Transaction,
	block: &bitcoin::Block,
) -> Transaction {
	Transaction {
		user_id: user_id.to_string(),
		chain: Chain::Bitcoin,
		source: input.previous_output.to_string(),
		destination: None,
		amount: None,
		fees: None,
		timestamp: block_time(block.header.time as i64),
		tx_hash: tx.compute_txid().to_string(),
		block_ref: block.header.nonce as u64,
	}
}

/// An Ethereum transfer between `sender` and `recipient`, attributed to
/// `user_id`.
///
/// Addresses are rendered EIP-55 checksummed. Fees are the fee cap, gas
/// limit times gas price, or times max fee per gas for dynamic-fee
/// transactions.
pub fn ethereum_transfer(
	user_id: &str,
	tx: &TxEnvelope,
	sender: Address,
	recipient: Address,
	block: &EthBlock,
) -> Transaction {
	let gas_price = tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas());
	let fees = U256::from(tx.gas_limit()) * U256::from(gas_price);

	Transaction {
		user_id: user_id.to_string(),
		chain: Chain::Ethereum,
		source: sender.to_checksum(None),
		destination: Some(recipient.to_checksum(None)),
		amount: Some(tx.value().to_string()),
		fees: Some(fees.to_string()),
		timestamp: block_time(block.timestamp as i64),
		tx_hash: tx.tx_hash().to_string(),
		block_ref: block.number,
	}
}
