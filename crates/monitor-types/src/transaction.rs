//! Canonical transaction record and the event payload derived from it.
//!
//! Watchers build a [`Transaction`] for every registry match. The publisher
//! reduces it to an [`Event`], which is the only thing that crosses the sink
//! boundary. The user id travels beside the event as the routing key.

use crate::Chain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chain-agnostic record of a transaction touching a registered address.
///
/// `amount` and `fees` are decimal strings in the chain's native unit
/// (satoshi, wei). No cross-chain conversion is performed.
///
/// `block_ref` is an opaque per-chain value: the header nonce on Bitcoin,
/// the block number on Ethereum. It is not comparable across chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub user_id: String,
	pub chain: Chain,
	pub source: String,
	pub destination: Option<String>,
	pub amount: Option<String>,
	pub fees: Option<String>,
	pub timestamp: DateTime<Utc>,
	pub tx_hash: String,
	pub block_ref: u64,
}

/// Wire payload emitted to the sink for each matching transaction.
///
/// Carries transfer fields only. Missing values are empty strings so the
/// payload always has the same four keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
	pub source: String,
	pub destination: String,
	pub amount: String,
	pub fees: String,
}

impl From<&Transaction> for Event {
	fn from(tx: &Transaction) -> Self {
		Self {
			source: tx.source.clone(),
			destination: tx.destination.clone().unwrap_or_default(),
			amount: tx.amount.clone().unwrap_or_default(),
			fees: tx.fees.clone().unwrap_or_default(),
		}
	}
}

/// One address per supported chain, as accepted by the registration
/// entrypoint. Empty entries are ignored when registering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAddresses {
	#[serde(default)]
	pub btc: String,
	#[serde(default)]
	pub eth: String,
	#[serde(default)]
	pub sol: String,
}

impl ChainAddresses {
	/// Returns the non-empty addresses, without their chain association.
	pub fn into_addresses(self) -> Vec<String> {
		[self.btc, self.eth, self.sol]
			.into_iter()
			.filter(|a| !a.is_empty())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn eth_transaction() -> Transaction {
		Transaction {
			user_id: "user-1".to_string(),
			chain: Chain::Ethereum,
			source: "0x1234567890123456789012345678901234567890".to_string(),
			destination: Some("0x0987654321098765432109876543210987654321".to_string()),
			amount: Some("1000".to_string()),
			fees: Some("21000000000000".to_string()),
			timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
			tx_hash: "0xabc".to_string(),
			block_ref: 19_000_000,
		}
	}

	#[test]
	fn test_event_drops_identity_fields() {
		let event = Event::from(&eth_transaction());
		let json = serde_json::to_value(&event).unwrap();
		let object = json.as_object().unwrap();

		assert_eq!(object.len(), 4);
		assert!(!object.contains_key("userId"));
		assert!(!object.contains_key("chain"));
		assert_eq!(object["amount"], "1000");
		assert_eq!(object["fees"], "21000000000000");
	}

	#[test]
	fn test_event_fills_missing_fields_with_empty_strings() {
		let mut tx = eth_transaction();
		tx.chain = Chain::Bitcoin;
		tx.destination = None;
		tx.amount = None;
		tx.fees = None;

		let event = Event::from(&tx);
		assert_eq!(event.source, tx.source);
		assert_eq!(event.destination, "");
		assert_eq!(event.amount, "");
		assert_eq!(event.fees, "");
	}

	#[test]
	fn test_transaction_uses_camel_case() {
		let json = serde_json::to_value(eth_transaction()).unwrap();
		assert_eq!(json["userId"], "user-1");
		assert_eq!(json["chain"], "ETH");
		assert_eq!(json["blockRef"], 19_000_000);
	}

	#[test]
	fn test_chain_addresses_skip_empty() {
		let addresses = ChainAddresses {
			btc: "bc1qexample".to_string(),
			eth: String::new(),
			sol: "So1111".to_string(),
		};
		assert_eq!(addresses.into_addresses(), vec!["bc1qexample", "So1111"]);
	}
}
