//! Chain identifiers for the networks the monitor knows about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A blockchain network monitored by the system.
///
/// Serialized with the ticker symbol used throughout the wire formats
/// (`"BTC"`, `"ETH"`, `"SOL"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
	/// Bitcoin-style UTXO chain, consumed by polling.
	#[serde(rename = "BTC")]
	Bitcoin,
	/// Ethereum-style account chain, consumed through a header subscription.
	#[serde(rename = "ETH")]
	Ethereum,
	/// Solana. Declared but not monitored yet.
	#[serde(rename = "SOL")]
	Solana,
}

impl Chain {
	/// Returns the ticker symbol for this chain.
	pub fn symbol(&self) -> &'static str {
		match self {
			Chain::Bitcoin => "BTC",
			Chain::Ethereum => "ETH",
			Chain::Solana => "SOL",
		}
	}
}

impl fmt::Display for Chain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.symbol())
	}
}
