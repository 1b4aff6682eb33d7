//! Subscription watcher for Ethereum.
//!
//! The node pushes every new head over a WebSocket subscription. For each
//! header the watcher fetches the full block and checks every transaction's
//! recovered sender and its recipient against the registry. The watcher
//! never polls: if the subscription ends, the watch ends with it.

mod ws;

pub use ws::AlloyWsSource;

use crate::{normalize, with_api_key, ChainWatcher, WatchContext, WatcherError};
use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::primitives::B256;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use monitor_types::{
	truncate_id, Chain, ConfigSchema, Field, FieldType, Schema, SecretString, ValidationError,
};
use std::pin::Pin;
use tracing::instrument;

/// A new chain head announced by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHeader {
	pub number: u64,
	pub hash: B256,
}

/// A block with its full signed transactions.
#[derive(Debug, Clone)]
pub struct EthBlock {
	pub number: u64,
	pub hash: B256,
	pub timestamp: u64,
	pub transactions: Vec<TxEnvelope>,
}

/// Stream of new heads. Dropping it ends the subscription.
pub type HeaderStream = Pin<Box<dyn Stream<Item = Result<EthHeader, WatcherError>> + Send>>;

/// Node operations the subscription watcher depends on.
#[async_trait]
pub trait EthereumSource: Send + Sync {
	/// Opens the session with the node.
	async fn connect(&self) -> Result<(), WatcherError>;
	/// Subscribes to new heads.
	async fn subscribe_headers(&self) -> Result<HeaderStream, WatcherError>;
	/// Full block for `hash`.
	async fn block_by_hash(&self, hash: B256) -> Result<EthBlock, WatcherError>;
}

/// Ethereum watcher driven by an [`EthereumSource`] header feed.
pub struct EthereumWatcher {
	source: Box<dyn EthereumSource>,
}

impl EthereumWatcher {
	pub fn new(source: Box<dyn EthereumSource>) -> Self {
		Self { source }
	}

	async fn handle_header(&self, ctx: &WatchContext, header: EthHeader) {
		match self.source.block_by_hash(header.hash).await {
			Ok(block) => {
				self.scan_block(ctx, &block).await;
			},
			Err(e) => {
				tracing::warn!(
					chain = %Chain::Ethereum,
					block = header.number,
					error = %e,
					"Skipping header"
				);
				ctx.report(format!(
					"ETH block {} ({}): {}",
					header.number, header.hash, e
				));
			},
		}
	}

	/// Publishes one record per (transaction, matching user) pair in `block`.
	///
	/// Transactions without a recipient or with an unrecoverable signature
	/// are reported and skipped.
	#[instrument(skip_all, fields(block = block.number))]
	async fn scan_block(&self, ctx: &WatchContext, block: &EthBlock) -> usize {
		let snapshot = ctx.registry.snapshot().await;
		let mut published = 0;

		for tx in &block.transactions {
			let tx_hash = tx.tx_hash();

			let Some(recipient) = tx.to() else {
				ctx.report(format!(
					"ETH tx {} in block {}: no recipient (contract creation)",
					tx_hash, block.number
				));
				continue;
			};

			let sender = match tx.recover_signer() {
				Ok(sender) => sender,
				Err(e) => {
					ctx.report(format!(
						"ETH tx {} in block {}: cannot recover sender: {}",
						tx_hash, block.number, e
					));
					continue;
				},
			};

			let from = sender.to_checksum(None);
			let to = recipient.to_checksum(None);
			let candidates = [from.as_str(), to.as_str()];

			for user_id in snapshot.users_matching_any(&candidates) {
				let record = normalize::ethereum_transfer(user_id, tx, sender, recipient, block);
				tracing::info!(
					chain = %Chain::Ethereum,
					user_id = %user_id,
					tx_hash = %truncate_id(&record.tx_hash),
					"Matched transfer"
				);
				ctx.publisher.publish(&record).await;
				published += 1;
			}
		}

		tracing::debug!(
			transactions = block.transactions.len(),
			users = snapshot.len(),
			published,
			"Scanned block"
		);
		published
	}
}

/// Configuration schema for the Ethereum watcher.
pub struct EthereumWatcherSchema;

impl ConfigSchema for EthereumWatcherSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("ws_url", FieldType::Url(&["ws", "wss"]))],
			vec![Field::new("api_key", FieldType::String)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ChainWatcher for EthereumWatcher {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EthereumWatcherSchema)
	}

	fn chain(&self) -> Chain {
		Chain::Ethereum
	}

	async fn monitor(&self, mut ctx: WatchContext) -> Result<(), WatcherError> {
		self.source.connect().await.map_err(|e| match e {
			WatcherError::Connection(_) => e,
			other => WatcherError::Connection(other.to_string()),
		})?;

		let mut headers = self.source.subscribe_headers().await.map_err(|e| match e {
			WatcherError::Subscription(_) => e,
			other => WatcherError::Subscription(other.to_string()),
		})?;
		tracing::info!(chain = %Chain::Ethereum, "Subscribed to new heads");

		loop {
			tokio::select! {
				_ = ctx.cancelled() => {
					break;
				}
				next = headers.next() => {
					match next {
						Some(Ok(header)) => {
							tracing::debug!(chain = %Chain::Ethereum, block = header.number, "New head");
							self.handle_header(&ctx, header).await;
						},
						Some(Err(e)) => {
							return Err(WatcherError::Subscription(e.to_string()));
						},
						None => {
							return Err(WatcherError::Subscription(
								"Header subscription closed".to_string(),
							));
						},
					}
				}
			}
		}

		tracing::info!(chain = %Chain::Ethereum, "Stopped");
		Ok(())
	}
}

/// Factory function to create an Ethereum watcher from configuration.
///
/// Configuration parameters:
/// - `ws_url`: WebSocket endpoint (ws or wss)
/// - `api_key`: appended to the endpoint as `apiKey` when set
pub fn create_watcher(config: &toml::Value) -> Result<Box<dyn ChainWatcher>, WatcherError> {
	EthereumWatcherSchema
		.validate(config)
		.map_err(|e| WatcherError::Configuration(format!("Invalid configuration: {}", e)))?;

	let ws_url = config
		.get("ws_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WatcherError::Configuration("ws_url is required".to_string()))?;
	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.unwrap_or_default();

	let endpoint = SecretString::new(with_api_key(ws_url, api_key));
	Ok(Box::new(EthereumWatcher::new(Box::new(AlloyWsSource::new(
		endpoint,
	)))))
}

/// Registry for the Ethereum watcher implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "ethereum";
	type Factory = crate::WatcherFactory;

	fn factory() -> Self::Factory {
		create_watcher
	}
}

impl crate::WatcherRegistry for Registry {}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::test_support::{drain, harness};
	use alloy::consensus::{SignableTransaction, TxEip1559, TxLegacy};
	use alloy::network::TxSignerSync;
	use alloy::primitives::{address, Address, TxKind, U256};
	use alloy::signers::local::PrivateKeySigner;
	use std::collections::HashMap;
	use std::sync::Mutex;
	use tokio::sync::mpsc;

	pub(crate) fn signer() -> PrivateKeySigner {
		PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap()
	}

	fn other_signer() -> PrivateKeySigner {
		PrivateKeySigner::from_bytes(&B256::repeat_byte(0x22)).unwrap()
	}

	pub(crate) fn legacy_transfer(
		signer: &PrivateKeySigner,
		to: Address,
		value: u64,
		gas_limit: u64,
		gas_price: u128,
	) -> TxEnvelope {
		let mut tx = TxLegacy {
			chain_id: Some(1),
			gas_price,
			gas_limit,
			to: TxKind::Call(to),
			value: U256::from(value),
			..Default::default()
		};
		let signature = signer.sign_transaction_sync(&mut tx).unwrap();
		TxEnvelope::Legacy(tx.into_signed(signature))
	}

	pub(crate) fn eip1559_transfer(
		signer: &PrivateKeySigner,
		to: Address,
		value: u64,
		gas_limit: u64,
		max_fee_per_gas: u128,
	) -> TxEnvelope {
		let mut tx = TxEip1559 {
			chain_id: 1,
			gas_limit,
			max_fee_per_gas,
			max_priority_fee_per_gas: 1_000_000_000,
			to: TxKind::Call(to),
			value: U256::from(value),
			..Default::default()
		};
		let signature = signer.sign_transaction_sync(&mut tx).unwrap();
		TxEnvelope::Eip1559(tx.into_signed(signature))
	}

	fn contract_creation(signer: &PrivateKeySigner) -> TxEnvelope {
		let mut tx = TxLegacy {
			chain_id: Some(1),
			gas_price: 1,
			gas_limit: 100_000,
			to: TxKind::Create,
			..Default::default()
		};
		let signature = signer.sign_transaction_sync(&mut tx).unwrap();
		TxEnvelope::Legacy(tx.into_signed(signature))
	}

	fn block(number: u64, transactions: Vec<TxEnvelope>) -> EthBlock {
		EthBlock {
			number,
			hash: B256::with_last_byte(number as u8),
			timestamp: 1_700_000_000 + number,
			transactions,
		}
	}

	type Feed = mpsc::UnboundedSender<Result<EthHeader, WatcherError>>;

	/// Node double whose header feed is driven by the test.
	#[derive(Default)]
	struct ScriptedNode {
		headers: Mutex<Option<mpsc::UnboundedReceiver<Result<EthHeader, WatcherError>>>>,
		blocks: HashMap<B256, EthBlock>,
		connect_fails: bool,
	}

	impl ScriptedNode {
		fn new(blocks: Vec<EthBlock>) -> (Self, Feed) {
			let (feed, rx) = mpsc::unbounded_channel();
			let node = Self {
				headers: Mutex::new(Some(rx)),
				blocks: blocks.into_iter().map(|b| (b.hash, b)).collect(),
				connect_fails: false,
			};
			(node, feed)
		}
	}

	#[async_trait]
	impl EthereumSource for ScriptedNode {
		async fn connect(&self) -> Result<(), WatcherError> {
			if self.connect_fails {
				return Err(WatcherError::Connection("handshake failed".to_string()));
			}
			Ok(())
		}

		async fn subscribe_headers(&self) -> Result<HeaderStream, WatcherError> {
			let rx = self
				.headers
				.lock()
				.unwrap()
				.take()
				.ok_or_else(|| WatcherError::Subscription("already subscribed".to_string()))?;
			let stream = futures::stream::unfold(rx, |mut rx| async move {
				rx.recv().await.map(|item| (item, rx))
			});
			Ok(Box::pin(stream))
		}

		async fn block_by_hash(&self, hash: B256) -> Result<EthBlock, WatcherError> {
			self.blocks
				.get(&hash)
				.cloned()
				.ok_or_else(|| WatcherError::Fetch(format!("block {} not found", hash)))
		}
	}

	fn announce(feed: &Feed, block: &EthBlock) {
		feed.send(Ok(EthHeader {
			number: block.number,
			hash: block.hash,
		}))
		.unwrap();
	}

	fn payload(record: &monitor_publisher::implementations::memory::SinkRecord) -> serde_json::Value {
		serde_json::from_slice(&record.payload).unwrap()
	}

	#[tokio::test]
	async fn test_matches_sender_and_recipient() {
		let recipient = address!("0987654321098765432109876543210987654321");
		let unrelated = address!("00000000000000000000000000000000000000aa");
		let sender = signer().address().to_checksum(None);
		let recipient_checksum = recipient.to_checksum(None);

		let b = block(
			100,
			vec![
				legacy_transfer(&signer(), recipient, 1_000, 21_000, 10),
				legacy_transfer(&other_signer(), unrelated, 7, 21_000, 10),
			],
		);
		let (node, feed) = ScriptedNode::new(vec![b.clone()]);
		let mut h = harness(&[
			("receiver", &[recipient_checksum.as_str()]),
			("sender", &[sender.as_str()]),
		])
		.await;

		announce(&feed, &b);
		drop(feed);

		let watcher = EthereumWatcher::new(Box::new(node));
		let result = watcher.monitor(h.ctx.clone()).await;
		assert!(matches!(result, Err(WatcherError::Subscription(_))));

		let records = h.sink.records().await;
		assert_eq!(records.len(), 2);
		let keys: Vec<&str> = records.iter().map(|r| r.routing_key.as_str()).collect();
		assert!(keys.contains(&"receiver"));
		assert!(keys.contains(&"sender"));
		for record in &records {
			let event = payload(record);
			assert_eq!(event["source"], sender);
			assert_eq!(event["destination"], recipient_checksum);
			assert_eq!(event["amount"], "1000");
			assert_eq!(event["fees"], "210000");
		}
		assert!(drain(&mut h.errors).is_empty());
	}

	#[tokio::test]
	async fn test_self_transfer_publishes_once() {
		let own = signer().address();
		let b = block(5, vec![legacy_transfer(&signer(), own, 1, 21_000, 1)]);
		let (node, feed) = ScriptedNode::new(vec![b.clone()]);
		let h = harness(&[("1", &[own.to_checksum(None).as_str()])]).await;

		announce(&feed, &b);
		drop(feed);

		let _ = EthereumWatcher::new(Box::new(node)).monitor(h.ctx.clone()).await;
		assert_eq!(h.sink.records().await.len(), 1);
	}

	#[tokio::test]
	async fn test_contract_creation_reported_and_skipped() {
		let recipient = address!("0987654321098765432109876543210987654321");
		let b = block(
			7,
			vec![
				contract_creation(&signer()),
				legacy_transfer(&signer(), recipient, 3, 21_000, 1),
			],
		);
		let (node, feed) = ScriptedNode::new(vec![b.clone()]);
		let mut h = harness(&[("1", &[recipient.to_checksum(None).as_str()])]).await;

		announce(&feed, &b);
		drop(feed);

		let _ = EthereumWatcher::new(Box::new(node)).monitor(h.ctx.clone()).await;

		let errors = drain(&mut h.errors);
		assert_eq!(errors.len(), 1);
		assert!(errors[0].contains("no recipient"));
		assert_eq!(h.sink.records().await.len(), 1);
	}

	#[tokio::test]
	async fn test_missing_block_skips_header() {
		let recipient = address!("0987654321098765432109876543210987654321");
		let known = block(9, vec![legacy_transfer(&signer(), recipient, 3, 21_000, 1)]);
		let missing = block(8, vec![]);
		let (node, feed) = ScriptedNode::new(vec![known.clone()]);
		let mut h = harness(&[("1", &[recipient.to_checksum(None).as_str()])]).await;

		announce(&feed, &missing);
		announce(&feed, &known);
		drop(feed);

		let _ = EthereumWatcher::new(Box::new(node)).monitor(h.ctx.clone()).await;

		let errors = drain(&mut h.errors);
		assert_eq!(errors.len(), 1);
		assert!(errors[0].contains("ETH block 8"));
		assert_eq!(h.sink.records().await.len(), 1);
	}

	#[tokio::test]
	async fn test_feed_error_is_fatal() {
		let (node, feed) = ScriptedNode::new(vec![]);
		let h = harness(&[]).await;

		feed.send(Err(WatcherError::Subscription("socket reset".to_string())))
			.unwrap();

		let result = EthereumWatcher::new(Box::new(node)).monitor(h.ctx.clone()).await;
		assert!(matches!(result, Err(WatcherError::Subscription(m)) if m.contains("socket reset")));
	}

	#[tokio::test]
	async fn test_shutdown_stops_cleanly() {
		let (node, _feed) = ScriptedNode::new(vec![]);
		let h = harness(&[]).await;
		let watcher = EthereumWatcher::new(Box::new(node));

		let ctx = h.ctx.clone();
		let handle = tokio::spawn(async move { watcher.monitor(ctx).await });
		h.shutdown.send(true).unwrap();

		assert!(handle.await.unwrap().is_ok());
	}

	#[tokio::test]
	async fn test_connect_failure_is_fatal() {
		let node = ScriptedNode {
			connect_fails: true,
			..Default::default()
		};
		let h = harness(&[]).await;

		let result = EthereumWatcher::new(Box::new(node)).monitor(h.ctx.clone()).await;
		assert!(matches!(result, Err(WatcherError::Connection(_))));
	}

	#[test]
	fn test_factory_requires_websocket_url() {
		let config: toml::Value = toml::from_str(r#"ws_url = "https://eth.example.com""#).unwrap();
		assert!(matches!(
			create_watcher(&config),
			Err(WatcherError::Configuration(_))
		));

		let config: toml::Value = toml::from_str(
			r#"
ws_url = "wss://eth.example.com"
api_key = "key"
"#,
		)
		.unwrap();
		assert_eq!(create_watcher(&config).unwrap().chain(), Chain::Ethereum);
	}
}
