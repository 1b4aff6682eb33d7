//! Polling watcher for Bitcoin.
//!
//! The watcher remembers the last seen best block hash and polls the node
//! for a new one at a fixed interval. A changed hash triggers one scan of
//! the new tip. The tip present at startup is recorded but never scanned,
//! and a tip that moves by several blocks between two polls is scanned once,
//! at its newest block.

mod rpc;

pub use rpc::BitcoinRpc;

use crate::{normalize, ChainWatcher, WatchContext, WatcherError};
use async_trait::async_trait;
use bitcoin::{Block, BlockHash};
use monitor_types::{
	truncate_id, Chain, ConfigSchema, Field, FieldType, Schema, SecretString, ValidationError,
};
use std::time::Duration;
use tracing::instrument;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RPC_USER: &str = "blockdaemon";

/// Node operations the polling watcher depends on.
#[async_trait]
pub trait BitcoinSource: Send + Sync {
	/// Verifies that the node answers.
	async fn ping(&self) -> Result<(), WatcherError>;
	/// Height of the current best chain.
	async fn block_count(&self) -> Result<u64, WatcherError>;
	/// Hash of the current chain tip.
	async fn best_block_hash(&self) -> Result<BlockHash, WatcherError>;
	/// Full block for `hash`.
	async fn block(&self, hash: &BlockHash) -> Result<Block, WatcherError>;
}

/// Bitcoin watcher polling a [`BitcoinSource`].
pub struct BitcoinWatcher {
	source: Box<dyn BitcoinSource>,
	poll_interval: Duration,
}

impl BitcoinWatcher {
	pub fn new(source: Box<dyn BitcoinSource>, poll_interval: Duration) -> Self {
		Self {
			source,
			poll_interval,
		}
	}

	/// Publishes one record per (input, matching user) pair in `block`.
	#[instrument(skip_all, fields(block = %truncate_id(&hash.to_string())))]
	async fn scan_block(&self, ctx: &WatchContext, hash: &BlockHash, block: &Block) -> usize {
		let snapshot = ctx.registry.snapshot().await;
		if snapshot.is_empty() {
			tracing::debug!("No watched addresses, skipping block");
			return 0;
		}
		let mut published = 0;

		for tx in &block.txdata {
			for input in &tx.input {
				let reference = input.previous_output.to_string();
				for user_id in snapshot.users_matching(&reference) {
					let record = normalize::bitcoin_input(user_id, input, tx, block);
					tracing::info!(
						chain = %Chain::Bitcoin,
						user_id = %user_id,
						tx_hash = %truncate_id(&record.tx_hash),
						"Matched input"
					);
					ctx.publisher.publish(&record).await;
					published += 1;
				}
			}
		}

		tracing::debug!(
			transactions = block.txdata.len(),
			users = snapshot.len(),
			published,
			"Scanned block"
		);
		published
	}

	/// Sleeps for the poll interval. Returns false if shutdown arrived first.
	async fn pause(&self, ctx: &mut WatchContext) -> bool {
		tokio::select! {
			_ = ctx.cancelled() => false,
			_ = tokio::time::sleep(self.poll_interval) => true,
		}
	}
}

/// Configuration schema for the Bitcoin watcher.
pub struct BitcoinWatcherSchema;

impl ConfigSchema for BitcoinWatcherSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::Url(&["http", "https"]))],
			vec![
				Field::new("rpc_user", FieldType::String),
				Field::new("api_key", FieldType::String),
				Field::new(
					"poll_interval_ms",
					FieldType::Integer {
						min: Some(10),
						max: Some(600_000),
					},
				),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ChainWatcher for BitcoinWatcher {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BitcoinWatcherSchema)
	}

	fn chain(&self) -> Chain {
		Chain::Bitcoin
	}

	async fn monitor(&self, mut ctx: WatchContext) -> Result<(), WatcherError> {
		self.source.ping().await.map_err(|e| match e {
			WatcherError::Connection(_) => e,
			other => WatcherError::Connection(other.to_string()),
		})?;

		let count = self
			.source
			.block_count()
			.await
			.map_err(|e| WatcherError::Connection(format!("Failed to read block count: {}", e)))?;
		tracing::info!(chain = %Chain::Bitcoin, block_count = count, "Connected");

		let mut last = self
			.source
			.best_block_hash()
			.await
			.map_err(|e| WatcherError::Connection(format!("Failed to read best block: {}", e)))?;
		tracing::info!(
			chain = %Chain::Bitcoin,
			block = %truncate_id(&last.to_string()),
			"Synced to tip"
		);

		loop {
			if ctx.is_cancelled() {
				break;
			}

			match self.source.best_block_hash().await {
				Ok(hash) if hash == last => {},
				Ok(hash) => match self.source.block(&hash).await {
					Ok(block) => {
						self.scan_block(&ctx, &hash, &block).await;
						last = hash;
					},
					Err(e) => {
						tracing::warn!(
							chain = %Chain::Bitcoin,
							block = %truncate_id(&hash.to_string()),
							error = %e,
							"Failed to fetch block"
						);
					},
				},
				Err(e) => {
					tracing::warn!(chain = %Chain::Bitcoin, error = %e, "Failed to poll best block");
				},
			}

			if !self.pause(&mut ctx).await {
				break;
			}
		}

		tracing::info!(chain = %Chain::Bitcoin, "Stopped");
		Ok(())
	}
}

/// Factory function to create a Bitcoin watcher from configuration.
///
/// Configuration parameters:
/// - `rpc_url`: Bitcoin Core JSON-RPC endpoint (http or https)
/// - `rpc_user`: basic auth user (default "blockdaemon")
/// - `api_key`: basic auth password, auth is skipped when absent
/// - `poll_interval_ms`: delay between polls (default 1000)
pub fn create_watcher(config: &toml::Value) -> Result<Box<dyn ChainWatcher>, WatcherError> {
	BitcoinWatcherSchema
		.validate(config)
		.map_err(|e| WatcherError::Configuration(format!("Invalid configuration: {}", e)))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WatcherError::Configuration("rpc_url is required".to_string()))?;
	let rpc_user = config
		.get("rpc_user")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_RPC_USER);
	let api_key = SecretString::from(
		config
			.get("api_key")
			.and_then(|v| v.as_str())
			.unwrap_or_default(),
	);
	let poll_interval = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|ms| Duration::from_millis(ms as u64))
		.unwrap_or(DEFAULT_POLL_INTERVAL);

	let source = BitcoinRpc::new(rpc_url, rpc_user, &api_key);
	Ok(Box::new(BitcoinWatcher::new(Box::new(source), poll_interval)))
}

/// Registry for the Bitcoin watcher implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "bitcoin";
	type Factory = crate::WatcherFactory;

	fn factory() -> Self::Factory {
		create_watcher
	}
}

impl crate::WatcherRegistry for Registry {}
