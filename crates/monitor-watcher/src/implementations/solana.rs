//! Solana watcher placeholder.
//!
//! Solana is a supported chain for registration and is wired like every
//! other watcher, but observing it is not implemented. Running it fails
//! immediately so the supervisor records the gap instead of reporting a
//! healthy watcher that never emits anything.

use crate::{ChainWatcher, WatchContext, WatcherError};
use async_trait::async_trait;
use monitor_types::{Chain, ConfigSchema, Field, FieldType, Schema, ValidationError};

pub struct SolanaWatcher;

/// Configuration schema for the Solana watcher.
pub struct SolanaWatcherSchema;

impl ConfigSchema for SolanaWatcherSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("rpc_url", FieldType::Url(&["http", "https", "ws", "wss"])),
				Field::new("api_key", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ChainWatcher for SolanaWatcher {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SolanaWatcherSchema)
	}

	fn chain(&self) -> Chain {
		Chain::Solana
	}

	async fn monitor(&self, _ctx: WatchContext) -> Result<(), WatcherError> {
		Err(WatcherError::NotImplemented(Chain::Solana))
	}
}

/// Factory function to create the Solana watcher.
pub fn create_watcher(config: &toml::Value) -> Result<Box<dyn ChainWatcher>, WatcherError> {
	SolanaWatcherSchema
		.validate(config)
		.map_err(|e| WatcherError::Configuration(format!("Invalid configuration: {}", e)))?;
	Ok(Box::new(SolanaWatcher))
}

/// Registry for the Solana watcher implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "solana";
	type Factory = crate::WatcherFactory;

	fn factory() -> Self::Factory {
		create_watcher
	}
}

impl crate::WatcherRegistry for Registry {}
