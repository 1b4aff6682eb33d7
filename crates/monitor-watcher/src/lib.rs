//! Chain watcher module for the multi-chain monitor.
//!
//! A watcher observes one blockchain, detects new blocks, matches their
//! transactions against the address registry and publishes a normalized
//! [`Transaction`](monitor_types::Transaction) for every match. Watchers
//! consume their chain in different ways (Bitcoin is polled, Ethereum pushes
//! new headers over a subscription) but all of them expose the same
//! [`ChainWatcher`] capability so the supervisor can treat them uniformly.

use async_trait::async_trait;
use monitor_publisher::EventPublisher;
use monitor_registry::AddressRegistry;
use monitor_types::{Chain, ConfigSchema, ImplementationRegistry};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Chain-native transaction to canonical record conversion.
pub mod normalize;

/// Re-export implementations
pub mod implementations {
	pub mod bitcoin;
	pub mod ethereum;
	pub mod solana;
}

/// Errors that can occur while watching a chain.
#[derive(Debug, Error)]
pub enum WatcherError {
	/// The chain node could not be reached or refused the session.
	#[error("Connection error: {0}")]
	Connection(String),
	/// A block or header could not be retrieved or decoded.
	#[error("Fetch error: {0}")]
	Fetch(String),
	/// The header subscription could not be opened or terminated.
	#[error("Subscription error: {0}")]
	Subscription(String),
	/// The watcher exists but has no behavior for its chain yet.
	#[error("{0} watcher is not implemented")]
	NotImplemented(Chain),
	/// The watcher configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Everything a running watcher shares with the rest of the monitor.
///
/// One context is handed to each watcher. The registry and publisher are
/// shared, the error sender is a clone of the supervisor's reporting
/// channel, and every watcher observes the same shutdown flag.
#[derive(Clone)]
pub struct WatchContext {
	pub registry: Arc<AddressRegistry>,
	pub publisher: Arc<EventPublisher>,
	pub errors: mpsc::UnboundedSender<String>,
	pub shutdown: watch::Receiver<bool>,
}

impl WatchContext {
	/// Sends a non-fatal error message to the supervisor.
	pub fn report(&self, message: impl Into<String>) {
		// Receiver gone means the supervisor is shutting down
		let _ = self.errors.send(message.into());
	}

	/// Returns true once shutdown has been requested.
	pub fn is_cancelled(&self) -> bool {
		*self.shutdown.borrow()
	}

	/// Resolves when shutdown is requested or the shutdown sender is dropped.
	pub async fn cancelled(&mut self) {
		while !*self.shutdown.borrow_and_update() {
			if self.shutdown.changed().await.is_err() {
				return;
			}
		}
	}
}

/// Trait defining the interface for chain watchers.
///
/// `monitor` runs until shutdown is requested, in which case it returns
/// `Ok(())`, or until a fatal error, which it returns. Non-fatal problems
/// are logged or sent through [`WatchContext::report`] and do not end the
/// watch.
#[async_trait]
pub trait ChainWatcher: Send + Sync {
	/// Returns the configuration schema for this watcher implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The chain this watcher observes.
	fn chain(&self) -> Chain;

	/// Connects to the chain and watches it until cancelled or failed.
	async fn monitor(&self, ctx: WatchContext) -> Result<(), WatcherError>;
}

/// Type alias for watcher factory functions.
///
/// Factories only validate configuration and build the watcher. Network
/// connections are opened inside [`ChainWatcher::monitor`], so a node being
/// down is a runtime failure of that watcher alone.
pub type WatcherFactory = fn(&toml::Value) -> Result<Box<dyn ChainWatcher>, WatcherError>;

/// Registry trait for watcher implementations.
pub trait WatcherRegistry: ImplementationRegistry<Factory = WatcherFactory> {}

/// Get all registered watcher implementations.
///
/// Returns a vector of (name, factory) tuples for all available watchers.
pub fn get_all_implementations() -> Vec<(&'static str, WatcherFactory)> {
	use implementations::{bitcoin, ethereum, solana};

	vec![
		(bitcoin::Registry::NAME, bitcoin::Registry::factory()),
		(ethereum::Registry::NAME, ethereum::Registry::factory()),
		(solana::Registry::NAME, solana::Registry::factory()),
	]
}

/// Appends the provider API key to a node endpoint as `apiKey`.
pub(crate) fn with_api_key(endpoint: &str, api_key: &str) -> String {
	if api_key.is_empty() {
		return endpoint.to_string();
	}
	let separator = if endpoint.contains('?') { '&' } else { '?' };
	format!("{}{}apiKey={}", endpoint, separator, api_key)
}
