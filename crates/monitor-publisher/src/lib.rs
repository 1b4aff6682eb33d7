//! Event publishing module for the multi-chain monitor.
//!
//! Every matching transaction is projected to an [`Event`], serialized to
//! JSON and handed to an external sink keyed by the user identifier. The
//! boundary is best effort: failures are logged, the event is dropped, and
//! nothing propagates back into the watcher that produced it.

use async_trait::async_trait;
use monitor_types::{truncate_id, ConfigSchema, Event, ImplementationRegistry, Transaction};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod memory;
	pub mod webhook;
}

/// Errors that can occur while handing an event to a sink.
#[derive(Debug, Error)]
pub enum PublishError {
	/// The event could not be serialized.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The sink rejected or failed to accept the payload.
	#[error("Sink error: {0}")]
	Sink(String),
	/// The sink configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for event sinks.
///
/// A sink accepts a routing key and an opaque payload. Delivery
/// acknowledgment, if the sink has one, is not consulted by the monitor.
#[async_trait]
pub trait EventSink: Send + Sync {
	/// Returns the configuration schema for this sink implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one serialized event under `routing_key`.
	async fn send(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Type alias for sink factory functions.
pub type SinkFactory = fn(&toml::Value) -> Result<Box<dyn EventSink>, PublishError>;

/// Registry trait for sink implementations.
pub trait SinkRegistry: ImplementationRegistry<Factory = SinkFactory> {}

/// Get all registered sink implementations.
///
/// Returns a vector of (name, factory) tuples for all available sinks.
pub fn get_all_implementations() -> Vec<(&'static str, SinkFactory)> {
	use implementations::{log, memory, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Projects transactions to events and forwards them to a sink.
pub struct EventPublisher {
	sink: Box<dyn EventSink>,
}

impl EventPublisher {
	pub fn new(sink: Box<dyn EventSink>) -> Self {
		Self { sink }
	}

	/// Publishes the event derived from `tx`, keyed by its user id.
	///
	/// Fire-and-forget: serialization and sink failures are logged and the
	/// event is dropped.
	pub async fn publish(&self, tx: &Transaction) {
		let event = Event::from(tx);

		let payload = match serde_json::to_vec(&event) {
			Ok(payload) => payload,
			Err(e) => {
				tracing::error!(
					chain = %tx.chain,
					tx_hash = %truncate_id(&tx.tx_hash),
					error = %PublishError::Serialization(e.to_string()),
					"Failed to serialize event"
				);
				return;
			},
		};

		match self.sink.send(&tx.user_id, payload).await {
			Ok(()) => {
				tracing::debug!(
					chain = %tx.chain,
					user_id = %tx.user_id,
					tx_hash = %truncate_id(&tx.tx_hash),
					"Published event"
				);
			},
			Err(e) => {
				tracing::warn!(
					chain = %tx.chain,
					user_id = %tx.user_id,
					tx_hash = %truncate_id(&tx.tx_hash),
					error = %e,
					"Dropped event"
				);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemorySink;
	use chrono::TimeZone;
	use monitor_types::Chain;

	struct FailingSink;

	#[async_trait]
	impl EventSink for FailingSink {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(implementations::memory::MemorySinkSchema)
		}

		async fn send(&self, _routing_key: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
			Err(PublishError::Sink("broker unavailable".to_string()))
		}
	}

	fn btc_transaction() -> Transaction {
		Transaction {
			user_id: "1".to_string(),
			chain: Chain::Bitcoin,
			source: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b:0"
				.to_string(),
			destination: None,
			amount: None,
			fees: None,
			timestamp: chrono::Utc.timestamp_opt(1_231_006_505, 0).unwrap(),
			tx_hash: "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098"
				.to_string(),
			block_ref: 2_083_236_893,
		}
	}

	#[tokio::test]
	async fn test_publish_keys_by_user_and_strips_identity() {
		let sink = MemorySink::new(None);
		let publisher = EventPublisher::new(Box::new(sink.clone()));

		publisher.publish(&btc_transaction()).await;

		let records = sink.records().await;
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].routing_key, "1");

		let payload: serde_json::Value = serde_json::from_slice(&records[0].payload).unwrap();
		let object = payload.as_object().unwrap();
		assert!(!object.contains_key("userId"));
		assert!(!object.contains_key("chain"));
		assert_eq!(object["source"], btc_transaction().source);
		assert_eq!(object["destination"], "");
	}

	#[tokio::test]
	async fn test_sink_failure_is_swallowed() {
		let publisher = EventPublisher::new(Box::new(FailingSink));
		// Must return normally
		publisher.publish(&btc_transaction()).await;
	}
}
