//! In-memory sink.
//!
//! Keeps every delivered record in a queue that can be inspected later.
//! Handles are cheap clones sharing the same queue, so a test can keep one
//! while the publisher owns another.

use crate::{EventSink, PublishError};
use async_trait::async_trait;
use monitor_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
	pub routing_key: String,
	pub payload: Vec<u8>,
}

/// Queue-backed sink. When `capacity` is set, the oldest record is evicted
/// once the queue is full.
#[derive(Debug, Clone)]
pub struct MemorySink {
	records: Arc<Mutex<VecDeque<SinkRecord>>>,
	capacity: Option<usize>,
}

impl MemorySink {
	pub fn new(capacity: Option<usize>) -> Self {
		Self {
			records: Arc::new(Mutex::new(VecDeque::new())),
			capacity,
		}
	}

	/// Returns a copy of every record currently held, oldest first.
	pub async fn records(&self) -> Vec<SinkRecord> {
		self.records.lock().await.iter().cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.records.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.records.lock().await.is_empty()
	}
}

/// Configuration schema for [`MemorySink`].
pub struct MemorySinkSchema;

impl ConfigSchema for MemorySinkSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"capacity",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl EventSink for MemorySink {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemorySinkSchema)
	}

	async fn send(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
		let mut records = self.records.lock().await;
		if let Some(capacity) = self.capacity {
			while records.len() >= capacity {
				records.pop_front();
			}
		}
		records.push_back(SinkRecord {
			routing_key: routing_key.to_string(),
			payload,
		});
		Ok(())
	}
}

/// Factory function to create a memory sink from configuration.
///
/// Configuration parameters:
/// - `capacity`: optional maximum number of retained records
pub fn create_sink(config: &toml::Value) -> Result<Box<dyn EventSink>, PublishError> {
	MemorySinkSchema
		.validate(config)
		.map_err(|e| PublishError::Configuration(format!("Invalid configuration: {}", e)))?;

	let capacity = config
		.get("capacity")
		.and_then(|v| v.as_integer())
		.map(|c| c as usize);

	Ok(Box::new(MemorySink::new(capacity)))
}

/// Registry for the memory sink implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::SinkFactory;

	fn factory() -> Self::Factory {
		create_sink
	}
}

impl crate::SinkRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_records_in_order() {
		let sink = MemorySink::new(None);
		sink.send("1", b"a".to_vec()).await.unwrap();
		sink.send("2", b"b".to_vec()).await.unwrap();

		let records = sink.records().await;
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].routing_key, "1");
		assert_eq!(records[1].payload, b"b".to_vec());
	}

	#[tokio::test]
	async fn test_capacity_evicts_oldest() {
		let sink = MemorySink::new(Some(2));
		for key in ["1", "2", "3"] {
			sink.send(key, Vec::new()).await.unwrap();
		}

		let keys: Vec<String> = sink
			.records()
			.await
			.into_iter()
			.map(|r| r.routing_key)
			.collect();
		assert_eq!(keys, vec!["2", "3"]);
	}

	#[test]
	fn test_zero_capacity_rejected() {
		let config: toml::Value = toml::from_str("capacity = 0").unwrap();
		assert!(create_sink(&config).is_err());
	}
}
