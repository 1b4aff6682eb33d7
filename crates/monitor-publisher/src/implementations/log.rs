//! Sink that writes events to the tracing output.
//!
//! Useful for local runs without a broker. Each event becomes one log line
//! carrying the topic, routing key and JSON body.

use crate::{EventSink, PublishError};
use async_trait::async_trait;
use monitor_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};

const DEFAULT_TOPIC: &str = "transactions";

/// Log-backed sink.
pub struct LogSink {
	topic: String,
}

impl LogSink {
	pub fn new(topic: impl Into<String>) -> Self {
		Self {
			topic: topic.into(),
		}
	}
}

/// Configuration schema for [`LogSink`].
pub struct LogSinkSchema;

impl ConfigSchema for LogSinkSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![Field::new("topic", FieldType::String)
			.with_validator(|value| match value.as_str() {
				Some("") => Err("Topic cannot be empty".to_string()),
				_ => Ok(()),
			})]);
		schema.validate(config)
	}
}

#[async_trait]
impl EventSink for LogSink {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogSinkSchema)
	}

	async fn send(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
		let body =
			String::from_utf8(payload).map_err(|e| PublishError::Sink(e.to_string()))?;
		tracing::info!(
			topic = %self.topic,
			routing_key = %routing_key,
			event = %body,
			"Transaction event"
		);
		Ok(())
	}
}

/// Factory function to create a log sink from configuration.
///
/// Configuration parameters:
/// - `topic`: label attached to every line (default "transactions")
pub fn create_sink(config: &toml::Value) -> Result<Box<dyn EventSink>, PublishError> {
	LogSinkSchema
		.validate(config)
		.map_err(|e| PublishError::Configuration(format!("Invalid configuration: {}", e)))?;

	let topic = config
		.get("topic")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_TOPIC);

	Ok(Box::new(LogSink::new(topic)))
}

/// Registry for the log sink implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = crate::SinkFactory;

	fn factory() -> Self::Factory {
		create_sink
	}
}

impl crate::SinkRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_topic() {
		let config = toml::Value::Table(toml::map::Map::new());
		assert!(create_sink(&config).is_ok());
	}

	#[test]
	fn test_empty_topic_rejected() {
		let config: toml::Value = toml::from_str(r#"topic = """#).unwrap();
		let err = create_sink(&config).err().unwrap();
		assert!(matches!(err, PublishError::Configuration(_)));
	}

	#[tokio::test]
	async fn test_send_rejects_non_utf8() {
		let sink = LogSink::new("transactions");
		assert!(sink.send("1", b"{}".to_vec()).await.is_ok());
		assert!(sink.send("1", vec![0xff, 0xfe]).await.is_err());
	}
}
