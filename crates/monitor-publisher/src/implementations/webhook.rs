//! HTTP webhook sink.
//!
//! POSTs each event body to a fixed URL with the routing key in the
//! `X-Routing-Key` header. Non-success responses are reported as sink
//! errors; there is no retry.

use crate::{EventSink, PublishError};
use async_trait::async_trait;
use monitor_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use reqwest::Client;
use std::time::Duration;

const ROUTING_KEY_HEADER: &str = "X-Routing-Key";
const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Webhook-backed sink.
pub struct WebhookSink {
	client: Client,
	url: String,
}

impl WebhookSink {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| PublishError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
		})
	}
}

/// Configuration schema for [`WebhookSink`].
pub struct WebhookSinkSchema;

impl ConfigSchema for WebhookSinkSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url(&["http", "https"]))],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl EventSink for WebhookSink {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookSinkSchema)
	}

	async fn send(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
		let response = self
			.client
			.post(&self.url)
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.header(ROUTING_KEY_HEADER, routing_key)
			.body(payload)
			.send()
			.await
			.map_err(|e| PublishError::Sink(format!("Webhook request failed: {}", e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(PublishError::Sink(format!(
				"Webhook returned status {}",
				status
			)));
		}
		Ok(())
	}
}

/// Factory function to create a webhook sink from configuration.
///
/// Configuration parameters:
/// - `url`: http or https endpoint receiving events
/// - `timeout_seconds`: request timeout (default 5)
pub fn create_sink(config: &toml::Value) -> Result<Box<dyn EventSink>, PublishError> {
	WebhookSinkSchema
		.validate(config)
		.map_err(|e| PublishError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| PublishError::Configuration("url is required".to_string()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|t| t as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(WebhookSink::new(url, Duration::from_secs(timeout))?))
}

/// Registry for the webhook sink implementation.
pub struct Registry;

impl monitor_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
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
	fn test_requires_http_url() {
		let config: toml::Value = toml::from_str(r#"url = "ws://hooks.example.com""#).unwrap();
		assert!(create_sink(&config).is_err());

		let config: toml::Value = toml::from_str(
			r#"
url = "https://hooks.example.com/events"
timeout_seconds = 10
"#,
		)
		.unwrap();
		assert!(create_sink(&config).is_ok());
	}

	#[tokio::test]
	async fn test_unreachable_endpoint_is_sink_error() {
		let sink = WebhookSink::new("http://127.0.0.1:1/events", Duration::from_secs(1)).unwrap();
		let err = sink.send("1", b"{}".to_vec()).await.unwrap_err();
		assert!(matches!(err, PublishError::Sink(_)));
	}
}
