//! Builder for constructing monitor engines.
//!
//! Composes a [`MonitorEngine`] from factory functions keyed by the names
//! used in configuration: one sink for the publisher and one watcher per
//! configured chain.

use crate::engine::MonitorEngine;
use monitor_config::Config;
use monitor_publisher::{EventPublisher, EventSink, PublishError};
use monitor_registry::AddressRegistry;
use monitor_watcher::{ChainWatcher, WatcherError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, by implementation name.
pub struct MonitorFactories<WF, SF> {
	pub watcher_factories: HashMap<String, WF>,
	pub sink_factories: HashMap<String, SF>,
}

/// Builder for a [`MonitorEngine`] with pluggable watchers and sink.
pub struct MonitorBuilder {
	config: Config,
	registry: Option<Arc<AddressRegistry>>,
}

impl MonitorBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			registry: None,
		}
	}

	/// Uses an existing registry instead of creating an empty one.
	pub fn with_registry(mut self, registry: Arc<AddressRegistry>) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Builds the engine.
	///
	/// Every configured watcher must have a factory. Each built component
	/// checks its table against its own schema as well. Only the primary
	/// sink is built; other configured sinks are ignored.
	pub fn build<WF, SF>(self, factories: MonitorFactories<WF, SF>) -> Result<MonitorEngine, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn ChainWatcher>, WatcherError>,
		SF: Fn(&toml::Value) -> Result<Box<dyn EventSink>, PublishError>,
	{
		// Publisher
		let primary = &self.config.publisher.primary;
		let sink_config = self
			.config
			.publisher
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!("Primary publisher '{}' is not configured", primary))
			})?;
		let sink_factory = factories.sink_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("publisher implementation '{}'", primary))
		})?;
		let sink = sink_factory(sink_config).map_err(|e| {
			tracing::error!(
				component = "publisher",
				implementation = %primary,
				error = %e,
				"Failed to create publisher implementation"
			);
			BuilderError::Config(format!(
				"Failed to create publisher implementation '{}': {}",
				primary, e
			))
		})?;
		sink.config_schema().validate(sink_config).map_err(|e| {
			BuilderError::Config(format!(
				"Invalid configuration for publisher implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "publisher", implementation = %primary, "Loaded");
		let publisher = Arc::new(EventPublisher::new(sink));

		// Watchers, in name order so startup logs are stable
		let mut names: Vec<&String> = self.config.watchers.implementations.keys().collect();
		names.sort();

		let mut watchers = Vec::with_capacity(names.len());
		for name in names {
			let config = &self.config.watchers.implementations[name];
			let factory = factories.watcher_factories.get(name).ok_or_else(|| {
				let mut available: Vec<_> = factories.watcher_factories.keys().cloned().collect();
				available.sort();
				BuilderError::MissingComponent(format!(
					"watcher implementation '{}'. Available: [{}]",
					name,
					available.join(", ")
				))
			})?;

			match factory(config) {
				Ok(watcher) => {
					watcher.config_schema().validate(config).map_err(|e| {
						BuilderError::Config(format!(
							"Invalid configuration for watcher implementation '{}': {}",
							name, e
						))
					})?;
					tracing::info!(
						component = "watcher",
						implementation = %name,
						chain = %watcher.chain(),
						"Loaded"
					);
					watchers.push((name.clone(), watcher));
				},
				Err(e) => {
					tracing::error!(
						component = "watcher",
						implementation = %name,
						error = %e,
						"Failed to create watcher implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create watcher implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let registry = self
			.registry
			.unwrap_or_else(|| Arc::new(AddressRegistry::new()));

		Ok(MonitorEngine::new(self.config, registry, publisher, watchers))
	}
}
