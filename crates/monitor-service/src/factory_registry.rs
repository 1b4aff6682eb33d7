//! Factory registry for monitor implementations.
//!
//! Collects every watcher and sink factory the linked crates provide, so the
//! engine can be built from configuration names alone.

use monitor_config::Config;
use monitor_core::{MonitorBuilder, MonitorEngine, MonitorFactories};
use monitor_publisher::SinkFactory;
use monitor_watcher::WatcherFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub watchers: HashMap<String, WatcherFactory>,
	pub sinks: HashMap<String, SinkFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			watchers: HashMap::new(),
			sinks: HashMap::new(),
		}
	}

	pub fn register_watcher(&mut self, name: impl Into<String>, factory: WatcherFactory) {
		self.watchers.insert(name.into(), factory);
	}

	pub fn register_sink(&mut self, name: impl Into<String>, factory: SinkFactory) {
		self.sinks.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in monitor_watcher::get_all_implementations() {
			tracing::debug!("Registering watcher implementation: {}", name);
			registry.register_watcher(name, factory);
		}

		for (name, factory) in monitor_publisher::get_all_implementations() {
			tracing::debug!("Registering sink implementation: {}", name);
			registry.register_sink(name, factory);
		}

		registry
	})
}

/// Picks the factories named in `config_impls` out of `available`.
macro_rules! build_factories {
	($available:expr, $config_impls:expr, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $available.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $available.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the monitor engine from configuration using the global registry.
pub fn build_monitor_from_config(
	config: Config,
) -> Result<MonitorEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let watcher_factories =
		build_factories!(registry.watchers, config.watchers.implementations, "watcher");
	let sink_factories =
		build_factories!(registry.sinks, config.publisher.implementations, "publisher");

	let factories = MonitorFactories {
		watcher_factories,
		sink_factories,
	};

	Ok(MonitorBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_registry_contains_all_implementations() {
		let registry = get_registry();
		for name in ["bitcoin", "ethereum", "solana"] {
			assert!(registry.watchers.contains_key(name), "missing watcher {}", name);
		}
		for name in ["log", "memory", "webhook"] {
			assert!(registry.sinks.contains_key(name), "missing sink {}", name);
		}
	}

	#[test]
	fn test_unknown_sink_reported_with_alternatives() {
		let config: Config = r#"
[monitor]
id = "x"

[watchers.implementations.solana]

[publisher]
primary = "log"
[publisher.implementations.log]
[publisher.implementations.kafka]
"#
		.parse()
		.unwrap();

		let err = build_monitor_from_config(config).err().unwrap();
		let message = err.to_string();
		assert!(message.contains("Unknown publisher implementation 'kafka'"));
		assert!(message.contains("log, memory, webhook"));
	}
}
