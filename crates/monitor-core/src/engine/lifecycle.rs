//! Lifecycle management for the monitor engine.
//!
//! Seeds the registry before the watchers start and signals them to stop.

use super::{EngineError, MonitorEngine};

impl MonitorEngine {
	/// Applies the `[[users]]` registrations from configuration.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(monitor_id = %self.config.monitor.id, "Initializing monitor engine");

		for user in &self.config.users {
			self.registry
				.register_chain_addresses(&user.id, user.addresses())
				.await
				.map_err(|e| EngineError::Config(format!("User '{}': {}", user.id, e)))?;
		}

		tracing::info!(users = self.config.users.len(), "Seeded address registry");
		Ok(())
	}

	/// Asks every running watcher to stop.
	///
	/// Returns immediately. `run` returns once all watchers have exited.
	pub async fn shutdown(&self) {
		tracing::info!("Shutting down monitor engine");
		self.shutdown.send_replace(true);
	}
}
