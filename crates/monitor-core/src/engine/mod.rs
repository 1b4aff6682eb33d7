//! Supervisor that runs the chain watchers.
//!
//! Each watcher gets its own task and its own [`WatchContext`]. All contexts
//! share the registry, the publisher, one error-reporting channel and one
//! shutdown flag. A watcher that fails is recorded and left stopped; the
//! others keep running.

pub mod lifecycle;

use monitor_config::Config;
use monitor_publisher::EventPublisher;
use monitor_registry::AddressRegistry;
use monitor_types::Chain;
use monitor_watcher::{ChainWatcher, WatchContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	/// `run` was called after the watchers were already started.
	#[error("Engine already started")]
	AlreadyStarted,
}

/// How one watcher ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherExit {
	pub chain: Chain,
	/// Configuration name the watcher was loaded under.
	pub name: String,
	/// `None` for a clean stop after shutdown.
	pub error: Option<String>,
}

impl WatcherExit {
	pub fn is_clean(&self) -> bool {
		self.error.is_none()
	}
}

impl fmt::Display for WatcherExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.error {
			None => write!(f, "{} ({}) stopped", self.name, self.chain),
			Some(e) => write!(f, "{} ({}) failed: {}", self.name, self.chain, e),
		}
	}
}

/// Main monitor engine.
pub struct MonitorEngine {
	/// Monitor configuration.
	pub(crate) config: Config,
	/// Watched addresses, shared with every watcher.
	pub(crate) registry: Arc<AddressRegistry>,
	/// Event sink front, shared with every watcher.
	pub(crate) publisher: Arc<EventPublisher>,
	/// Watchers not yet started, by configuration name.
	watchers: Mutex<Vec<(String, Box<dyn ChainWatcher>)>>,
	/// Shutdown flag observed by every watcher.
	pub(crate) shutdown: watch::Sender<bool>,
}

impl MonitorEngine {
	pub fn new(
		config: Config,
		registry: Arc<AddressRegistry>,
		publisher: Arc<EventPublisher>,
		watchers: Vec<(String, Box<dyn ChainWatcher>)>,
	) -> Self {
		let (shutdown, _) = watch::channel(false);
		Self {
			config,
			registry,
			publisher,
			watchers: Mutex::new(watchers),
			shutdown,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The registry watchers read from. Registering through this handle is
	/// the mutation entrypoint for callers outside the engine.
	pub fn registry(&self) -> &Arc<AddressRegistry> {
		&self.registry
	}

	/// Starts every watcher and waits until all of them have exited.
	///
	/// Returns one [`WatcherExit`] per watcher in the order they ended.
	/// Watchers are never restarted. Errors watchers report while running
	/// are drained into the log.
	pub async fn run(&self) -> Result<Vec<WatcherExit>, EngineError> {
		let watchers = std::mem::take(&mut *self.watchers.lock().await);
		if watchers.is_empty() {
			return Err(EngineError::AlreadyStarted);
		}

		let (errors_tx, mut errors_rx) = mpsc::unbounded_channel::<String>();
		let drain = tokio::spawn(async move {
			while let Some(message) = errors_rx.recv().await {
				tracing::error!(error = %message, "Watcher reported error");
			}
		});

		let mut tasks = JoinSet::new();
		let mut identities = HashMap::new();
		for (name, watcher) in watchers {
			let chain = watcher.chain();
			let ctx = WatchContext {
				registry: self.registry.clone(),
				publisher: self.publisher.clone(),
				errors: errors_tx.clone(),
				shutdown: self.shutdown.subscribe(),
			};

			tracing::info!(chain = %chain, watcher = %name, "Starting watcher");
			let handle = tasks.spawn(async move { watcher.monitor(ctx).await });
			identities.insert(handle.id(), (chain, name));
		}
		// Only watcher contexts hold senders now, so the drain ends with them
		drop(errors_tx);

		let mut exits = Vec::with_capacity(identities.len());
		while let Some(joined) = tasks.join_next_with_id().await {
			let (id, error) = match joined {
				Ok((id, Ok(()))) => (id, None),
				Ok((id, Err(e))) => (id, Some(e.to_string())),
				Err(e) => (e.id(), Some(format!("Watcher task aborted: {}", e))),
			};
			let Some((chain, name)) = identities.remove(&id) else {
				continue;
			};

			let exit = WatcherExit { chain, name, error };
			match &exit.error {
				None => tracing::info!(chain = %exit.chain, watcher = %exit.name, "Watcher stopped"),
				Some(e) => {
					tracing::error!(chain = %exit.chain, watcher = %exit.name, error = %e, "Watcher failed")
				},
			}
			exits.push(exit);
		}

		if let Err(e) = drain.await {
			tracing::warn!(error = %e, "Error drain task ended abnormally");
		}

		Ok(exits)
	}
}
