//! Configuration module for the multi-chain address monitor.
//!
//! Loads the monitor configuration from TOML, resolving `${VAR}` references
//! against the environment and validating the result before any watcher is
//! built.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["watchers.toml", "users.toml"]` to include other files
//! - Each top-level section must be unique across all files

mod loader;

use monitor_types::ChainAddresses;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this monitor instance.
	pub monitor: MonitorConfig,
	/// Chain watchers to run.
	pub watchers: WatchersConfig,
	/// Event sink configuration.
	pub publisher: PublisherConfig,
	/// Address registrations applied at startup.
	#[serde(default)]
	pub users: Vec<UserConfig>,
}

/// Configuration specific to the monitor instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Configuration for chain watchers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchersConfig {
	/// Map of watcher implementation names to their raw configurations.
	/// Each watcher validates its own table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the event publisher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
	/// Which sink implementation receives events.
	pub primary: String,
	/// Map of sink implementation names to their raw configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// A user registered at startup with one address per chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
	pub id: String,
	#[serde(default)]
	pub btc: String,
	#[serde(default)]
	pub eth: String,
	#[serde(default)]
	pub sol: String,
}

impl UserConfig {
	/// Returns this user's addresses in registration form.
	pub fn addresses(&self) -> ChainAddresses {
		ChainAddresses {
			btc: self.btc.clone(),
			eth: self.eth.clone(),
			sol: self.sol.clone(),
		}
	}
}

/// Largest configuration file accepted, in bytes.
const MAX_CONFIG_SIZE: usize = 1024 * 1024;

/// `${NAME}` or `${NAME:-default}`.
static ENV_REFERENCE: LazyLock<Result<Regex, regex::Error>> =
	LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}"));

/// Substitutes `${NAME}` and `${NAME:-default}` references with values from
/// the environment. A reference without a default to an unset variable is
/// an error.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_CONFIG_SIZE
		)));
	}
	let pattern = ENV_REFERENCE
		.as_ref()
		.map_err(|e| ConfigError::Parse(format!("Invalid env reference pattern: {}", e)))?;

	let mut unset = None;
	let resolved = pattern.replace_all(input, |caps: &Captures| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				unset.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match unset {
		Some(name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration:
	/// - Monitor ID is not empty
	/// - At least one watcher is configured
	/// - The primary publisher names a configured sink
	/// - User IDs are non-empty, unique, and carry at least one address
	fn validate(&self) -> Result<(), ConfigError> {
		if self.monitor.id.is_empty() {
			return Err(ConfigError::Validation("Monitor ID cannot be empty".into()));
		}

		if self.watchers.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one watcher implementation required".into(),
			));
		}

		if self.publisher.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Publisher primary implementation cannot be empty".into(),
			));
		}
		if !self
			.publisher
			.implementations
			.contains_key(&self.publisher.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary publisher '{}' not found in implementations",
				self.publisher.primary
			)));
		}

		let mut seen = HashSet::new();
		for user in &self.users {
			if user.id.is_empty() {
				return Err(ConfigError::Validation("User ID cannot be empty".into()));
			}
			if !seen.insert(user.id.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate user '{}' in users",
					user.id
				)));
			}
			if user.btc.is_empty() && user.eth.is_empty() && user.sol.is_empty() {
				return Err(ConfigError::Validation(format!(
					"User '{}' must have at least one address",
					user.id
				)));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating
/// the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
