//! Main entry point for the multi-chain address monitor.
//!
//! Loads the configuration, seeds the address registry with the configured
//! users, starts one watcher per configured chain and publishes an event for
//! every transaction touching a registered address until interrupted.

use clap::Parser;
use monitor_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod factory_registry;

use factory_registry::build_monitor_from_config;

/// Command-line arguments for the monitor service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "MONITOR_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started monitor");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.monitor.id);

	let engine = Arc::new(build_monitor_from_config(config)?);
	engine.initialize().await?;

	let mut run = {
		let engine = Arc::clone(&engine);
		tokio::spawn(async move { engine.run().await })
	};

	let exits = tokio::select! {
		result = &mut run => result??,
		signal = tokio::signal::ctrl_c() => {
			if let Err(e) = signal {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
			engine.shutdown().await;
			run.await??
		}
	};

	for exit in &exits {
		if exit.is_clean() {
			tracing::info!("{}", exit);
		} else {
			tracing::warn!("{}", exit);
		}
	}

	tracing::info!("Stopped monitor");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["monitor"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["monitor", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_and_seed_from_file() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(
			&path,
			r#"
[monitor]
id = "file-test"

[watchers.implementations.bitcoin]
rpc_url = "http://localhost:8332"

[publisher]
primary = "memory"
[publisher.implementations.memory]

[[users]]
id = "1"
btc = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b:0"
eth = "0x1234567890123456789012345678901234567890"
"#,
		)
		.unwrap();

		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		let engine = build_monitor_from_config(config).unwrap();
		engine.initialize().await.unwrap();

		assert_eq!(engine.config().monitor.id, "file-test");
		assert_eq!(engine.registry().user_count().await, 1);
		assert_eq!(engine.registry().addresses_for("1").await.unwrap().len(), 2);
	}
}
