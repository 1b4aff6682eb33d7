//! Core supervisor for the multi-chain address monitor.
//!
//! Wires the address registry, the event publisher and the configured chain
//! watchers into a [`MonitorEngine`], runs every watcher as its own task
//! against a shared shutdown signal and records how each one ended.

pub mod builder;
pub mod engine;

pub use builder::{BuilderError, MonitorBuilder, MonitorFactories};
pub use engine::{EngineError, MonitorEngine, WatcherExit};
