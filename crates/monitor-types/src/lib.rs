//! Common types module for the multi-chain address monitor.
//!
//! This module defines the data types shared by every monitor component:
//! the supported chains, the canonical transaction record produced by the
//! watchers, the reduced event payload handed to the sink, and the
//! configuration validation framework used by pluggable implementations.

/// Supported blockchain networks.
pub mod chain;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Secure string type for node API keys and other secrets.
pub mod secret_string;
/// Canonical transaction and wire event types.
pub mod transaction;
/// Utility functions for log formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use chain::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use transaction::*;
pub use utils::truncate_id;
pub use validation::*;
