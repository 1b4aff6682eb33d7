//! Registry trait for self-registering implementations.
//!
//! Watchers and sinks declare the name they are configured under together
//! with the factory that builds them, so the service binary can wire every
//! available implementation without naming each one.

/// Base trait for implementation registries.
///
/// Each implementation module (a watcher, a sink) provides a `Registry`
/// struct implementing this trait.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This matches the key in the TOML configuration, for example
	/// `bitcoin` for `[watchers.implementations.bitcoin]` or `webhook` for
	/// `[publisher.implementations.webhook]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
