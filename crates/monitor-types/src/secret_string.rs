//! Redacting string wrapper for node credentials.
//!
//! Chain data sources authenticate with provider API keys that end up in
//! configuration and, for WebSocket endpoints, inside the connection URL.
//! `SecretString` keeps them out of logs and zeroes them on drop.

use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A string that is zeroed on drop and never printed.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(secret: String) -> Self {
		Self(Zeroizing::new(secret))
	}

	/// Raw value. Never log it.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	/// Builds a value from the secret, e.g. an auth header or a keyed URL.
	pub fn with_exposed<R>(&self, build: impl FnOnce(&str) -> R) -> R {
		build(self.0.as_str())
	}

	/// True when no key was configured.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({REDACTED})")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(secret: String) -> Self {
		Self::new(secret)
	}
}

impl From<&str> for SecretString {
	fn from(secret: &str) -> Self {
		Self::new(secret.to_owned())
	}
}
