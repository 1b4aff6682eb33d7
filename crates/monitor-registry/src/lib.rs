//! Address registry for the multi-chain monitor.
//!
//! Holds, per user, the set of addresses whose activity should be reported.
//! Every chain watcher reads the registry once per scanned block while an
//! external control surface replaces users' address sets. The whole map sits
//! behind one multi-reader/single-writer lock: readers never block each
//! other and a scan never observes a half-applied registration.
//!
//! Addresses carry no chain tag. An address string registered for one user
//! matches on every chain where that exact string appears.

use monitor_types::ChainAddresses;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// The user identifier is empty.
	#[error("User ID cannot be empty")]
	EmptyUserId,
}

type AddressSet = Arc<HashSet<String>>;

/// Mapping from user identifier to watched addresses.
///
/// Only `register*` mutate the map and only `snapshot` exposes it, as an
/// owned copy. No lock guard leaves this type.
#[derive(Debug, Default)]
pub struct AddressRegistry {
	entries: RwLock<BTreeMap<String, AddressSet>>,
}

impl AddressRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the full watched-address set for `user_id`.
	///
	/// The new set is visible to every scan that starts after this call
	/// returns. Registering the same set twice leaves the registry unchanged.
	pub async fn register<I, S>(&self, user_id: &str, addresses: I) -> Result<(), RegistryError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		if user_id.is_empty() {
			return Err(RegistryError::EmptyUserId);
		}

		let set: HashSet<String> = addresses.into_iter().map(Into::into).collect();
		let count = set.len();

		let mut entries = self.entries.write().await;
		entries.insert(user_id.to_string(), Arc::new(set));
		drop(entries);

		tracing::info!(user_id = %user_id, addresses = count, "Registered addresses");
		Ok(())
	}

	/// Registers one address per supported chain for `user_id`.
	///
	/// Empty addresses are skipped. The chain association is not kept.
	pub async fn register_chain_addresses(
		&self,
		user_id: &str,
		addresses: ChainAddresses,
	) -> Result<(), RegistryError> {
		self.register(user_id, addresses.into_addresses()).await
	}

	/// Returns a read-only copy of the whole mapping for one scan pass.
	pub async fn snapshot(&self) -> RegistrySnapshot {
		let entries = self.entries.read().await;
		RegistrySnapshot {
			entries: entries.clone(),
		}
	}

	/// Returns the addresses currently registered for `user_id`.
	pub async fn addresses_for(&self, user_id: &str) -> Option<HashSet<String>> {
		let entries = self.entries.read().await;
		entries.get(user_id).map(|set| set.as_ref().clone())
	}

	/// Number of registered users.
	pub async fn user_count(&self) -> usize {
		self.entries.read().await.len()
	}
}

/// Point-in-time copy of the registry used by one scan.
///
/// Address sets are shared with the registry through `Arc`, so taking a
/// snapshot copies one pointer per user.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
	entries: BTreeMap<String, AddressSet>,
}

impl RegistrySnapshot {
	/// Users whose set contains exactly `address`, in user id order.
	pub fn users_matching<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.entries
			.iter()
			.filter(move |(_, set)| set.contains(address))
			.map(|(user_id, _)| user_id.as_str())
	}

	/// Users whose set contains any of `addresses`.
	///
	/// Each user appears once even if several addresses match.
	pub fn users_matching_any<'a>(
		&'a self,
		addresses: &'a [&'a str],
	) -> impl Iterator<Item = &'a str> + 'a {
		self.entries
			.iter()
			.filter(move |(_, set)| addresses.iter().any(|a| set.contains(*a)))
			.map(|(user_id, _)| user_id.as_str())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}
}
