//! Ethereum node access over a WebSocket provider.

use super::{EthBlock, EthHeader, EthereumSource, HeaderStream};
use crate::WatcherError;
use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use async_trait::async_trait;
use futures::StreamExt;
use monitor_types::SecretString;
use tokio::sync::OnceCell;

/// Alloy pubsub provider behind the [`EthereumSource`] operations.
///
/// The endpoint URL embeds the API key, so it is held as a secret.
pub struct AlloyWsSource {
	endpoint: SecretString,
	provider: OnceCell<DynProvider>,
}

impl AlloyWsSource {
	pub fn new(endpoint: SecretString) -> Self {
		Self {
			endpoint,
			provider: OnceCell::new(),
		}
	}

	fn provider(&self) -> Result<&DynProvider, WatcherError> {
		self.provider
			.get()
			.ok_or_else(|| WatcherError::Connection("Provider not connected".to_string()))
	}
}

#[async_trait]
impl EthereumSource for AlloyWsSource {
	async fn connect(&self) -> Result<(), WatcherError> {
		self.provider
			.get_or_try_init(|| async {
				let ws = self.endpoint.with_exposed(|url| WsConnect::new(url));
				let provider = ProviderBuilder::new()
					.connect_ws(ws)
					.await
					// Transport errors may echo the URL, which carries the key
					.map_err(|_| {
						WatcherError::Connection("Failed to open WebSocket connection".to_string())
					})?;
				Ok::<_, WatcherError>(provider.erased())
			})
			.await?;
		Ok(())
	}

	async fn subscribe_headers(&self) -> Result<HeaderStream, WatcherError> {
		let subscription = self
			.provider()?
			.subscribe_blocks()
			.await
			.map_err(|e| WatcherError::Subscription(format!("Failed to subscribe: {}", e)))?;

		// Dropping the stream drops the subscription handle, which unsubscribes
		let headers = subscription.into_stream().map(|header| {
			Ok(EthHeader {
				number: header.inner.number,
				hash: header.hash,
			})
		});
		Ok(Box::pin(headers))
	}

	async fn block_by_hash(&self, hash: B256) -> Result<EthBlock, WatcherError> {
		let block = self
			.provider()?
			.get_block_by_hash(hash)
			.full()
			.await
			.map_err(|e| WatcherError::Fetch(format!("Failed to fetch block {}: {}", hash, e)))?
			.ok_or_else(|| WatcherError::Fetch(format!("Block {} not found", hash)))?;

		let transactions = block
			.transactions
			.into_transactions()
			.map(|tx| tx.inner.into_inner())
			.collect();

		Ok(EthBlock {
			number: block.header.inner.number,
			hash: block.header.hash,
			timestamp: block.header.inner.timestamp,
			transactions,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_calls_before_connect_fail() {
		let source = AlloyWsSource::new(SecretString::from("ws://127.0.0.1:1"));
		assert!(matches!(
			source.subscribe_headers().await,
			Err(WatcherError::Connection(_))
		));
		assert!(matches!(
			source.block_by_hash(B256::ZERO).await,
			Err(WatcherError::Connection(_))
		));
	}
}
