//! Bitcoin Core JSON-RPC client over HTTP.

use super::BitcoinSource;
use crate::WatcherError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bitcoin::{Block, BlockHash};
use monitor_types::SecretString;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
	result: Option<T>,
	error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
	code: i64,
	message: String,
}

/// Minimal Bitcoin Core client covering the calls the watcher makes.
pub struct BitcoinRpc {
	url: String,
	client: Client,
	/// Basic auth credentials, already encoded.
	auth: Option<SecretString>,
}

impl BitcoinRpc {
	pub fn new(url: &str, user: &str, api_key: &SecretString) -> Self {
		let auth = (!api_key.is_empty()).then(|| {
			api_key.with_exposed(|key| SecretString::new(STANDARD.encode(format!("{user}:{key}"))))
		});
		Self {
			url: url.to_string(),
			client: Client::new(),
			auth,
		}
	}

	async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Option<T>, String> {
		let body = json!({
			"jsonrpc": "1.0",
			"id": "monitor",
			"method": method,
			"params": params,
		});

		let mut request = self.client.post(&self.url).json(&body);
		if let Some(auth) = &self.auth {
			request = request.header(
				reqwest::header::AUTHORIZATION,
				auth.with_exposed(|encoded| format!("Basic {encoded}")),
			);
		}

		let response = request
			.send()
			.await
			.map_err(|e| format!("{method}: HTTP error: {e}"))?;
		// Bitcoin Core reports RPC errors with a 500 status and a JSON body
		let response: RpcResponse<T> = response
			.json()
			.await
			.map_err(|e| format!("{method}: invalid response: {e}"))?;

		if let Some(err) = response.error {
			return Err(format!("{method}: RPC error {}: {}", err.code, err.message));
		}
		Ok(response.result)
	}

	async fn call_required<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<T, String> {
		self.call(method, params)
			.await?
			.ok_or_else(|| format!("{method}: empty result"))
	}
}

#[async_trait]
impl BitcoinSource for BitcoinRpc {
	async fn ping(&self) -> Result<(), WatcherError> {
		self.call::<Value>("ping", vec![])
			.await
			.map(|_| ())
			.map_err(WatcherError::Connection)
	}

	async fn block_count(&self) -> Result<u64, WatcherError> {
		self.call_required("getblockcount", vec![])
			.await
			.map_err(WatcherError::Fetch)
	}

	async fn best_block_hash(&self) -> Result<BlockHash, WatcherError> {
		let hash: String = self
			.call_required("getbestblockhash", vec![])
			.await
			.map_err(WatcherError::Fetch)?;
		hash.parse()
			.map_err(|e| WatcherError::Fetch(format!("Invalid block hash {}: {}", hash, e)))
	}

	async fn block(&self, hash: &BlockHash) -> Result<Block, WatcherError> {
		let raw: String = self
			.call_required("getblock", vec![json!(hash.to_string()), json!(0)])
			.await
			.map_err(WatcherError::Fetch)?;
		let bytes = hex::decode(raw)
			.map_err(|e| WatcherError::Fetch(format!("Invalid block hex for {}: {}", hash, e)))?;
		bitcoin::consensus::deserialize(&bytes)
			.map_err(|e| WatcherError::Fetch(format!("Failed to decode block {}: {}", hash, e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_auth_only_with_key() {
		let rpc = BitcoinRpc::new("http://localhost:8332", "blockdaemon", &SecretString::from(""));
		assert!(rpc.auth.is_none());

		let rpc = BitcoinRpc::new("http://localhost:8332", "user", &SecretString::from("pass"));
		let encoded = rpc.auth.unwrap();
		assert_eq!(encoded.expose_secret(), STANDARD.encode("user:pass"));
	}

	#[test]
	fn test_rpc_error_object_parses() {
		let response: RpcResponse<String> = serde_json::from_str(
			r#"{"result":null,"error":{"code":-5,"message":"Block not found"},"id":"monitor"}"#,
		)
		.unwrap();
		assert!(response.result.is_none());
		assert_eq!(response.error.unwrap().code, -5);
	}

	#[tokio::test]
	async fn test_unreachable_node_is_connection_error() {
		let rpc = BitcoinRpc::new("http://127.0.0.1:1", "user", &SecretString::from("pass"));
		assert!(matches!(rpc.ping().await, Err(WatcherError::Connection(_))));
	}
}
