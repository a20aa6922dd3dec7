//! Remote chain access: the [`ChainClient`] seam and its JSON-RPC implementation.

use crate::transaction::SignedTransaction;
use async_trait::async_trait;
use faucet_common::Address;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The remote calls a dispatch needs from the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Transaction count of `address` including pending transactions.
    async fn pending_nonce_at(&self, address: &Address) -> Result<u64, RpcError>;

    async fn suggest_gas_price(&self) -> Result<u128, RpcError>;

    async fn send_transaction(&self, transaction: &SignedTransaction) -> Result<(), RpcError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC 2.0 client for an Ethereum-compatible node.
pub struct JsonRpcClient {
    rpc_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        debug!(method, id, "rpc call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            RpcError::InvalidResponse(format!("{method} returned undecodable body (http {status}): {e}"))
        })?;

        if let Some(error) = body.error {
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        match body.result {
            Some(Value::Null) | None => Err(RpcError::InvalidResponse(format!("{method} returned no result"))),
            Some(result) => Ok(result),
        }
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&result).and_then(narrow_u64)
    }

    async fn pending_nonce_at(&self, address: &Address) -> Result<u64, RpcError> {
        let result = self
            .call("eth_getTransactionCount", json!([address.to_string(), "pending"]))
            .await?;
        parse_quantity(&result).and_then(narrow_u64)
    }

    async fn suggest_gas_price(&self) -> Result<u128, RpcError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    async fn send_transaction(&self, transaction: &SignedTransaction) -> Result<(), RpcError> {
        let result = self
            .call("eth_sendRawTransaction", json!([transaction.raw_hex()]))
            .await?;
        debug!(hash = %transaction.hash(), node_hash = %result, "transaction accepted by node");
        Ok(())
    }
}

/// Parses a JSON-RPC hex quantity such as `"0x1a"`.
pub fn parse_quantity(value: &Value) -> Result<u128, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex string, got {value}")))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("quantity {text:?} lacks 0x prefix")))?;
    if digits.is_empty() {
        return Err(RpcError::InvalidResponse("empty quantity".to_string()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("quantity {text:?}: {e}")))
}

fn narrow_u64(value: u128) -> Result<u64, RpcError> {
    u64::try_from(value).map_err(|_| RpcError::InvalidResponse(format!("quantity {value} exceeds u64")))
}
