//! `HttpRpcClient` — the production JSON-RPC transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use depinchat_types::config::ClientConfig;
use depinchat_types::{Address, DepinError, PoolInfo, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DepinAddressEntry, NodeRpc, PubkeyInfo, ReceiveResult, SubmitResult};

/// Default per-request timeout.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// HttpRpcClient
// ---------------------------------------------------------------------------

/// JSON-RPC client over `reqwest`.
///
/// The inner `reqwest::Client` sits behind a mutex only so
/// [`NodeRpc::reconnect`] can swap it for a fresh one; every call
/// clones the cheap handle out before awaiting.
pub struct HttpRpcClient {
    endpoint: String,
    auth: Option<(String, String)>,
    timeout: Duration,
    http: Mutex<reqwest::Client>,
    connected: AtomicBool,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Builds a client from the loaded config.
    pub fn from_config(config: &ClientConfig) -> Self {
        let auth = config
            .rpc_username
            .as_ref()
            .map(|user| (user.clone(), config.rpc_password.clone().unwrap_or_default()));
        Self::new(&config.rpc_url, auth, RPC_TIMEOUT)
    }

    /// Builds a client for an explicit endpoint. `/rpc` is appended
    /// when the URL does not already end in it.
    pub fn new(rpc_url: &str, auth: Option<(String, String)>, timeout: Duration) -> Self {
        Self {
            endpoint: normalize_endpoint(rpc_url),
            auth,
            timeout,
            http: Mutex::new(build_http(timeout)),
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    fn handle(&self) -> reqwest::Client {
        self.http.lock().expect("http handle lock poisoned").clone()
    }

    fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::Relaxed);
    }

    /// One JSON-RPC round trip. Flips the connected flag on both
    /// outcomes and decodes the `result` member into `R`.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R> {
        let raw = self.call_raw(method, params).await?;
        serde_json::from_value(raw).map_err(|e| DepinError::Rpc {
            message: format!("{method}: malformed result: {e}"),
        })
    }

    async fn call_raw(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.handle().post(&self.endpoint).json(&request);
        if let Some((user, pass)) = &self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let outcome = async {
            let response = builder.send().await.map_err(|e| DepinError::Rpc {
                message: format!("{method}: {e}"),
            })?;
            let status = response.status();
            if !status.is_success() && status != reqwest::StatusCode::INTERNAL_SERVER_ERROR {
                // JSON-RPC errors often ride on 500; anything else is
                // transport-level.
                return Err(DepinError::Rpc {
                    message: format!("{method}: HTTP {status}"),
                });
            }
            let body: RpcResponse = response.json().await.map_err(|e| DepinError::Rpc {
                message: format!("{method}: invalid JSON-RPC response: {e}"),
            })?;
            if let Some(err) = body.error {
                return Err(DepinError::Rpc {
                    message: format!("{method}: node error {}: {}", err.code, err.message),
                });
            }
            Ok(body.result)
        }
        .await;

        self.set_connected(outcome.is_ok());
        outcome
    }
}

impl NodeRpc for HttpRpcClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn mark_disconnected(&self) {
        self.set_connected(false);
    }

    async fn blockchain_info(&self) -> Result<serde_json::Value> {
        self.call_raw("blockchain_info", serde_json::json!([])).await
    }

    async fn pool_info(&self) -> Result<PoolInfo> {
        self.call("msg_pool_info", serde_json::json!([])).await
    }

    async fn receive_messages(
        &self,
        token: &str,
        address: &Address,
        since_ts: Option<u64>,
    ) -> Result<ReceiveResult> {
        let params = match since_ts {
            Some(ts) => serde_json::json!([token, address.as_str(), ts]),
            None => serde_json::json!([token, address.as_str()]),
        };
        let raw = self.call_raw("msg_receive", params).await?;
        ReceiveResult::from_value(raw)
    }

    async fn submit_message(&self, payload_hex: &str) -> Result<String> {
        let result: SubmitResult = self
            .call("msg_submit", serde_json::json!([payload_hex]))
            .await?;
        result
            .id()
            .map(str::to_owned)
            .ok_or_else(|| DepinError::Rpc {
                message: "msg_submit: response carries neither hash nor txid".into(),
            })
    }

    async fn list_depin_addresses(&self, token: &str) -> Result<Vec<DepinAddressEntry>> {
        self.call("list_depin_addresses", serde_json::json!([token]))
            .await
    }

    async fn list_addresses_by_asset(&self, token: &str) -> Result<HashMap<String, f64>> {
        self.call("list_addresses_by_asset", serde_json::json!([token]))
            .await
    }

    async fn get_pubkey(&self, address: &Address) -> Result<PubkeyInfo> {
        self.call("get_pubkey", serde_json::json!([address.as_str()]))
            .await
    }

    async fn test_connection(&self, silent: bool) -> bool {
        match self.blockchain_info().await {
            Ok(_) => true,
            Err(e) => {
                if !silent {
                    tracing::warn!(%e, "node health probe failed");
                }
                false
            }
        }
    }

    async fn reconnect(&self, silent: bool) -> bool {
        if self.test_connection(true).await {
            return true;
        }
        // Tear down the transport (drops pooled connections) and try
        // once more on a fresh handle.
        {
            let mut guard = self.http.lock().expect("http handle lock poisoned");
            *guard = build_http(self.timeout);
        }
        let up = self.test_connection(silent).await;
        if up && !silent {
            tracing::info!("reconnected to node RPC");
        }
        up
    }
}

fn build_http(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

fn normalize_endpoint(rpc_url: &str) -> String {
    let trimmed = rpc_url.trim_end_matches('/');
    if trimmed.ends_with("/rpc") {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/rpc")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
