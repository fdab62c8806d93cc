//! JSON-RPC access to a live cluster.
//!
//! Only calls that need no signature are supported: balance queries, devnet
//! airdrops, signature status and account lookups. Requests use a blocking `ureq`
//! agent; the async wrappers move them onto the blocking thread pool.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use forge_resilience::await_visible;
use forge_types::capability::{BalanceSource, Funder};
use forge_types::{env_var, parse_address, Amount, ForgeError, ResourceHandle, RetryPolicy};

use crate::network::{resolve_rpc_url, Cluster};

/// Account data returned by `getAccountInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: String,
    pub executable: bool,
    #[serde(default)]
    pub space: Option<u64>,
}

/// Blocking JSON-RPC client.
#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl RpcClient {
    /// Default request timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn default_timeouts() -> (Duration, Duration) {
        let timeout_secs = env_var::<u64>("FORGE_RPC_TIMEOUT_SECS").unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        let connect_secs =
            env_var::<u64>("FORGE_RPC_CONNECT_TIMEOUT_SECS").unwrap_or(Self::DEFAULT_CONNECT_TIMEOUT_SECS);
        (
            Duration::from_secs(timeout_secs),
            Duration::from_secs(connect_secs),
        )
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    /// Client for `cluster`'s public endpoint, or `RPC_URL` when set.
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self::new(&resolve_rpc_url(cluster))
    }

    /// Create a client with a custom endpoint.
    pub fn new(endpoint: &str) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_timeouts(endpoint, timeout, connect_timeout)
    }

    /// Create a client with explicit timeouts.
    pub fn with_timeouts(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: Self::build_agent(timeout, connect_timeout),
        }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(method, endpoint = %self.endpoint, "rpc request");

        let response: Value = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| anyhow!("RPC request {} failed: {}", method, e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse RPC response for {}: {}", method, e))?;

        parse_rpc_result(method, response)
    }

    pub fn get_balance(&self, address: &str) -> Result<Amount> {
        let result = self.call("getBalance", json!([address, {"commitment": "confirmed"}]))?;
        parse_balance(&result)
    }

    /// Request an airdrop; returns the transaction signature.
    pub fn request_airdrop(&self, address: &str, lamports: Amount) -> Result<String> {
        let result = self.call("requestAirdrop", json!([address, lamports]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("requestAirdrop returned no signature"))
    }

    /// Whether `signature` has reached at least confirmed commitment.
    pub fn is_signature_confirmed(&self, signature: &str) -> Result<bool> {
        let result = self.call(
            "getSignatureStatuses",
            json!([[signature], {"searchTransactionHistory": true}]),
        )?;
        parse_signature_confirmed(&result)
    }

    pub fn get_account_info(&self, address: &str) -> Result<Option<AccountInfo>> {
        let result = self.call(
            "getAccountInfo",
            json!([address, {"encoding": "base64", "commitment": "confirmed"}]),
        )?;
        parse_account_info(&result)
    }
}

fn parse_rpc_result(method: &str, response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(anyhow!("RPC error {} from {}: {}", code, method, message));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| anyhow!("No result in RPC response for {}", method))
}

fn parse_balance(result: &Value) -> Result<Amount> {
    result
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("getBalance returned no value"))
}

fn parse_signature_confirmed(result: &Value) -> Result<bool> {
    let status = result
        .get("value")
        .and_then(Value::as_array)
        .and_then(|v| v.first())
        .ok_or_else(|| anyhow!("getSignatureStatuses returned no value"))?;
    if status.is_null() {
        return Ok(false);
    }
    if let Some(err) = status.get("err").filter(|e| !e.is_null()) {
        return Err(anyhow!("transaction failed: {}", err));
    }
    Ok(matches!(
        status.get("confirmationStatus").and_then(Value::as_str),
        Some("confirmed") | Some("finalized")
    ))
}

fn parse_account_info(result: &Value) -> Result<Option<AccountInfo>> {
    match result.get("value") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .context("malformed getAccountInfo value"),
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("rpc task failed: {}", e))?
}

/// One wallet on a live cluster.
#[derive(Clone)]
pub struct RpcAccount {
    client: Arc<RpcClient>,
    address: String,
    cluster: Cluster,
    confirm_policy: RetryPolicy,
}

impl RpcAccount {
    pub fn new(client: RpcClient, address: &str, cluster: Cluster) -> Result<Self, ForgeError> {
        Ok(Self {
            client: Arc::new(client),
            address: parse_address(address)?,
            cluster,
            confirm_policy: RetryPolicy::constant(10, 2000),
        })
    }

    /// Policy used to wait for airdrop confirmation.
    pub fn with_confirm_policy(mut self, policy: RetryPolicy) -> Self {
        self.confirm_policy = policy;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn cluster(&self) -> Cluster {
        self.cluster
    }

    /// Fetch an account; a missing account is an error so the poller keeps looking.
    pub async fn lookup(&self, handle: ResourceHandle) -> Result<AccountInfo> {
        let address = parse_address(handle.as_str())?;
        let client = Arc::clone(&self.client);
        blocking(move || client.get_account_info(&address))
            .await?
            .ok_or_else(|| anyhow!("account {} not found", handle))
    }

    async fn confirm(&self, signature: ResourceHandle) -> Result<()> {
        let client = Arc::clone(&self.client);
        let sig = signature.as_str().to_string();
        if blocking(move || client.is_signature_confirmed(&sig)).await? {
            Ok(())
        } else {
            Err(anyhow!("signature {} not confirmed yet", signature))
        }
    }
}

#[async_trait]
impl BalanceSource for RpcAccount {
    async fn balance(&self) -> Result<Amount> {
        let client = Arc::clone(&self.client);
        let address = self.address.clone();
        blocking(move || client.get_balance(&address)).await
    }
}

#[async_trait]
impl Funder for RpcAccount {
    async fn fund(&self, amount: Amount) -> Result<()> {
        if !self.cluster.supports_airdrop() {
            return Err(ForgeError::InvalidInput(format!(
                "airdrop is only enabled for devnet and testnet, not {}",
                self.cluster
            ))
            .into());
        }
        let client = Arc::clone(&self.client);
        let address = self.address.clone();
        let signature = blocking(move || client.request_airdrop(&address, amount)).await?;
        info!(signature = %signature, lamports = amount, "airdrop requested");

        let handle = ResourceHandle::new(signature);
        await_visible(&handle, &self.confirm_policy, |sig| self.confirm(sig)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_object_becomes_error() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "Invalid param: WrongSize"}
        });
        let err = parse_rpc_result("getBalance", response).unwrap_err();
        assert!(err.to_string().contains("-32602"));
        assert!(err.to_string().contains("WrongSize"));
    }

    #[test]
    fn test_parse_balance() {
        let response = json!({"jsonrpc": "2.0", "id": 1, "result": {"context": {"slot": 1}, "value": 60_000_000u64}});
        let result = parse_rpc_result("getBalance", response).unwrap();
        assert_eq!(parse_balance(&result).unwrap(), 60_000_000);
        assert!(parse_balance(&json!({"value": null})).is_err());
    }

    #[test]
    fn test_parse_account_info() {
        let missing = json!({"context": {"slot": 5}, "value": null});
        assert_eq!(parse_account_info(&missing).unwrap(), None);

        let present = json!({
            "context": {"slot": 5},
            "value": {
                "data": ["", "base64"],
                "executable": false,
                "lamports": 1_461_600u64,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                "rentEpoch": 18446744073709551615u64,
                "space": 82
            }
        });
        let info = parse_account_info(&present).unwrap().unwrap();
        assert_eq!(info.lamports, 1_461_600);
        assert_eq!(info.space, Some(82));
        assert!(!info.executable);
    }

    #[test]
    fn test_parse_signature_status() {
        let pending = json!({"context": {"slot": 1}, "value": [null]});
        assert!(!parse_signature_confirmed(&pending).unwrap());

        let processed = json!({"value": [{"err": null, "confirmationStatus": "processed"}]});
        assert!(!parse_signature_confirmed(&processed).unwrap());

        let confirmed = json!({"value": [{"err": null, "confirmationStatus": "confirmed"}]});
        assert!(parse_signature_confirmed(&confirmed).unwrap());

        let failed = json!({"value": [{"err": {"InstructionError": [0, "Custom"]}, "confirmationStatus": "confirmed"}]});
        assert!(parse_signature_confirmed(&failed).is_err());
    }

    #[tokio::test]
    async fn test_mainnet_funding_is_rejected_without_network() {
        let account = RpcAccount::new(
            RpcClient::new("http://127.0.0.1:1"),
            "11111111111111111111111111111111",
            Cluster::MainnetBeta,
        )
        .unwrap();
        let err = account.fund(1).await.unwrap_err();
        assert!(forge_types::is_permanent(&err));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = RpcAccount::new(RpcClient::new("http://127.0.0.1:1"), "not-base58!", Cluster::Devnet)
            .err()
            .unwrap();
        assert!(matches!(err, ForgeError::InvalidInput(_)));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_devnet_balance() {
        let account = RpcAccount::new(
            RpcClient::for_cluster(Cluster::Devnet),
            "11111111111111111111111111111111",
            Cluster::Devnet,
        )
        .unwrap();
        let balance = account.balance().await.unwrap();
        println!("System program balance: {}", balance);
        assert!(balance > 0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_devnet_lookup_with_poller() {
        let account = RpcAccount::new(
            RpcClient::for_cluster(Cluster::Devnet),
            "11111111111111111111111111111111",
            Cluster::Devnet,
        )
        .unwrap();
        let handle = ResourceHandle::new("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
        let info = forge_resilience::await_visible(&handle, &RetryPolicy::constant(3, 1000), |h| account.lookup(h))
            .await
            .unwrap();
        assert!(info.executable);
    }
}
