//! Ledger access: account lookup and commit-mode broadcast.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use base64::Engine;
use drip_common::Coin;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// On-chain account number and anti-replay sequence of a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_number: u64,
    pub sequence: u64,
}

/// Outcome of a committed (or rejected) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// 0 means success
    pub code: u32,
    pub codespace: String,
    pub raw_log: String,
    pub tx_hash: String,
    pub height: i64,
}

impl BroadcastResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn an on-chain rejection into [`FaucetError::BroadcastRejected`].
    pub fn into_result(self) -> FaucetResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FaucetError::BroadcastRejected {
                code: self.code,
                codespace: self.codespace,
                raw_log: self.raw_log,
            })
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account number and sequence for a bech32 address
    async fn account(&self, address: &str) -> FaucetResult<AccountState>;

    /// Balance of `address` in `denom`
    async fn balance(&self, address: &str, denom: &str) -> FaucetResult<Coin>;

    /// Submit a signed transaction and wait until it is included in a block
    async fn broadcast_tx_commit(&self, tx_bytes: &[u8]) -> FaucetResult<BroadcastResult>;
}

/// Talks to a node's REST gateway for queries and to its Tendermint RPC for broadcasts.
pub struct HttpLedgerClient {
    rpc_url: String,
    api_url: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(rpc_url: String, api_url: String, request_timeout: Duration) -> Self {
        Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout,
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> FaucetResult<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::NetworkError(format!("Request failed: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| FaucetError::NetworkError(format!("Invalid response: {}", e)))?;

        if let Some(error) = json.get("error") {
            return Err(FaucetError::NetworkError(error.to_string()));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn query(&self, path: &str, params: &[(&str, &str)]) -> FaucetResult<(reqwest::StatusCode, Value)> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| FaucetError::NetworkError(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}

/// A bare 404 may come from a proxy or a wrong API path, so only the
/// gateway's own NotFound body counts.
fn is_not_found(status: reqwest::StatusCode, body: &Value) -> bool {
    if status.is_success() {
        return false;
    }
    // grpc-gateway reports codes.NotFound as {"code": 5, "message": "... not found"}
    body.get("code").and_then(Value::as_u64) == Some(5)
        || body
            .get("message")
            .and_then(Value::as_str)
            .map(|m| m.contains("not found"))
            .unwrap_or(false)
}

/// Integers arrive either as JSON numbers or as decimal strings.
fn json_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_str(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Extract account number and sequence, unwrapping vesting/module account envelopes.
pub fn parse_account(account: &Value) -> FaucetResult<AccountState> {
    let mut base = account;
    for wrapper in ["base_vesting_account", "base_account"] {
        if let Some(inner) = base.get(wrapper) {
            base = inner;
        }
    }
    if base.get("address").is_none() && base.get("account_number").is_none() {
        return Err(FaucetError::NetworkError(format!(
            "unexpected account payload: {}",
            account
        )));
    }

    Ok(AccountState {
        account_number: json_u64(base.get("account_number")).unwrap_or(0),
        sequence: json_u64(base.get("sequence")).unwrap_or(0),
    })
}

/// Interpret a `broadcast_tx_commit` result. A failing CheckTx wins over DeliverTx.
pub fn interpret_commit_result(result: &Value) -> FaucetResult<BroadcastResult> {
    let check_tx = result.get("check_tx").cloned().unwrap_or(Value::Null);
    let deliver_tx = result
        .get("deliver_tx")
        .or_else(|| result.get("tx_result"))
        .cloned()
        .unwrap_or(Value::Null);

    let check_code = json_code(check_tx.get("code"))?;
    let outcome = if check_code != 0 { &check_tx } else { &deliver_tx };

    let height = json_u64(result.get("height")).unwrap_or(0);
    Ok(BroadcastResult {
        code: json_code(outcome.get("code"))?,
        codespace: json_str(outcome.get("codespace")),
        raw_log: json_str(outcome.get("log")),
        tx_hash: json_str(result.get("hash")),
        height: i64::try_from(height)
            .map_err(|_| FaucetError::NetworkError(format!("block height {} out of range", height)))?,
    })
}

/// ABCI result codes are uint32; anything wider is a malformed reply.
fn json_code(value: Option<&Value>) -> FaucetResult<u32> {
    let code = json_u64(value).unwrap_or(0);
    u32::try_from(code).map_err(|_| FaucetError::NetworkError(format!("result code {} out of range", code)))
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn account(&self, address: &str) -> FaucetResult<AccountState> {
        let path = format!("/cosmos/auth/v1beta1/accounts/{}", address);
        let (status, body) = self.query(&path, &[]).await?;

        if is_not_found(status, &body) {
            return Err(FaucetError::AccountNotFound(address.to_string()));
        }
        if !status.is_success() {
            return Err(FaucetError::NetworkError(format!(
                "account query for {} returned {}: {}",
                address, status, body
            )));
        }

        let account = body.get("account").ok_or_else(|| {
            FaucetError::NetworkError(format!("account query returned no account: {}", body))
        })?;
        let state = parse_account(account)?;
        debug!(
            "Account {}: number={} sequence={}",
            address, state.account_number, state.sequence
        );
        Ok(state)
    }

    async fn balance(&self, address: &str, denom: &str) -> FaucetResult<Coin> {
        let path = format!("/cosmos/bank/v1beta1/balances/{}/by_denom", address);
        let (status, body) = self.query(&path, &[("denom", denom)]).await?;

        if !status.is_success() {
            return Err(FaucetError::NetworkError(format!(
                "balance query for {} returned {}: {}",
                address, status, body
            )));
        }

        match body.get("balance") {
            Some(balance) if !balance.is_null() => serde_json::from_value(balance.clone())
                .map_err(|e| FaucetError::NetworkError(format!("Invalid balance: {}", e))),
            _ => Ok(Coin::new(0, denom)),
        }
    }

    async fn broadcast_tx_commit(&self, tx_bytes: &[u8]) -> FaucetResult<BroadcastResult> {
        let tx = base64::engine::general_purpose::STANDARD.encode(tx_bytes);
        let result = self
            .call("broadcast_tx_commit", serde_json::json!({ "tx": tx }))
            .await?;
        interpret_commit_result(&result)
    }
}
