//! Client for requesting funds from a running faucet

use crate::error::{FaucetError, FaucetResult};
use crate::service::FaucetRequest;
use serde_json::Value;
use std::time::Duration;

/// Status and JSON body returned by the faucet
#[derive(Debug, Clone)]
pub struct ClientReply {
    pub status: u16,
    pub body: Value,
}

impl ClientReply {
    pub fn is_created(&self) -> bool {
        self.status == 201
    }
}

pub struct FaucetClient {
    url: String,
    client: reqwest::Client,
}

impl FaucetClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> FaucetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaucetError::NetworkError(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// POST a funding request for `address` on `chain_id`.
    pub async fn request_funds(&self, chain_id: &str, address: &str) -> FaucetResult<ClientReply> {
        let request = FaucetRequest {
            chain_id: chain_id.to_string(),
            address: address.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FaucetError::NetworkError(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(ClientReply { status, body })
    }
}
