//! Faucet service core logic

use crate::account::AccountResolver;
use crate::broadcast::Broadcaster;
use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{BroadcastResult, LedgerClient};
use crate::metrics::FaucetMetrics;
use crate::rate_limit::AddressRateLimiter;
use crate::tx::{Msg, MsgSend, TransactionBuilder};
use chrono::{DateTime, Utc};
use drip_common::{AccAddress, Coin};
use drip_keystore::Keystore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, instrument, warn};

/// Inbound funding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetRequest {
    #[serde(rename = "chain-id")]
    pub chain_id: String,
    pub address: String,
}

/// Body of a `201 Created` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetResponse {
    pub address: String,
    pub amount: String,
}

/// Faucet status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetStatus {
    pub address: String,
    pub chain_id: String,
    pub amount: String,
    pub cooldown_secs: u64,
    pub tracked_addresses: usize,
    /// Faucet balance in the dispensed denom; absent when the node cannot be queried
    pub balance: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// One async mutex per signing key. Holding it across resolve, sign and
/// broadcast keeps two sends from signing with the same sequence.
#[derive(Default)]
struct SendLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SendLocks {
    fn get(&self, key_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key_name.to_string()).or_default().clone()
    }
}

/// Faucet service
pub struct FaucetService {
    config: FaucetConfig,
    keystore: Arc<dyn Keystore>,
    ledger: Arc<dyn LedgerClient>,
    builder: TransactionBuilder,
    broadcaster: Broadcaster,
    rate_limiter: AddressRateLimiter,
    send_locks: SendLocks,
    metrics: FaucetMetrics,
    faucet_address: AccAddress,
    faucet_bech32: String,
    amount: Coin,
    started_at: DateTime<Utc>,
}

impl FaucetService {
    /// Create new faucet service. The configured key must already exist in `keystore`.
    pub fn new(
        config: FaucetConfig,
        keystore: Arc<dyn Keystore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> FaucetResult<Self> {
        config.validate()?;

        let key = keystore.key_by_name(&config.key_name)?;
        let faucet_address = key.address;
        let faucet_bech32 = faucet_address
            .to_bech32(&config.account_prefix)
            .map_err(|e| FaucetError::Config(format!("account_prefix: {}", e)))?;
        info!("Faucet key {} has address {}", key.name, faucet_bech32);

        let builder = TransactionBuilder::new(
            keystore.clone(),
            AccountResolver::new(ledger.clone(), config.account_prefix.clone()),
            config.chain_id.clone(),
            config.gas,
            config.gas_adjustment,
            config.gas_price_coins()?,
            config.memo.clone(),
        );
        let broadcaster = Broadcaster::new(ledger.clone(), config.broadcast_timeout());
        let rate_limiter = AddressRateLimiter::new(config.cooldown())?;
        let metrics = FaucetMetrics::new().map_err(|e| FaucetError::Config(format!("metrics: {}", e)))?;
        let amount = config.amount_coin()?;

        Ok(Self {
            config,
            keystore,
            ledger,
            builder,
            broadcaster,
            rate_limiter,
            send_locks: SendLocks::default(),
            metrics,
            faucet_address,
            faucet_bech32,
            amount,
            started_at: Utc::now(),
        })
    }

    /// Handle one funding request end to end.
    #[instrument(skip(self, request), fields(chain_id = %request.chain_id, address = %request.address))]
    pub async fn dispense(&self, request: FaucetRequest) -> FaucetResult<FaucetResponse> {
        let result = self.process(request).await;

        match &result {
            Ok(response) => {
                self.metrics.record_outcome("dispensed");
                info!("Sent {} to {}", response.amount, response.address);
            }
            Err(e) => self.metrics.record_outcome(e.kind()),
        }
        self.metrics.tracked_addresses.set(self.rate_limiter.tracked() as i64);
        result
    }

    async fn process(&self, request: FaucetRequest) -> FaucetResult<FaucetResponse> {
        if request.chain_id != self.config.chain_id {
            return Err(FaucetError::ChainMismatch {
                expected: self.config.chain_id.clone(),
                got: request.chain_id,
            });
        }

        let recipient = self.validate_address(&request.address)?;
        let canonical = recipient
            .to_bech32(&self.config.account_prefix)
            .map_err(|e| FaucetError::InvalidAddress(e.to_string()))?;

        self.rate_limiter.check_and_record(&canonical).map_err(|e| {
            warn!("{}", e);
            e
        })?;

        let timer = self.metrics.dispense_duration.start_timer();
        let sent = self.faucet_send(&canonical).await;
        timer.observe_duration();

        match sent {
            Ok(result) => debug!("Tx {} committed at height {}", result.tx_hash, result.height),
            Err(e) => {
                error!("Failed to fund {}: {}", canonical, e);
                return Err(e);
            }
        }

        // Echo the address as the caller wrote it; `canonical` only keys the cooldown.
        Ok(FaucetResponse {
            address: request.address,
            amount: self.amount.to_string(),
        })
    }

    fn validate_address(&self, address: &str) -> FaucetResult<AccAddress> {
        let recipient = AccAddress::from_bech32(address, &self.config.account_prefix)
            .map_err(|e| FaucetError::InvalidAddress(e.to_string()))?;
        if recipient == self.faucet_address {
            return Err(FaucetError::InvalidAddress(
                "cannot send funds to the faucet's own address".to_string(),
            ));
        }
        Ok(recipient)
    }

    /// Send the configured amount from the faucet key to `to`.
    async fn faucet_send(&self, to: &str) -> FaucetResult<BroadcastResult> {
        let key = self.keystore.key_by_address(&self.faucet_address)?;

        let msg = Msg::Send(MsgSend {
            from_address: self.faucet_bech32.clone(),
            to_address: to.to_string(),
            amount: vec![self.amount.clone()],
        });

        self.send_msg_with_key(msg, &key.name).await?.into_result()
    }

    /// Build, sign and broadcast `msg` with the named key, serialised per key.
    pub async fn send_msg_with_key(&self, msg: Msg, key_name: &str) -> FaucetResult<BroadcastResult> {
        let lock = self.send_locks.get(key_name);
        let _guard = lock.lock().await;

        let tx = self.builder.build_and_sign(vec![msg], key_name).await?;
        self.broadcaster.broadcast_commit(&tx).await
    }

    /// Get faucet status
    pub async fn status(&self) -> FaucetStatus {
        let balance = match self.ledger.balance(&self.faucet_bech32, &self.amount.denom).await {
            Ok(coin) => Some(coin.to_string()),
            Err(e) => {
                warn!("Balance query failed: {}", e);
                None
            }
        };

        FaucetStatus {
            address: self.faucet_bech32.clone(),
            chain_id: self.config.chain_id.clone(),
            amount: self.amount.to_string(),
            cooldown_secs: self.config.cooldown_secs,
            tracked_addresses: self.rate_limiter.tracked(),
            balance,
            started_at: self.started_at,
        }
    }

    /// Evict rate-limit entries whose cooldown has elapsed
    pub fn sweep(&self) -> usize {
        let evicted = self.rate_limiter.sweep();
        self.metrics.tracked_addresses.set(self.rate_limiter.tracked() as i64);
        evicted
    }

    pub fn faucet_address(&self) -> &str {
        &self.faucet_bech32
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }
}
