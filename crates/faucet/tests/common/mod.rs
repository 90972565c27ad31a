//! Shared fixtures for the faucet integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use drip_common::{AccAddress, Coin};
use drip_faucet::{AccountState, BroadcastResult, FaucetConfig, FaucetError, FaucetResult, FaucetService, LedgerClient};
use drip_keystore::{LocalKeystore, DEFAULT_KEY_PASS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// On-chain rejection the mock reports for every broadcast
#[derive(Clone)]
pub struct Rejection {
    pub code: u32,
    pub codespace: String,
    pub raw_log: String,
}

/// In-memory chain: the sequence advances on each committed broadcast.
pub struct MockLedger {
    /// Sequence the chain expects next
    pub sequence: AtomicU64,
    /// Sequence handed out by every account query, in order
    pub resolved: Mutex<Vec<u64>>,
    pub broadcasts: AtomicU64,
    pub rejection: Option<Rejection>,
    pub commit_delay: Duration,
    pub account_missing: bool,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            resolved: Mutex::new(Vec::new()),
            broadcasts: AtomicU64::new(0),
            rejection: None,
            commit_delay: Duration::ZERO,
            account_missing: false,
        }
    }
}

impl MockLedger {
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn resolved_sequences(&self) -> Vec<u64> {
        self.resolved.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn account(&self, address: &str) -> FaucetResult<AccountState> {
        if self.account_missing {
            return Err(FaucetError::AccountNotFound(address.to_string()));
        }
        let sequence = self.sequence.load(Ordering::SeqCst);
        self.resolved.lock().unwrap().push(sequence);
        Ok(AccountState {
            account_number: 7,
            sequence,
        })
    }

    async fn balance(&self, _address: &str, denom: &str) -> FaucetResult<Coin> {
        Ok(Coin::new(1_000_000_000, denom))
    }

    async fn broadcast_tx_commit(&self, _tx_bytes: &[u8]) -> FaucetResult<BroadcastResult> {
        tokio::time::sleep(self.commit_delay).await;
        self.broadcasts.fetch_add(1, Ordering::SeqCst);

        if let Some(rejection) = &self.rejection {
            return Ok(BroadcastResult {
                code: rejection.code,
                codespace: rejection.codespace.clone(),
                raw_log: rejection.raw_log.clone(),
                tx_hash: "REJECTED".to_string(),
                height: 0,
            });
        }

        let height = self.sequence.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        Ok(BroadcastResult {
            code: 0,
            codespace: String::new(),
            raw_log: "[]".to_string(),
            tx_hash: format!("{:064X}", height),
            height,
        })
    }
}

pub const CHAIN_ID: &str = "test-1";

pub fn test_config() -> FaucetConfig {
    FaucetConfig {
        chain_id: CHAIN_ID.to_string(),
        amount: "1000uatom".to_string(),
        ..Default::default()
    }
}

pub fn faucet_service(config: FaucetConfig, ledger: Arc<MockLedger>) -> Arc<FaucetService> {
    let keystore = Arc::new(LocalKeystore::new());
    keystore.add(&config.key_name, DEFAULT_KEY_PASS).unwrap();
    Arc::new(FaucetService::new(config, keystore, ledger).unwrap())
}

/// Deterministic recipient address derived from `seed`
pub fn recipient(seed: u8) -> String {
    AccAddress([seed; 20]).to_bech32("cosmos").unwrap()
}
