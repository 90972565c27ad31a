//! Commit-mode broadcast with a bounded wait.

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{BroadcastResult, LedgerClient};
use crate::tx::SignedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Broadcaster {
    ledger: Arc<dyn LedgerClient>,
    timeout: Duration,
}

impl Broadcaster {
    pub fn new(ledger: Arc<dyn LedgerClient>, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    /// Submit `tx` and wait for it to be committed.
    ///
    /// An on-chain rejection is still `Ok` with a non-zero code; `Err` means
    /// the node could not be reached or did not answer within the timeout.
    pub async fn broadcast_commit(&self, tx: &SignedTransaction) -> FaucetResult<BroadcastResult> {
        debug!("Broadcasting tx {} (sequence {})", tx.hash(), tx.sequence());

        let result = tokio::time::timeout(self.timeout, self.ledger.broadcast_tx_commit(tx.bytes()))
            .await
            .map_err(|_| {
                warn!("Broadcast of tx {} timed out after {:?}", tx.hash(), self.timeout);
                FaucetError::NetworkError(format!(
                    "timed out after {:?} waiting for tx {} to commit",
                    self.timeout,
                    tx.hash()
                ))
            })??;

        debug!(
            "Tx {} finished with code {} at height {}",
            tx.hash(),
            result.code,
            result.height
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountResolver;
    use crate::ledger::AccountState;
    use crate::tx::{Msg, MsgSend, TransactionBuilder};
    use async_trait::async_trait;
    use drip_common::Coin;
    use drip_keystore::{LocalKeystore, DEFAULT_KEY_PASS};

    struct SlowLedger {
        delay: Duration,
        code: u32,
    }

    #[async_trait]
    impl LedgerClient for SlowLedger {
        async fn account(&self, _address: &str) -> FaucetResult<AccountState> {
            Ok(AccountState {
                account_number: 1,
                sequence: 0,
            })
        }

        async fn balance(&self, _address: &str, denom: &str) -> FaucetResult<Coin> {
            Ok(Coin::new(0, denom))
        }

        async fn broadcast_tx_commit(&self, _tx_bytes: &[u8]) -> FaucetResult<BroadcastResult> {
            tokio::time::sleep(self.delay).await;
            Ok(BroadcastResult {
                code: self.code,
                codespace: if self.code == 0 { String::new() } else { "sdk".to_string() },
                raw_log: "out of gas".to_string(),
                tx_hash: "ABCD".to_string(),
                height: 10,
            })
        }
    }

    async fn signed_tx(ledger: Arc<dyn LedgerClient>) -> SignedTransaction {
        let keystore = Arc::new(LocalKeystore::new());
        keystore.add("faucet", DEFAULT_KEY_PASS).unwrap();
        let builder = TransactionBuilder::new(
            keystore,
            AccountResolver::new(ledger, "cosmos"),
            "test-1".to_string(),
            200_000,
            1.0,
            Vec::new(),
            String::new(),
        );
        let msg = Msg::Send(MsgSend {
            from_address: "cosmos1from".to_string(),
            to_address: "cosmos1to".to_string(),
            amount: vec![Coin::new(1, "uatom")],
        });
        builder.build_and_sign(vec![msg], "faucet").await.unwrap()
    }

    #[tokio::test]
    async fn test_rejection_is_reported_as_result() {
        let ledger: Arc<dyn LedgerClient> = Arc::new(SlowLedger {
            delay: Duration::ZERO,
            code: 11,
        });
        let tx = signed_tx(ledger.clone()).await;

        let result = Broadcaster::new(ledger, Duration::from_secs(5))
            .broadcast_commit(&tx)
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.code, 11);
        assert_eq!(result.codespace, "sdk");
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let ledger: Arc<dyn LedgerClient> = Arc::new(SlowLedger {
            delay: Duration::from_secs(10),
            code: 0,
        });
        let tx = signed_tx(ledger.clone()).await;

        let err = Broadcaster::new(ledger, Duration::from_millis(50))
            .broadcast_commit(&tx)
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::NetworkError(_)));
    }
}
