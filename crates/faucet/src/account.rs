//! Signer account lookup.

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{AccountState, LedgerClient};
use drip_common::AccAddress;
use std::sync::Arc;
use tracing::debug;

/// Resolves the current account number and sequence of a signer.
///
/// Never caches: the sequence must match the chain at signing time.
#[derive(Clone)]
pub struct AccountResolver {
    ledger: Arc<dyn LedgerClient>,
    account_prefix: String,
}

impl AccountResolver {
    pub fn new(ledger: Arc<dyn LedgerClient>, account_prefix: impl Into<String>) -> Self {
        Self {
            ledger,
            account_prefix: account_prefix.into(),
        }
    }

    pub async fn resolve(&self, signer: &AccAddress) -> FaucetResult<AccountState> {
        let address = signer
            .to_bech32(&self.account_prefix)
            .map_err(|e| FaucetError::Config(e.to_string()))?;

        let state = self.ledger.account(&address).await?;
        debug!(
            "Resolved signer {}: account_number={} sequence={}",
            address, state.account_number, state.sequence
        );
        Ok(state)
    }
}
