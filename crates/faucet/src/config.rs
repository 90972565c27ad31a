//! Faucet configuration

use crate::error::{FaucetError, FaucetResult};
use drip_common::utils::logging::LoggingConfig;
use drip_common::{Coin, DecCoin};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Faucet service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Server listen address
    pub listen_addr: String,

    /// Chain the faucet serves; requests for any other chain are refused
    pub chain_id: String,

    /// Tendermint JSON-RPC endpoint (broadcast)
    pub rpc_url: String,

    /// REST (LCD) endpoint (account and balance queries)
    pub api_url: String,

    /// Bech32 prefix of account addresses
    pub account_prefix: String,

    /// Name of the funding key in the keyring
    pub key_name: String,

    /// Keyring directory; memory-only when unset
    pub keyring_dir: Option<String>,

    /// Hex secret key imported under `key_name` at start-up when the keyring lacks it
    pub private_key: Option<String>,

    /// Amount sent per request, e.g. "1000uatom"
    pub amount: String,

    /// Cooldown between two admitted requests for one address (seconds)
    pub cooldown_secs: u64,

    /// Interval of the rate-limit sweep task (seconds)
    pub sweep_interval_secs: u64,

    /// Gas limit for each transaction
    pub gas: u64,

    /// Gas adjustment factor carried in the transaction envelope
    pub gas_adjustment: f64,

    /// Gas prices, e.g. "0.025uatom"
    pub gas_prices: String,

    /// Memo attached to every transaction
    pub memo: String,

    /// Upper bound for a commit-mode broadcast (seconds)
    pub broadcast_timeout_secs: u64,

    /// Timeout for single HTTP calls to the node (seconds)
    pub request_timeout_secs: u64,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Enable metrics endpoint
    pub metrics_enabled: bool,

    /// Logging
    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            chain_id: "test-1".to_string(),
            rpc_url: "http://localhost:26657".to_string(),
            api_url: "http://localhost:1317".to_string(),
            account_prefix: "cosmos".to_string(),
            key_name: "faucet".to_string(),
            keyring_dir: None,
            private_key: None,
            amount: "1000uatom".to_string(),
            cooldown_secs: 300, // 5 minutes
            sweep_interval_secs: 60,
            gas: 200_000,
            gas_adjustment: 1.0,
            gas_prices: "0.01uatom".to_string(),
            memo: String::new(),
            broadcast_timeout_secs: 30,
            request_timeout_secs: 10,
            cors_enabled: true,
            metrics_enabled: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl FaucetConfig {
    /// Load from a TOML/YAML/JSON file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config: Self = drip_common::utils::config::load_config(path)?;
        Ok(config.with_env_overrides())
    }

    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("FAUCET_LISTEN_ADDR") {
            self.listen_addr = addr;
        }

        if let Ok(chain_id) = std::env::var("FAUCET_CHAIN_ID") {
            self.chain_id = chain_id;
        }

        if let Ok(rpc_url) = std::env::var("FAUCET_RPC_URL") {
            self.rpc_url = rpc_url;
        }

        if let Ok(api_url) = std::env::var("FAUCET_API_URL") {
            self.api_url = api_url;
        }

        if let Ok(prefix) = std::env::var("FAUCET_ACCOUNT_PREFIX") {
            self.account_prefix = prefix;
        }

        if let Ok(key) = std::env::var("FAUCET_KEY_NAME") {
            self.key_name = key;
        }

        if let Ok(dir) = std::env::var("FAUCET_KEYRING_DIR") {
            self.keyring_dir = Some(dir);
        }

        if let Ok(key) = std::env::var("FAUCET_PRIVATE_KEY") {
            self.private_key = Some(key);
        }

        if let Ok(amount) = std::env::var("FAUCET_AMOUNT") {
            self.amount = amount;
        }

        if let Ok(cooldown) = std::env::var("FAUCET_COOLDOWN") {
            self.cooldown_secs = cooldown.parse().unwrap_or(self.cooldown_secs);
        }

        if let Ok(gas_prices) = std::env::var("FAUCET_GAS_PRICES") {
            self.gas_prices = gas_prices;
        }

        if let Ok(timeout) = std::env::var("FAUCET_BROADCAST_TIMEOUT") {
            self.broadcast_timeout_secs = timeout.parse().unwrap_or(self.broadcast_timeout_secs);
        }

        self
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> FaucetResult<()> {
        if self.chain_id.trim().is_empty() {
            return Err(FaucetError::Config("chain_id must not be empty".to_string()));
        }
        if self.key_name.trim().is_empty() {
            return Err(FaucetError::Config("key_name must not be empty".to_string()));
        }
        if self.cooldown_secs == 0 {
            return Err(FaucetError::Config("cooldown_secs must be positive".to_string()));
        }
        if self.gas == 0 {
            return Err(FaucetError::Config("gas must be positive".to_string()));
        }
        if !self.gas_adjustment.is_finite() || self.gas_adjustment <= 0.0 {
            return Err(FaucetError::Config("gas_adjustment must be positive".to_string()));
        }

        let amount = self.amount_coin()?;
        if amount.amount == 0 {
            return Err(FaucetError::Config("amount must be positive".to_string()));
        }
        self.gas_price_coins()?;
        Ok(())
    }

    /// Parsed per-request amount
    pub fn amount_coin(&self) -> FaucetResult<Coin> {
        self.amount
            .parse()
            .map_err(|e| FaucetError::Config(format!("amount {:?}: {}", self.amount, e)))
    }

    /// Parsed gas prices
    pub fn gas_price_coins(&self) -> FaucetResult<Vec<DecCoin>> {
        DecCoin::parse_list(&self.gas_prices)
            .map_err(|e| FaucetError::Config(format!("gas_prices {:?}: {}", self.gas_prices, e)))
    }

    /// Get address cooldown duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
