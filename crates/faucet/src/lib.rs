//! Rate-limited testnet faucet for Cosmos-SDK chains
//!
//! A request passes through:
//! - the per-address cooldown ([`rate_limit`])
//! - signer account lookup ([`account`])
//! - amino-JSON signing into a protobuf envelope ([`tx`], [`proto`])
//! - commit-mode broadcast ([`broadcast`])
//!
//! [`FaucetService`] sequences these and [`api`] exposes it over HTTP.

pub mod account;
pub mod api;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod proto;
pub mod rate_limit;
pub mod service;
pub mod tx;

pub use account::AccountResolver;
pub use broadcast::Broadcaster;
pub use client::{ClientReply, FaucetClient};
pub use config::FaucetConfig;
pub use error::{FaucetError, FaucetResult};
pub use ledger::{AccountState, BroadcastResult, HttpLedgerClient, LedgerClient};
pub use metrics::FaucetMetrics;
pub use rate_limit::AddressRateLimiter;
pub use service::{FaucetRequest, FaucetResponse, FaucetService, FaucetStatus};
pub use tx::{Msg, MsgSend, SignedTransaction, TransactionBuilder, UnsignedTransaction};
