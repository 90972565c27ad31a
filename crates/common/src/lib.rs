//! Shared types and utilities for the drip faucet workspace.

pub mod types;
pub mod utils;

pub use types::{AccAddress, Coin, DecCoin, TypesError};
