//! Error types for the faucet service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drip_keystore::KeystoreError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Failed to read request body: {0}")]
    BodyUnreadable(String),

    #[error("Failed to unmarshal request payload: {0}")]
    MalformedRequest(String),

    #[error("Invalid chain id: exp({expected}) got({got})")]
    ChainMismatch { expected: String, got: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(
        "{address} has requested funds within the last {}, wait {} before trying again",
        format_duration(*cooldown),
        format_duration(*wait)
    )]
    RateLimited {
        address: String,
        wait: Duration,
        cooldown: Duration,
    },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("transaction rejected (codespace {codespace}, code {code}): {raw_log}")]
    BroadcastRejected {
        code: u32,
        codespace: String,
        raw_log: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FaucetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::BodyUnreadable(_) => StatusCode::BAD_GATEWAY,
            FaucetError::MalformedRequest(_)
            | FaucetError::ChainMismatch { .. }
            | FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::KeyNotFound(_)
            | FaucetError::AccountNotFound(_)
            | FaucetError::SigningError(_)
            | FaucetError::NetworkError(_)
            | FaucetError::BroadcastRejected { .. }
            | FaucetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FaucetError::BodyUnreadable(_) => "body_unreadable",
            FaucetError::MalformedRequest(_) => "malformed_request",
            FaucetError::ChainMismatch { .. } => "chain_mismatch",
            FaucetError::InvalidAddress(_) => "invalid_address",
            FaucetError::RateLimited { .. } => "rate_limited",
            FaucetError::KeyNotFound(_) => "key_not_found",
            FaucetError::AccountNotFound(_) => "account_not_found",
            FaucetError::SigningError(_) => "signing_error",
            FaucetError::NetworkError(_) => "network_error",
            FaucetError::BroadcastRejected { .. } => "broadcast_rejected",
            FaucetError::Config(_) => "config",
        }
    }

    /// Message returned to the HTTP caller
    pub fn client_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            format!("failed to send transaction: {}", self)
        } else {
            self.to_string()
        }
    }
}

impl From<KeystoreError> for FaucetError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::KeyNotFound(name) => FaucetError::KeyNotFound(name),
            other => FaucetError::SigningError(other.to_string()),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.client_message() }));
        (self.status_code(), body).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;

/// Render a duration as `1h2m3s` / `4m59s` / `12s`, rounding up to whole seconds.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs += 1;
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(300)), "5m0s");
        assert_eq!(format_duration(Duration::from_millis(299_500)), "5m0s");
        assert_eq!(format_duration(Duration::from_secs(299)), "4m59s");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1h2m5s");
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FaucetError::BodyUnreadable("eof".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            FaucetError::ChainMismatch {
                expected: "a".into(),
                got: "b".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FaucetError::RateLimited {
                address: "x".into(),
                wait: Duration::from_secs(1),
                cooldown: Duration::from_secs(2)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            FaucetError::NetworkError("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_message_contains_wait() {
        let err = FaucetError::RateLimited {
            address: "cosmos1xyz".into(),
            wait: Duration::from_secs(61),
            cooldown: Duration::from_secs(300),
        };
        assert_eq!(
            err.client_message(),
            "cosmos1xyz has requested funds within the last 5m0s, wait 1m1s before trying again"
        );
    }

    #[test]
    fn test_broadcast_rejection_message_keeps_diagnostics() {
        let err = FaucetError::BroadcastRejected {
            code: 5,
            codespace: "sdk".into(),
            raw_log: "insufficient funds".into(),
        };
        let msg = err.client_message();
        assert!(msg.starts_with("failed to send transaction: "));
        assert!(msg.contains("sdk"));
        assert!(msg.contains("insufficient funds"));
    }

    #[test]
    fn test_keystore_error_conversion() {
        let err: FaucetError = KeystoreError::KeyNotFound("faucet".into()).into();
        assert!(matches!(err, FaucetError::KeyNotFound(_)));

        let err: FaucetError = KeystoreError::WrongPassphrase("faucet".into()).into();
        assert!(matches!(err, FaucetError::SigningError(_)));
    }
}
