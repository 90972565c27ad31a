//! Faucet client against a served router

mod common;

use common::{faucet_service, recipient, test_config, MockLedger, CHAIN_ID};
use drip_faucet::{api, FaucetClient, FaucetError};
use std::sync::Arc;
use std::time::Duration;

async fn serve(ledger: Arc<MockLedger>) -> String {
    let app = api::router(faucet_service(test_config(), ledger));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_request_funds_over_http() {
    let ledger = Arc::new(MockLedger::default());
    let url = serve(ledger.clone()).await;
    let client = FaucetClient::new(url, Duration::from_secs(5)).unwrap();
    let address = recipient(90);

    let reply = client.request_funds(CHAIN_ID, &address).await.unwrap();
    assert!(reply.is_created());
    assert_eq!(reply.body["address"], address.as_str());
    assert_eq!(reply.body["amount"], "1000uatom");

    let reply = client.request_funds(CHAIN_ID, &address).await.unwrap();
    assert_eq!(reply.status, 429);
    assert!(reply.body["error"].as_str().unwrap().contains("wait"));

    let reply = client.request_funds("wrong-chain", &recipient(91)).await.unwrap();
    assert_eq!(reply.status, 400);
    assert_eq!(ledger.broadcast_count(), 1);
}

#[tokio::test]
async fn test_unreachable_faucet_is_network_error() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = FaucetClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = client.request_funds(CHAIN_ID, &recipient(92)).await.unwrap_err();
    assert!(matches!(err, FaucetError::NetworkError(_)));
}
