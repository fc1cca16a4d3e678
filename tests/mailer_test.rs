mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use vaultbank_core::adapters::{HttpCodeSender, MemoryStore};
use vaultbank_core::domain::{Profile, TransactionStatus};
use vaultbank_core::ports::{CodeSender, DeliveryError, ProfileRepository};
use vaultbank_core::use_cases::{Core, CoreSettings, ManualAdjustment};

#[tokio::test]
async fn test_code_is_posted_as_email_and_otp() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "email": "jane@example.com",
            "otp": "123456"
        })))
        .with_status(200)
        .create_async()
        .await;

    let sender = HttpCodeSender::new(server.url());
    sender
        .send_code("jane@example.com", "123456")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_delivery_reports_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(502)
        .create_async()
        .await;

    let sender = HttpCodeSender::new(server.url());
    let result = sender.send_code("jane@example.com", "123456").await;
    assert!(matches!(result, Err(DeliveryError::Rejected(502))));
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let sender = HttpCodeSender::with_circuit_breaker(server.url(), 2, 60);
    for _ in 0..2 {
        let result = sender.send_code("jane@example.com", "123456").await;
        assert!(matches!(result, Err(DeliveryError::Rejected(500))));
    }
    assert_eq!(sender.circuit_state(), "open");

    // The third call never reaches the endpoint.
    let result = sender.send_code("jane@example.com", "123456").await;
    assert!(matches!(result, Err(DeliveryError::CircuitOpen(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delivery_failure_does_not_fail_transfer() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(503)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let core = Core::new(
        store.clone(),
        Arc::new(HttpCodeSender::new(server.url())),
        CoreSettings::default(),
    );

    let user_id = Uuid::new_v4();
    store
        .upsert_profile(&Profile {
            user_id,
            email: "jane@example.com".to_string(),
            full_name: None,
            can_transact: true,
        })
        .await
        .unwrap();
    let account = core
        .ledger
        .open_account(user_id, "checking", "USD")
        .await
        .unwrap();
    core.admin
        .manual_deposit(
            Uuid::new_v4(),
            ManualAdjustment {
                account_id: account.id,
                amount: common::usd("20.00"),
                effective_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let receipt = core
        .transfers
        .initiate(user_id, common::transfer(account.id, "5.00"))
        .await
        .unwrap();
    assert_eq!(receipt.status, TransactionStatus::Pending);
    assert_eq!(store.list_challenges(receipt.transaction_id).await.len(), 1);
}
