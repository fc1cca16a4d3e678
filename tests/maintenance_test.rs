mod common;

use chrono::Duration;
use common::{harness, transfer};
use vaultbank_core::domain::TransactionStatus;
use vaultbank_core::services::{MaintenanceSettings, MaintenanceWorker};

fn worker(h: &common::Harness, every: std::time::Duration) -> MaintenanceWorker {
    MaintenanceWorker::new(
        h.core.transfers.clone(),
        h.core.approvals.clone(),
        MaintenanceSettings {
            interval: every,
            pending_ttl: Duration::minutes(-1),
            approve_after: Duration::zero(),
        },
    )
}

#[tokio::test]
async fn test_sweep_fails_stale_transfers_and_approves_requests() {
    let h = harness();
    let (user_id, account) = h.funded_customer("100.00").await;
    let receipt = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await
        .unwrap();
    h.core
        .approvals
        .request_account(user_id, "savings")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let report = worker(&h, std::time::Duration::from_secs(60))
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.failed_transfers, 1);
    assert_eq!(report.approved_requests, 1);

    let tx = h.core.journal.get(receipt.transaction_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_worker_sweeps_on_first_tick() {
    let h = harness();
    let (user_id, _account) = h.customer(true).await;
    h.core
        .approvals
        .request_account(user_id, "savings")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let handle = tokio::spawn(worker(&h, std::time::Duration::from_secs(3600)).run());
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.abort();

    // The first tick fires immediately; the hour-long period never elapses.
    let accounts = h.core.ledger.accounts_for_user(user_id).await.unwrap();
    assert_eq!(accounts.len(), 2);
}
