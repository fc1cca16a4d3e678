mod common;

use chrono::{Duration, Utc};
use common::{harness, transfer, usd};
use uuid::Uuid;
use vaultbank_core::domain::{
    AccountStatus, AdminActionType, NotificationTarget, NotificationType, TransactionStatus,
};
use vaultbank_core::error::LedgerError;
use vaultbank_core::use_cases::ManualAdjustment;

#[tokio::test]
async fn test_backdated_deposit_is_journaled_and_audited() {
    let h = harness();
    let (user_id, account) = h.customer(true).await;
    let effective = Utc::now() - Duration::days(3);

    let posting = h
        .core
        .admin
        .manual_deposit(
            h.admin_id,
            ManualAdjustment {
                account_id: account.id,
                amount: usd("200.00"),
                effective_date: Some(effective),
                notes: Some("branch cash deposit".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(posting.transaction.status, TransactionStatus::Completed);
    assert_eq!(posting.transaction.created_at, effective);
    assert_eq!(posting.account.balance, usd("200.00"));
    assert_eq!(
        posting.transaction.description.as_deref(),
        Some("branch cash deposit")
    );

    let trail = h.core.admin.audit_trail(user_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action_type, AdminActionType::ManualDeposit);
    assert_eq!(trail[0].admin_id, h.admin_id);
    assert_eq!(trail[0].details["amount"], "200.00");

    let history = h.core.journal.balance_history(account.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, effective.date_naive());
    assert_eq!(history[0].balance, usd("200.00"));

    let notifications = h
        .core
        .notifications
        .list_recent(NotificationTarget::User(user_id), None)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].issued_by, Some(h.admin_id));
}

#[tokio::test]
async fn test_manual_withdrawal_cannot_overdraw() {
    let h = harness();
    let (user_id, account) = h.funded_customer("30.00").await;

    let result = h
        .core
        .admin
        .manual_withdrawal(
            h.admin_id,
            ManualAdjustment {
                account_id: account.id,
                amount: usd("30.01"),
                effective_date: None,
                notes: None,
            },
        )
        .await;
    assert_eq!(result.unwrap_err(), LedgerError::InsufficientFunds(account.id));
    assert_eq!(h.balance(account.id).await, usd("30.00"));

    // Only the funding deposit was audited.
    let trail = h.core.admin.audit_trail(user_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(h.store.transaction_count(account.id).await, 1);
}

#[tokio::test]
async fn test_permission_toggle_gates_transfers() {
    let h = harness();
    let (user_id, account) = h.funded_customer("100.00").await;

    h.core
        .admin
        .set_transaction_permission(h.admin_id, user_id, false, Some("KYC review".to_string()))
        .await
        .unwrap();
    let blocked = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await;
    assert!(matches!(blocked, Err(LedgerError::Blocked(_))));

    h.core
        .admin
        .set_transaction_permission(h.admin_id, user_id, true, None)
        .await
        .unwrap();
    h.core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await
        .unwrap();

    let actions: Vec<_> = h
        .core
        .admin
        .audit_trail(user_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.action_type == AdminActionType::SetTransactionPermission)
        .collect();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].details["allowed"], false);
    assert_eq!(actions[0].details["reason"], "KYC review");
}

#[tokio::test]
async fn test_account_status_rules() {
    let h = harness();
    let (user_id, account) = h.funded_customer("100.00").await;

    let restricted = h
        .core
        .admin
        .set_account_status(h.admin_id, account.id, AccountStatus::Restricted)
        .await
        .unwrap();
    assert_eq!(restricted.status, AccountStatus::Restricted);

    let blocked = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await;
    assert!(matches!(blocked, Err(LedgerError::Blocked(_))));

    // Administrators may lift a restriction.
    h.core
        .admin
        .set_account_status(h.admin_id, account.id, AccountStatus::Active)
        .await
        .unwrap();

    h.core
        .admin
        .set_account_status(h.admin_id, account.id, AccountStatus::Closed)
        .await
        .unwrap();
    let reopen = h
        .core
        .admin
        .set_account_status(h.admin_id, account.id, AccountStatus::Active)
        .await;
    assert!(matches!(
        reopen,
        Err(LedgerError::InvalidStatusChange {
            from: AccountStatus::Closed,
            to: AccountStatus::Active,
        })
    ));

    let closed = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await;
    assert_eq!(closed.unwrap_err(), LedgerError::AccountNotActive(account.id));
}

#[tokio::test]
async fn test_resolve_pending_fails_transfer_and_audits() {
    let h = harness();
    let (user_id, account) = h.funded_customer("100.00").await;
    let receipt = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "40.00"))
        .await
        .unwrap();

    let failed = h
        .core
        .admin
        .resolve_pending(h.admin_id, receipt.transaction_id, "suspected fraud")
        .await
        .unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert_eq!(h.balance(account.id).await, usd("100.00"));

    let trail = h.core.admin.audit_trail(user_id).await.unwrap();
    assert!(trail
        .iter()
        .any(|a| a.action_type == AdminActionType::ResolvePending));

    let again = h
        .core
        .admin
        .resolve_pending(h.admin_id, receipt.transaction_id, "twice")
        .await;
    assert!(matches!(again, Err(LedgerError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_resolve_pending_requires_reason() {
    let h = harness();
    let result = h
        .core
        .admin
        .resolve_pending(h.admin_id, Uuid::new_v4(), "   ")
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidParties(_))));
}

#[tokio::test]
async fn test_disputed_entry_still_counts_as_settled() {
    let h = harness();
    let (user_id, account) = h.customer(true).await;
    let posting = h
        .core
        .admin
        .manual_deposit(
            h.admin_id,
            ManualAdjustment {
                account_id: account.id,
                amount: usd("75.00"),
                effective_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let disputed = h
        .core
        .admin
        .mark_disputed(h.admin_id, posting.transaction.id, "customer says duplicate")
        .await
        .unwrap();
    assert_eq!(disputed.status, TransactionStatus::Disputed);
    assert_eq!(disputed.dispute_note.as_deref(), Some("customer says duplicate"));

    assert_eq!(h.core.journal.replay_balance(account.id).await.unwrap(), usd("75.00"));
    assert!(h.core.ledger.reconcile(account.id).await.unwrap().consistent);

    let notifications = h
        .core
        .notifications
        .list_recent(NotificationTarget::User(user_id), None)
        .await
        .unwrap();
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationType::Warning && n.title == "Transaction Disputed"));
}

#[tokio::test]
async fn test_only_completed_entries_can_be_disputed() {
    let h = harness();
    let (user_id, account) = h.funded_customer("100.00").await;
    let receipt = h
        .core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await
        .unwrap();

    let result = h
        .core
        .admin
        .mark_disputed(h.admin_id, receipt.transaction_id, "not mine")
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
}
