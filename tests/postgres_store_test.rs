//! Runs against a real Postgres when `DATABASE_URL` is set; skipped otherwise.

mod common;

use std::sync::Arc;
use uuid::Uuid;

use common::{transfer, usd, CapturingSender};
use vaultbank_core::adapters::PgStore;
use vaultbank_core::db::{create_pool, run_migrations};
use vaultbank_core::domain::{
    Account, NewRecipient, Profile, TransactionFilter, TransactionStatus, TransferRecipient,
};
use vaultbank_core::error::LedgerError;
use vaultbank_core::ports::{
    AccountRepository, ProfileRepository, RecipientRepository, RepositoryError,
};
use vaultbank_core::use_cases::{Core, CoreSettings, ManualAdjustment};

async fn store() -> Option<Arc<PgStore>> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping Postgres store test");
            return None;
        }
    };
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Some(Arc::new(PgStore::new(pool)))
}

async fn customer(store: &PgStore, core: &Core, amount: &str) -> (Uuid, Account) {
    let user_id = Uuid::new_v4();
    store
        .upsert_profile(&Profile {
            user_id,
            email: format!("{}@example.com", user_id.simple()),
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
                amount: usd(amount),
                effective_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    (user_id, account)
}

#[tokio::test]
async fn test_pg_balance_never_goes_negative() {
    let Some(store) = store().await else { return };
    let core = Core::new(
        store.clone(),
        Arc::new(CapturingSender::default()),
        CoreSettings::default(),
    );
    let (_user_id, account) = customer(&store, &core, "10.00").await;

    let result = store.adjust_balance(account.id, &usd("-10.01")).await;
    assert!(matches!(result, Err(RepositoryError::InsufficientFunds(id)) if id == account.id));

    let after = store.adjust_balance(account.id, &usd("-10.00")).await.unwrap();
    assert_eq!(after.balance, usd("0.00"));
    assert_eq!(after.available_balance, usd("0.00"));
}

#[tokio::test]
async fn test_pg_transfer_confirmation_flow() {
    let Some(store) = store().await else { return };
    let codes = Arc::new(CapturingSender::default());
    let core = Core::new(store.clone(), codes.clone(), CoreSettings::default());
    let (user_id, account) = customer(&store, &core, "500.00").await;

    let receipt = core
        .transfers
        .initiate(user_id, transfer(account.id, "120.00"))
        .await
        .unwrap();
    let code = codes.last_code().unwrap();

    let duplicate = core.otp.issue(user_id, receipt.transaction_id).await;
    assert_eq!(
        duplicate,
        Err(LedgerError::DuplicatePending(receipt.transaction_id))
    );

    let settled = core
        .transfers
        .confirm(user_id, receipt.transaction_id, &code)
        .await
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);

    let account = core.ledger.get_account(account.id).await.unwrap();
    assert_eq!(account.balance, usd("380.00"));
    assert!(core.ledger.reconcile(account.id).await.unwrap().consistent);

    let replay = core
        .transfers
        .confirm(user_id, receipt.transaction_id, &code)
        .await;
    assert!(matches!(replay, Err(LedgerError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_pg_recipient_insert_is_idempotent() {
    let Some(store) = store().await else { return };
    let user_id = Uuid::new_v4();
    let new = NewRecipient {
        recipient_name: "Jane Doe".to_string(),
        bank_name: None,
        account_identifier: format!("ACC-{}", Uuid::new_v4().simple()),
    };

    let first = store
        .insert_recipient(&TransferRecipient::from_new(user_id, &new))
        .await
        .unwrap();
    let second = store
        .insert_recipient(&TransferRecipient::from_new(user_id, &new))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let later = chrono::Utc::now();
    let earlier = later - chrono::Duration::hours(1);
    store.touch_recipient(first.id, later).await.unwrap();
    let touched = store.touch_recipient(first.id, earlier).await.unwrap();
    assert!(touched.last_used_at.unwrap() >= later - chrono::Duration::milliseconds(1));
}

#[tokio::test]
async fn test_pg_keyset_pages_do_not_overlap() {
    let Some(store) = store().await else { return };
    let core = Core::new(
        store.clone(),
        Arc::new(CapturingSender::default()),
        CoreSettings::default(),
    );
    let (_user_id, account) = customer(&store, &core, "1.00").await;
    for amount in ["2.00", "3.00", "4.00"] {
        core.admin
            .manual_deposit(
                Uuid::new_v4(),
                ManualAdjustment {
                    account_id: account.id,
                    amount: usd(amount),
                    effective_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let filter = TransactionFilter::default();
    let first = core
        .journal
        .list_page(account.id, &filter, None, Some(3))
        .await
        .unwrap();
    let second = core
        .journal
        .list_page(account.id, &filter, first.next_cursor.as_deref(), Some(3))
        .await
        .unwrap();

    assert_eq!(first.items.len(), 3);
    assert_eq!(second.items.len(), 1);
    assert!(second.next_cursor.is_none());
    assert!(first.items.iter().all(|a| second.items.iter().all(|b| a.id != b.id)));
}
