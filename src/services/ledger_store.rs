//! Ledger Store: the only writer of account balances.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Account, AccountStatus, AdminAction, Transaction};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{AccountRepository, JournalRepository, Posting, PostingRepository};
use crate::services::events::EventBus;
use crate::services::journal::replay;

/// Stored balance next to the balance replayed from the journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub account_id: Uuid,
    pub stored_balance: BigDecimal,
    pub replayed_balance: BigDecimal,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct LedgerStore {
    accounts: Arc<dyn AccountRepository>,
    postings: Arc<dyn PostingRepository>,
    journal: Arc<dyn JournalRepository>,
    events: EventBus,
}

impl LedgerStore {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        postings: Arc<dyn PostingRepository>,
        journal: Arc<dyn JournalRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            accounts,
            postings,
            journal,
            events,
        }
    }

    pub async fn get_account(&self, id: Uuid) -> LedgerResult<Account> {
        Ok(self.accounts.get_account(id).await?)
    }

    pub async fn accounts_for_user(&self, user_id: Uuid) -> LedgerResult<Vec<Account>> {
        Ok(self.accounts.list_accounts_for_user(user_id).await?)
    }

    /// Atomic signed change. Callers record the matching journal entry.
    pub async fn adjust_balance(&self, id: Uuid, delta: &BigDecimal) -> LedgerResult<Account> {
        let account = self.accounts.adjust_balance(id, delta).await?;
        tracing::info!(
            account_id = %id,
            delta = %delta,
            balance = %account.balance,
            version = account.version,
            "balance adjusted"
        );
        Ok(account)
    }

    /// Complete a pending entry and apply its effect as one unit.
    pub async fn settle_pending(&self, pending: &Transaction) -> LedgerResult<Posting> {
        let posting = self
            .postings
            .settle_pending(pending.id, &pending.signed_amount())
            .await?;
        tracing::info!(
            transaction_id = %pending.id,
            account_id = %posting.account.id,
            balance = %posting.account.balance,
            "pending transaction settled"
        );
        self.events.publish(&posting.transaction);
        Ok(posting)
    }

    /// Record an already-completed entry, apply its effect and append the
    /// audit entry as one unit.
    pub async fn post_completed(
        &self,
        tx: &Transaction,
        audit: Option<&AdminAction>,
    ) -> LedgerResult<Posting> {
        let posting = self
            .postings
            .post_completed(tx, &tx.signed_amount(), audit)
            .await?;
        tracing::info!(
            transaction_id = %tx.id,
            account_id = %posting.account.id,
            balance = %posting.account.balance,
            "completed transaction posted"
        );
        self.events.publish(&posting.transaction);
        Ok(posting)
    }

    pub async fn find_account_by_type(
        &self,
        user_id: Uuid,
        account_type: &str,
    ) -> LedgerResult<Option<Account>> {
        Ok(self.accounts.find_account_by_type(user_id, account_type).await?)
    }

    /// New empty active account; balance starts at zero.
    pub async fn open_account(
        &self,
        user_id: Uuid,
        account_type: &str,
        currency: &str,
    ) -> LedgerResult<Account> {
        let account = self
            .accounts
            .insert_account(&Account::open(user_id, account_type, currency))
            .await?;
        tracing::info!(account_id = %account.id, user_id = %user_id, account_type, "account opened");
        Ok(account)
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: AccountStatus,
        administrative: bool,
    ) -> LedgerResult<Account> {
        let current = self.accounts.get_account(id).await?;
        if !current.status.can_transition_to(status, administrative) {
            return Err(LedgerError::InvalidStatusChange {
                from: current.status,
                to: status,
            });
        }

        let account = self.accounts.set_status(id, status).await?;
        tracing::info!(account_id = %id, from = current.status.as_str(), to = status.as_str(), "account status changed");
        Ok(account)
    }

    pub async fn reconcile(&self, id: Uuid) -> LedgerResult<Reconciliation> {
        let account = self.accounts.get_account(id).await?;
        let settled = self.journal.list_settled(id).await?;
        let replayed_balance = replay(&settled);
        let consistent = replayed_balance == account.balance;
        if !consistent {
            tracing::warn!(
                account_id = %id,
                stored = %account.balance,
                replayed = %replayed_balance,
                "ledger out of balance"
            );
        }

        Ok(Reconciliation {
            account_id: id,
            stored_balance: account.balance,
            replayed_balance,
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{TransactionStatus, TransactionType};
    use std::str::FromStr;

    fn usd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn ledger(store: &Arc<MemoryStore>) -> LedgerStore {
        LedgerStore::new(store.clone(), store.clone(), store.clone(), EventBus::default())
    }

    #[tokio::test]
    async fn test_posting_keeps_ledger_consistent() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(&store);
        let account = ledger.open_account(Uuid::new_v4(), "savings", "USD").await.unwrap();

        let deposit = Transaction::new(
            account.id,
            account.user_id,
            TransactionType::Deposit,
            usd("75.25"),
            "USD",
            TransactionStatus::Completed,
        );
        let posting = ledger.post_completed(&deposit, None).await.unwrap();
        assert_eq!(posting.account.balance, usd("75.25"));

        let report = ledger.reconcile(account.id).await.unwrap();
        assert!(report.consistent);
    }

    #[tokio::test]
    async fn test_unjournaled_adjustment_shows_in_reconcile() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(&store);
        let account = ledger.open_account(Uuid::new_v4(), "checking", "USD").await.unwrap();

        ledger.adjust_balance(account.id, &usd("10.00")).await.unwrap();

        let report = ledger.reconcile(account.id).await.unwrap();
        assert!(!report.consistent);
        assert_eq!(report.replayed_balance, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_closed_account_cannot_reopen() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(&store);
        let account = ledger.open_account(Uuid::new_v4(), "checking", "USD").await.unwrap();

        ledger.set_status(account.id, AccountStatus::Closed, true).await.unwrap();
        let err = ledger
            .set_status(account.id, AccountStatus::Active, true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS_CHANGE");
    }
}
