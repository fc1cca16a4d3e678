//! In-process implementation of every port.
//!
//! All state sits behind one `RwLock`; every method takes the lock once, so
//! each call is a single atomic unit, the same guarantee the Postgres store
//! gets from conditional statements and database transactions.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Account, AccountRequest, AccountRequestStatus, AccountStatus, AdminAction, Notification,
    NotificationTarget, OtpChallenge, Profile, Transaction, TransactionFilter, TransactionStatus,
    TransferRecipient,
};
use crate::ports::{
    AccountRepository, AccountRequestRepository, AuditRepository, JournalRepository,
    NotificationRepository, OtpRepository, Posting, PostingRepository, ProfileRepository,
    RecipientRepository, RepositoryError, RepositoryResult,
};
use crate::utils::cursor::Cursor;

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, Transaction>,
    recipients: HashMap<Uuid, TransferRecipient>,
    challenges: Vec<OtpChallenge>,
    notifications: Vec<Notification>,
    actions: Vec<AdminAction>,
    profiles: HashMap<Uuid, Profile>,
    requests: HashMap<Uuid, AccountRequest>,
}

impl State {
    fn account(&self, id: Uuid) -> RepositoryResult<&Account> {
        self.accounts
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", id)))
    }

    fn transaction(&self, id: Uuid) -> RepositoryResult<&Transaction> {
        self.transactions
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    /// Checks a balance change against the account without applying it.
    fn check_adjustment(&self, id: Uuid, delta: &BigDecimal) -> RepositoryResult<()> {
        let account = self.account(id)?;
        if !account.is_active() {
            return Err(RepositoryError::AccountNotActive(id));
        }
        if &account.available_balance + delta < BigDecimal::from(0) {
            return Err(RepositoryError::InsufficientFunds(id));
        }
        Ok(())
    }

    fn apply_adjustment(&mut self, id: Uuid, delta: &BigDecimal) -> RepositoryResult<Account> {
        self.check_adjustment(id, delta)?;
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", id)))?;
        account.balance = &account.balance + delta;
        account.available_balance = &account.available_balance + delta;
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn targets(n: &Notification, target: NotificationTarget) -> bool {
        n.target == target
    }
}

/// Volatile store used by tests and by local runs without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_challenges(&self, transaction_id: Uuid) -> Vec<OtpChallenge> {
        let state = self.state.read().await;
        state
            .challenges
            .iter()
            .filter(|c| c.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    pub async fn transaction_count(&self, account_id: Uuid) -> usize {
        let state = self.state.read().await;
        state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .count()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn get_account(&self, id: Uuid) -> RepositoryResult<Account> {
        self.state.read().await.account(id).cloned()
    }

    async fn list_accounts_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn find_account_by_type(
        &self,
        user_id: Uuid,
        account_type: &str,
    ) -> RepositoryResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.user_id == user_id && a.account_type == account_type)
            .cloned())
    }

    async fn insert_account(&self, account: &Account) -> RepositoryResult<Account> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(RepositoryError::Conflict(format!("account {}", account.id)));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn adjust_balance(&self, id: Uuid, delta: &BigDecimal) -> RepositoryResult<Account> {
        self.state.write().await.apply_adjustment(id, delta)
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> RepositoryResult<Account> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", id)))?;
        account.status = status;
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

#[async_trait]
impl JournalRepository for MemoryStore {
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        state.account(tx.account_id)?;
        if state.transactions.contains_key(&tx.id) {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }
        state.transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.state.read().await.transaction(id).cloned()
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        if tx.status != from {
            return Err(RepositoryError::InvalidTransition { from: tx.status, to });
        }
        tx.status = to;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn mark_disputed(&self, id: Uuid, note: &str) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        if tx.status != TransactionStatus::Completed {
            return Err(RepositoryError::InvalidTransition {
                from: tx.status,
                to: TransactionStatus::Disputed,
            });
        }
        tx.status = TransactionStatus::Disputed;
        tx.dispute_note = Some(note.to_string());
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id && filter.matches(t))
            .filter(|t| cursor.map_or(true, |c| c.precedes(t.created_at, t.id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_settled(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id && t.status.is_settled())
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(rows)
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending && t.created_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl PostingRepository for MemoryStore {
    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        delta: &BigDecimal,
    ) -> RepositoryResult<Posting> {
        let mut state = self.state.write().await;
        let tx = state.transaction(transaction_id)?.clone();
        if tx.status != TransactionStatus::Pending {
            return Err(RepositoryError::InvalidTransition {
                from: tx.status,
                to: TransactionStatus::Completed,
            });
        }

        let account = state.apply_adjustment(tx.account_id, delta)?;
        let stored = state
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", transaction_id)))?;
        stored.status = TransactionStatus::Completed;
        stored.updated_at = Utc::now();

        Ok(Posting {
            transaction: stored.clone(),
            account,
        })
    }

    async fn post_completed(
        &self,
        tx: &Transaction,
        delta: &BigDecimal,
        audit: Option<&AdminAction>,
    ) -> RepositoryResult<Posting> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&tx.id) {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }

        let account = state.apply_adjustment(tx.account_id, delta)?;
        state.transactions.insert(tx.id, tx.clone());
        if let Some(action) = audit {
            state.actions.push(action.clone());
        }

        Ok(Posting {
            transaction: tx.clone(),
            account,
        })
    }
}

#[async_trait]
impl RecipientRepository for MemoryStore {
    async fn get_recipient(&self, id: Uuid) -> RepositoryResult<TransferRecipient> {
        let state = self.state.read().await;
        state
            .recipients
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("recipient {}", id)))
    }

    async fn find_recipient(
        &self,
        user_id: Uuid,
        account_identifier: &str,
    ) -> RepositoryResult<Option<TransferRecipient>> {
        let state = self.state.read().await;
        Ok(state
            .recipients
            .values()
            .find(|r| r.user_id == user_id && r.account_identifier == account_identifier)
            .cloned())
    }

    async fn insert_recipient(
        &self,
        recipient: &TransferRecipient,
    ) -> RepositoryResult<TransferRecipient> {
        let mut state = self.state.write().await;
        let existing = state.recipients.values().find(|r| {
            r.user_id == recipient.user_id && r.account_identifier == recipient.account_identifier
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }
        state.recipients.insert(recipient.id, recipient.clone());
        Ok(recipient.clone())
    }

    async fn touch_recipient(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<TransferRecipient> {
        let mut state = self.state.write().await;
        let recipient = state
            .recipients
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("recipient {}", id)))?;
        recipient.last_used_at = Some(recipient.touched_at(at));
        Ok(recipient.clone())
    }

    async fn list_recipients(&self, user_id: Uuid) -> RepositoryResult<Vec<TransferRecipient>> {
        let state = self.state.read().await;
        let mut rows: Vec<TransferRecipient> = state
            .recipients
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(rows)
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn insert_challenge(
        &self,
        challenge: &OtpChallenge,
        now: DateTime<Utc>,
    ) -> RepositoryResult<OtpChallenge> {
        let mut state = self.state.write().await;
        let live = state
            .challenges
            .iter()
            .any(|c| c.transaction_id == challenge.transaction_id && c.is_live_at(now));
        if live {
            return Err(RepositoryError::DuplicatePending(challenge.transaction_id));
        }
        state.challenges.push(challenge.clone());
        Ok(challenge.clone())
    }

    async fn latest_challenge(
        &self,
        transaction_id: Uuid,
    ) -> RepositoryResult<Option<OtpChallenge>> {
        let state = self.state.read().await;
        Ok(state
            .challenges
            .iter()
            .filter(|c| c.transaction_id == transaction_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn consume_challenge(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let challenge = state
            .challenges
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("challenge {}", id)))?;
        if challenge.consumed_at.is_some() || challenge.abandoned_at.is_some() {
            return Ok(false);
        }
        challenge.consumed_at = Some(at);
        Ok(true)
    }

    async fn abandon_challenges(
        &self,
        transaction_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for c in state.challenges.iter_mut().filter(|c| {
            c.transaction_id == transaction_id && c.consumed_at.is_none() && c.abandoned_at.is_none()
        }) {
            c.abandoned_at = Some(at);
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, n: &Notification) -> RepositoryResult<Notification> {
        self.state.write().await.notifications.push(n.clone());
        Ok(n.clone())
    }

    async fn get_notification(&self, id: Uuid) -> RepositoryResult<Notification> {
        let state = self.state.read().await;
        state
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("notification {}", id)))
    }

    async fn list_notifications(
        &self,
        target: NotificationTarget,
        limit: i64,
    ) -> RepositoryResult<Vec<Notification>> {
        let state = self.state.read().await;
        let mut rows: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| State::targets(n, target))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid) -> RepositoryResult<Notification> {
        let mut state = self.state.write().await;
        let n = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("notification {}", id)))?;
        n.is_read = true;
        Ok(n.clone())
    }

    async fn mark_all_read(&self, target: NotificationTarget) -> RepositoryResult<u64> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.target == target && !n.is_read)
        {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn unread_count(&self, target: NotificationTarget) -> RepositoryResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| State::targets(n, target) && !n.is_read)
            .count() as i64)
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn record_action(&self, action: &AdminAction) -> RepositoryResult<AdminAction> {
        self.state.write().await.actions.push(action.clone());
        Ok(action.clone())
    }

    async fn list_actions_for_user(
        &self,
        target_user_id: Uuid,
    ) -> RepositoryResult<Vec<AdminAction>> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .filter(|a| a.target_user_id == target_user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Profile> {
        let state = self.state.read().await;
        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("profile {}", user_id)))
    }

    async fn upsert_profile(&self, profile: &Profile) -> RepositoryResult<Profile> {
        let mut state = self.state.write().await;
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn set_transaction_permission(
        &self,
        user_id: Uuid,
        allowed: bool,
    ) -> RepositoryResult<Profile> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("profile {}", user_id)))?;
        profile.can_transact = allowed;
        Ok(profile.clone())
    }
}

#[async_trait]
impl AccountRequestRepository for MemoryStore {
    async fn insert_request(&self, request: &AccountRequest) -> RepositoryResult<AccountRequest> {
        let mut state = self.state.write().await;
        state.requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn list_pending_requests_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AccountRequest>> {
        let state = self.state.read().await;
        let mut rows: Vec<AccountRequest> = state
            .requests
            .values()
            .filter(|r| r.status == AccountRequestStatus::Pending && r.created_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn claim_request(&self, id: Uuid) -> RepositoryResult<Option<AccountRequest>> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account request {}", id)))?;
        if request.status != AccountRequestStatus::Pending {
            return Ok(None);
        }
        request.status = AccountRequestStatus::Approved;
        Ok(Some(request.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;
    use std::str::FromStr;

    fn usd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    async fn funded_account(store: &MemoryStore, amount: &str) -> Account {
        let account = Account::open(Uuid::new_v4(), "checking", "USD");
        store.insert_account(&account).await.unwrap();
        store.adjust_balance(account.id, &usd(amount)).await.unwrap()
    }

    #[tokio::test]
    async fn test_debit_below_zero_is_rejected() {
        let store = MemoryStore::new();
        let account = funded_account(&store, "50.00").await;

        let err = store.adjust_balance(account.id, &usd("-50.01")).await.unwrap_err();
        assert_eq!(err, RepositoryError::InsufficientFunds(account.id));

        let unchanged = store.get_account(account.id).await.unwrap();
        assert_eq!(unchanged.balance, usd("50.00"));
    }

    #[tokio::test]
    async fn test_inactive_account_rejects_adjustment() {
        let store = MemoryStore::new();
        let account = funded_account(&store, "10.00").await;
        store.set_status(account.id, AccountStatus::Restricted).await.unwrap();

        let err = store.adjust_balance(account.id, &usd("1.00")).await.unwrap_err();
        assert_eq!(err, RepositoryError::AccountNotActive(account.id));
    }

    #[tokio::test]
    async fn test_settle_is_all_or_nothing() {
        let store = MemoryStore::new();
        let account = funded_account(&store, "50.00").await;
        let tx = Transaction::new(
            account.id,
            account.user_id,
            TransactionType::Transfer,
            usd("100.00"),
            "USD",
            TransactionStatus::Pending,
        );
        store.insert_transaction(&tx).await.unwrap();

        let err = store.settle_pending(tx.id, &tx.signed_amount()).await.unwrap_err();
        assert_eq!(err, RepositoryError::InsufficientFunds(account.id));

        let stored = store.get_transaction(tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(store.get_account(account.id).await.unwrap().balance, usd("50.00"));
    }

    #[tokio::test]
    async fn test_recipient_insert_is_idempotent_per_destination() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let new = crate::domain::NewRecipient {
            recipient_name: "Ada".into(),
            bank_name: Some("First Bank".into()),
            account_identifier: "0011223344".into(),
        };
        let first = store
            .insert_recipient(&TransferRecipient::from_new(user, &new))
            .await
            .unwrap();
        let second = store
            .insert_recipient(&TransferRecipient::from_new(user, &new))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_recipients(user).await.unwrap().len(), 1);
    }
}
