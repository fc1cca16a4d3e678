//! Ports: the persistence and delivery seams the core is written against.
//!
//! Every store (in-memory, Postgres) implements all of these. Methods that
//! mutate balances are conditional, single-unit operations: implementations
//! must never read a balance, decide in application code, and write it back.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Account, AccountRequest, AccountStatus, AdminAction, Notification, NotificationTarget,
    OtpChallenge, Profile, Transaction, TransactionFilter, TransactionStatus, TransferRecipient,
};
use crate::utils::cursor::Cursor;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("account {0} is not active")]
    AccountNotActive(Uuid),

    #[error("insufficient funds on account {0}")]
    InsufficientFunds(Uuid),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("a live challenge already exists for transaction {0}")]
    DuplicatePending(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// The transaction and account rows written by one atomic posting.
#[derive(Debug, Clone, Serialize)]
pub struct Posting {
    pub transaction: Transaction,
    pub account: Account,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_account(&self, id: Uuid) -> RepositoryResult<Account>;

    async fn list_accounts_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Account>>;

    async fn find_account_by_type(
        &self,
        user_id: Uuid,
        account_type: &str,
    ) -> RepositoryResult<Option<Account>>;

    async fn insert_account(&self, account: &Account) -> RepositoryResult<Account>;

    /// Apply `delta` to balance and available balance in one conditional
    /// update. Fails `AccountNotActive` unless the account is active and
    /// `InsufficientFunds` if a debit would take available balance below zero.
    async fn adjust_balance(&self, id: Uuid, delta: &BigDecimal) -> RepositoryResult<Account>;

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> RepositoryResult<Account>;
}

#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// Conditional status change: succeeds only while the row is in `from`.
    async fn update_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction>;

    /// Completed -> disputed with an annotation.
    async fn mark_disputed(&self, id: Uuid, note: &str) -> RepositoryResult<Transaction>;

    /// One page, newest first, strictly after `cursor` in that order.
    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>>;

    /// Settled entries for an account, oldest first.
    async fn list_settled(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>>;

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>>;
}

/// Journal and ledger writes that must commit together.
#[async_trait]
pub trait PostingRepository: Send + Sync {
    /// Move a pending entry to completed and apply `delta` to its account,
    /// both or neither.
    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        delta: &BigDecimal,
    ) -> RepositoryResult<Posting>;

    /// Insert an already-completed entry, apply `delta` and append the audit
    /// entry, both or neither.
    async fn post_completed(
        &self,
        tx: &Transaction,
        delta: &BigDecimal,
        audit: Option<&AdminAction>,
    ) -> RepositoryResult<Posting>;
}

#[async_trait]
pub trait RecipientRepository: Send + Sync {
    async fn get_recipient(&self, id: Uuid) -> RepositoryResult<TransferRecipient>;

    async fn find_recipient(
        &self,
        user_id: Uuid,
        account_identifier: &str,
    ) -> RepositoryResult<Option<TransferRecipient>>;

    /// Insert unless `(user_id, account_identifier)` already exists, in which
    /// case the existing row is returned.
    async fn insert_recipient(
        &self,
        recipient: &TransferRecipient,
    ) -> RepositoryResult<TransferRecipient>;

    /// Move `last_used_at` forward to `at`; never backwards.
    async fn touch_recipient(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<TransferRecipient>;

    async fn list_recipients(&self, user_id: Uuid) -> RepositoryResult<Vec<TransferRecipient>>;
}

#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Persist the challenge unless a live one exists for the same
    /// transaction at `now` (`DuplicatePending`).
    async fn insert_challenge(
        &self,
        challenge: &OtpChallenge,
        now: DateTime<Utc>,
    ) -> RepositoryResult<OtpChallenge>;

    /// Most recently issued challenge for the transaction, any state.
    async fn latest_challenge(
        &self,
        transaction_id: Uuid,
    ) -> RepositoryResult<Option<OtpChallenge>>;

    /// Mark consumed if still unconsumed. Returns false when another caller
    /// consumed it first.
    async fn consume_challenge(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool>;

    /// Abandon every unconsumed challenge of the transaction.
    async fn abandon_challenges(
        &self,
        transaction_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, n: &Notification) -> RepositoryResult<Notification>;

    async fn get_notification(&self, id: Uuid) -> RepositoryResult<Notification>;

    async fn list_notifications(
        &self,
        target: NotificationTarget,
        limit: i64,
    ) -> RepositoryResult<Vec<Notification>>;

    async fn mark_read(&self, id: Uuid) -> RepositoryResult<Notification>;

    async fn mark_all_read(&self, target: NotificationTarget) -> RepositoryResult<u64>;

    async fn unread_count(&self, target: NotificationTarget) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record_action(&self, action: &AdminAction) -> RepositoryResult<AdminAction>;

    async fn list_actions_for_user(&self, target_user_id: Uuid)
        -> RepositoryResult<Vec<AdminAction>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Profile>;

    async fn upsert_profile(&self, profile: &Profile) -> RepositoryResult<Profile>;

    async fn set_transaction_permission(
        &self,
        user_id: Uuid,
        allowed: bool,
    ) -> RepositoryResult<Profile>;
}

#[async_trait]
pub trait AccountRequestRepository: Send + Sync {
    async fn insert_request(&self, request: &AccountRequest) -> RepositoryResult<AccountRequest>;

    async fn list_pending_requests_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AccountRequest>>;

    /// Move a pending request to approved. Returns `None` when the request
    /// is no longer pending.
    async fn claim_request(&self, id: Uuid) -> RepositoryResult<Option<AccountRequest>>;
}

/// Everything a full store provides.
pub trait LedgerBackend:
    AccountRepository
    + JournalRepository
    + PostingRepository
    + RecipientRepository
    + OtpRepository
    + NotificationRepository
    + AuditRepository
    + ProfileRepository
    + AccountRequestRepository
{
}

impl<T> LedgerBackend for T where
    T: AccountRepository
        + JournalRepository
        + PostingRepository
        + RecipientRepository
        + OtpRepository
        + NotificationRepository
        + AuditRepository
        + ProfileRepository
        + AccountRequestRepository
{
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(String),

    #[error("delivery endpoint rejected the message with status {0}")]
    Rejected(u16),

    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
}

/// Outbound collaborator that gets a one-time code to the user.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError>;
}
