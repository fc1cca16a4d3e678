//! Transfer Orchestrator.
//! The only path by which a user-initiated transfer becomes a balance change.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Account, AccountStatus, NewRecipient, NotificationType, Transaction, TransactionStatus,
    TransactionType, TransferRecipient, VerifyOutcome,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{CodeSender, ProfileRepository, RecipientRepository, RepositoryError};
use crate::services::{LedgerStore, NotificationDispatcher, OtpGate, TransactionJournal};
use crate::validation::{
    clean_notes, sanitize_string, validate_amount, validate_max_len, validate_required,
    ACCOUNT_IDENTIFIER_MAX_LEN, RECIPIENT_NAME_MAX_LEN,
};

/// Decides whether a transaction needs a one-time code before it settles.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    enabled: bool,
    exempt_accounts: HashSet<Uuid>,
}

impl OtpPolicy {
    pub fn new(enabled: bool, exempt_accounts: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            enabled,
            exempt_accounts: exempt_accounts.into_iter().collect(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, [])
    }

    pub fn type_requires_otp(kind: TransactionType) -> bool {
        matches!(
            kind,
            TransactionType::Transfer | TransactionType::Payment | TransactionType::Withdrawal
        )
    }

    pub fn requires_otp(&self, account_id: Uuid, kind: TransactionType) -> bool {
        self.enabled
            && Self::type_requires_otp(kind)
            && !self.exempt_accounts.contains(&account_id)
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::new(true, [])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRef {
    Saved(Uuid),
    New(NewRecipient),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub account_id: Uuid,
    pub recipient: RecipientRef,
    pub amount: BigDecimal,
    pub description: Option<String>,
}

/// Display-only summary handed back after initiation.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transaction_id: Uuid,
    pub from_account: String,
    pub recipient_name: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub otp_required: bool,
}

#[derive(Clone)]
pub struct TransferOrchestrator {
    ledger: LedgerStore,
    journal: TransactionJournal,
    otp: OtpGate,
    notifications: NotificationDispatcher,
    recipients: Arc<dyn RecipientRepository>,
    profiles: Arc<dyn ProfileRepository>,
    code_sender: Arc<dyn CodeSender>,
    policy: OtpPolicy,
}

impl TransferOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: LedgerStore,
        journal: TransactionJournal,
        otp: OtpGate,
        notifications: NotificationDispatcher,
        recipients: Arc<dyn RecipientRepository>,
        profiles: Arc<dyn ProfileRepository>,
        code_sender: Arc<dyn CodeSender>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            ledger,
            journal,
            otp,
            notifications,
            recipients,
            profiles,
            code_sender,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    pub async fn initiate(
        &self,
        user_id: Uuid,
        request: TransferRequest,
    ) -> LedgerResult<TransferReceipt> {
        let profile = self.profiles.get_profile(user_id).await?;
        if !profile.can_transact {
            return Err(self.blocked(user_id, request.account_id).await);
        }

        let account = self.owned_account(user_id, request.account_id).await?;
        if account.status == AccountStatus::Restricted {
            return Err(self.blocked(user_id, account.id).await);
        }
        if !account.is_active() {
            return Err(LedgerError::AccountNotActive(account.id));
        }

        validate_amount(&request.amount, &account.currency)?;
        let description = clean_notes(request.description.as_deref())?;
        let recipient = self.resolve_recipient(user_id, request.recipient).await?;

        let mut pending = Transaction::new(
            account.id,
            user_id,
            TransactionType::Transfer,
            request.amount,
            &account.currency,
            TransactionStatus::Pending,
        )
        .with_recipient(recipient.id)
        .with_description(
            description.unwrap_or_else(|| format!("Transfer to {}", recipient.recipient_name)),
        );
        pending = self.journal.record(&pending).await?;

        self.recipients
            .touch_recipient(recipient.id, pending.created_at)
            .await?;

        self.notifications
            .notify_user(
                user_id,
                NotificationType::Pending,
                "Transfer Pending",
                &format!(
                    "Your transfer of {} {} to {} is pending.",
                    pending.amount, pending.currency, recipient.recipient_name
                ),
            )
            .await;

        let otp_required = self.policy.requires_otp(account.id, pending.transaction_type);
        let status = if otp_required {
            let code = self.otp.issue(user_id, pending.id).await?;
            self.deliver_code(&profile.email, &code).await;
            TransactionStatus::Pending
        } else {
            self.settle(&pending).await?.status
        };

        Ok(TransferReceipt {
            transaction_id: pending.id,
            from_account: account.account_name,
            recipient_name: recipient.recipient_name,
            amount: pending.amount,
            currency: pending.currency,
            date: pending.created_at,
            status,
            otp_required,
        })
    }

    /// Check the code and settle. A wrong or expired code leaves the transfer
    /// pending.
    pub async fn confirm(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        code: &str,
    ) -> LedgerResult<Transaction> {
        let pending = self.owned_pending(user_id, transaction_id).await?;

        match self.otp.verify(user_id, transaction_id, code).await? {
            VerifyOutcome::Ok => self.settle(&pending).await,
            VerifyOutcome::Expired => Err(LedgerError::OtpExpired),
            VerifyOutcome::Mismatch => Err(LedgerError::OtpMismatch),
        }
    }

    /// Issue a fresh code once the previous one is no longer live.
    pub async fn resend_code(&self, user_id: Uuid, transaction_id: Uuid) -> LedgerResult<()> {
        let pending = self.owned_pending(user_id, transaction_id).await?;
        if !self
            .policy
            .requires_otp(pending.account_id, pending.transaction_type)
        {
            return Err(LedgerError::InvalidParties(
                "transaction does not require a verification code".to_string(),
            ));
        }

        let profile = self.profiles.get_profile(user_id).await?;
        let code = self.otp.issue(user_id, transaction_id).await?;
        self.deliver_code(&profile.email, &code).await;
        Ok(())
    }

    /// `pending -> failed`, abandoning any live code.
    pub async fn fail_transfer(
        &self,
        transaction_id: Uuid,
        reason: &str,
    ) -> LedgerResult<Transaction> {
        let failed = self
            .journal
            .advance(transaction_id, TransactionStatus::Failed)
            .await?;
        self.otp.abandon(transaction_id).await?;
        tracing::info!(transaction_id = %transaction_id, reason, "transfer failed");

        self.notifications
            .notify_user(
                failed.user_id,
                NotificationType::Error,
                "Transfer Failed",
                &format!(
                    "Your transfer of {} {} was not completed: {}",
                    failed.amount, failed.currency, reason
                ),
            )
            .await;
        Ok(failed)
    }

    /// Fail every pending transfer older than `ttl`. Returns how many moved.
    pub async fn expire_stale(&self, ttl: Duration) -> LedgerResult<usize> {
        let cutoff = Utc::now() - ttl;
        let stale = self.journal.pending_before(cutoff).await?;

        let mut failed = 0;
        for tx in stale {
            match self
                .fail_transfer(tx.id, "verification window elapsed")
                .await
            {
                Ok(_) => failed += 1,
                Err(e) => {
                    tracing::warn!(transaction_id = %tx.id, error = %e, "could not expire transfer")
                }
            }
        }
        Ok(failed)
    }

    pub async fn list_recipients(&self, user_id: Uuid) -> LedgerResult<Vec<TransferRecipient>> {
        Ok(self.recipients.list_recipients(user_id).await?)
    }

    async fn settle(&self, pending: &Transaction) -> LedgerResult<Transaction> {
        match self.ledger.settle_pending(pending).await {
            Ok(posting) => {
                self.notifications
                    .notify_user(
                        pending.user_id,
                        NotificationType::Success,
                        "Transfer Completed",
                        &format!(
                            "Your transfer of {} {} has been completed.",
                            pending.amount, pending.currency
                        ),
                    )
                    .await;
                Ok(posting.transaction)
            }
            Err(e @ LedgerError::InsufficientFunds(_))
            | Err(e @ LedgerError::AccountNotActive(_)) => {
                if let Err(fail_err) = self.fail_transfer(pending.id, &e.to_string()).await {
                    tracing::warn!(
                        transaction_id = %pending.id,
                        error = %fail_err,
                        "could not fail rejected transfer"
                    );
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn blocked(&self, user_id: Uuid, account_id: Uuid) -> LedgerError {
        tracing::warn!(user_id = %user_id, account_id = %account_id, "transfer blocked");
        self.notifications
            .notify_user(
                user_id,
                NotificationType::Error,
                "Transfer Blocked",
                "Your account is restricted from making transactions. Please contact support.",
            )
            .await;
        LedgerError::Blocked("transactions are disabled for this account".to_string())
    }

    async fn owned_account(&self, user_id: Uuid, account_id: Uuid) -> LedgerResult<Account> {
        let account = match self.ledger.get_account(account_id).await {
            Ok(account) => account,
            Err(LedgerError::NotFound(_)) => {
                return Err(LedgerError::InvalidParties(format!(
                    "account {} not found",
                    account_id
                )))
            }
            Err(e) => return Err(e),
        };
        if account.user_id != user_id {
            return Err(LedgerError::InvalidParties(format!(
                "account {} is not owned by the caller",
                account_id
            )));
        }
        Ok(account)
    }

    async fn owned_pending(&self, user_id: Uuid, transaction_id: Uuid) -> LedgerResult<Transaction> {
        let tx = self.journal.get(transaction_id).await?;
        if tx.user_id != user_id {
            return Err(LedgerError::NotFound(format!("transaction {}", transaction_id)));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                from: tx.status,
                to: TransactionStatus::Completed,
            });
        }
        Ok(tx)
    }

    async fn resolve_recipient(
        &self,
        user_id: Uuid,
        recipient: RecipientRef,
    ) -> LedgerResult<TransferRecipient> {
        match recipient {
            RecipientRef::Saved(id) => {
                let saved = match self.recipients.get_recipient(id).await {
                    Ok(saved) => saved,
                    Err(RepositoryError::NotFound(_)) => {
                        return Err(LedgerError::InvalidParties(format!(
                            "recipient {} not found",
                            id
                        )))
                    }
                    Err(e) => return Err(e.into()),
                };
                if saved.user_id != user_id {
                    return Err(LedgerError::InvalidParties(format!(
                        "recipient {} is not owned by the caller",
                        id
                    )));
                }
                Ok(saved)
            }
            RecipientRef::New(new) => {
                let new = NewRecipient {
                    recipient_name: sanitize_string(&new.recipient_name),
                    bank_name: new
                        .bank_name
                        .as_deref()
                        .map(sanitize_string)
                        .filter(|b| !b.is_empty()),
                    account_identifier: sanitize_string(&new.account_identifier),
                };
                validate_required("recipient_name", &new.recipient_name)?;
                validate_max_len("recipient_name", &new.recipient_name, RECIPIENT_NAME_MAX_LEN)?;
                validate_required("account_identifier", &new.account_identifier)?;
                validate_max_len(
                    "account_identifier",
                    &new.account_identifier,
                    ACCOUNT_IDENTIFIER_MAX_LEN,
                )?;

                if let Some(existing) = self
                    .recipients
                    .find_recipient(user_id, &new.account_identifier)
                    .await?
                {
                    return Ok(existing);
                }
                Ok(self
                    .recipients
                    .insert_recipient(&TransferRecipient::from_new(user_id, &new))
                    .await?)
            }
        }
    }

    async fn deliver_code(&self, email: &str, code: &str) {
        if let Err(e) = self.code_sender.send_code(email, code).await {
            tracing::warn!(error = %e, "verification code delivery failed");
        }
    }
}
