//! Admin Adjustment Path: privileged ledger mutations that bypass OTP.
//!
//! Every action appends an `AdminAction`. Manual postings write the journal
//! entry, the balance change and the audit entry as one unit.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Account, AccountStatus, AdminAction, AdminActionType, NotificationType, Profile, Transaction,
    TransactionStatus, TransactionType,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{AuditRepository, Posting, ProfileRepository};
use crate::services::{LedgerStore, NotificationDispatcher, TransactionJournal};
use crate::use_cases::transfer::TransferOrchestrator;
use crate::validation::{clean_notes, validate_amount, validate_required};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub account_id: Uuid,
    pub amount: BigDecimal,
    /// Stored as the entry's timestamp; may lie in the past.
    pub effective_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct AdminAdjustmentPath {
    ledger: LedgerStore,
    journal: TransactionJournal,
    transfers: TransferOrchestrator,
    notifications: NotificationDispatcher,
    audit: Arc<dyn AuditRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl AdminAdjustmentPath {
    pub fn new(
        ledger: LedgerStore,
        journal: TransactionJournal,
        transfers: TransferOrchestrator,
        notifications: NotificationDispatcher,
        audit: Arc<dyn AuditRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            ledger,
            journal,
            transfers,
            notifications,
            audit,
            profiles,
        }
    }

    pub async fn manual_deposit(
        &self,
        admin_id: Uuid,
        adjustment: ManualAdjustment,
    ) -> LedgerResult<Posting> {
        let posting = self
            .post_manual(
                admin_id,
                adjustment,
                TransactionType::Deposit,
                AdminActionType::ManualDeposit,
            )
            .await?;
        self.notifications
            .notify_from_admin(
                admin_id,
                posting.account.user_id,
                NotificationType::Success,
                "Deposit Received",
                &format!(
                    "{} {} has been deposited to your {}.",
                    posting.transaction.amount,
                    posting.transaction.currency,
                    posting.account.account_name
                ),
            )
            .await;
        Ok(posting)
    }

    pub async fn manual_withdrawal(
        &self,
        admin_id: Uuid,
        adjustment: ManualAdjustment,
    ) -> LedgerResult<Posting> {
        let posting = self
            .post_manual(
                admin_id,
                adjustment,
                TransactionType::Withdrawal,
                AdminActionType::ManualWithdrawal,
            )
            .await?;
        self.notifications
            .notify_from_admin(
                admin_id,
                posting.account.user_id,
                NotificationType::Info,
                "Withdrawal Processed",
                &format!(
                    "{} {} has been withdrawn from your {}.",
                    posting.transaction.amount,
                    posting.transaction.currency,
                    posting.account.account_name
                ),
            )
            .await;
        Ok(posting)
    }

    async fn post_manual(
        &self,
        admin_id: Uuid,
        adjustment: ManualAdjustment,
        kind: TransactionType,
        action_type: AdminActionType,
    ) -> LedgerResult<Posting> {
        let account = self.ledger.get_account(adjustment.account_id).await?;
        validate_amount(&adjustment.amount, &account.currency)?;
        let notes = clean_notes(adjustment.notes.as_deref())?;

        let default_description = match kind {
            TransactionType::Deposit => "Manual deposit",
            _ => "Manual withdrawal",
        };
        let mut tx = Transaction::new(
            account.id,
            account.user_id,
            kind,
            adjustment.amount,
            &account.currency,
            TransactionStatus::Completed,
        )
        .with_description(notes.clone().unwrap_or_else(|| default_description.to_string()));
        if let Some(at) = adjustment.effective_date {
            tx = tx.effective_at(at);
        }

        let audit = AdminAction::new(
            admin_id,
            action_type,
            account.user_id,
            json!({
                "account_id": account.id,
                "transaction_id": tx.id,
                "amount": tx.amount.to_string(),
                "currency": tx.currency,
                "effective_date": tx.created_at,
                "notes": notes,
            }),
        );

        let posting = self.ledger.post_completed(&tx, Some(&audit)).await?;
        tracing::info!(
            admin_id = %admin_id,
            account_id = %account.id,
            transaction_id = %tx.id,
            action = action_type.as_str(),
            "manual posting applied"
        );
        Ok(posting)
    }

    pub async fn set_transaction_permission(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        allowed: bool,
        reason: Option<String>,
    ) -> LedgerResult<Profile> {
        let reason = clean_notes(reason.as_deref())?;
        let profile = self
            .profiles
            .set_transaction_permission(user_id, allowed)
            .await?;

        self.record(AdminAction::new(
            admin_id,
            AdminActionType::SetTransactionPermission,
            user_id,
            json!({ "allowed": allowed, "reason": reason }),
        ))
        .await?;

        let (kind, title, message) = if allowed {
            (
                NotificationType::Info,
                "Transactions Enabled",
                "You can make transactions again.".to_string(),
            )
        } else {
            (
                NotificationType::Warning,
                "Transactions Disabled",
                match &reason {
                    Some(reason) => format!("Transactions have been disabled: {}", reason),
                    None => "Transactions have been disabled. Please contact support.".to_string(),
                },
            )
        };
        self.notifications
            .notify_from_admin(admin_id, user_id, kind, title, &message)
            .await;
        Ok(profile)
    }

    /// The only place `restricted -> active` is allowed.
    pub async fn set_account_status(
        &self,
        admin_id: Uuid,
        account_id: Uuid,
        status: AccountStatus,
    ) -> LedgerResult<Account> {
        let before = self.ledger.get_account(account_id).await?;
        let account = self.ledger.set_status(account_id, status, true).await?;

        self.record(AdminAction::new(
            admin_id,
            AdminActionType::SetAccountStatus,
            account.user_id,
            json!({
                "account_id": account_id,
                "from": before.status.as_str(),
                "to": status.as_str(),
            }),
        ))
        .await?;

        self.notifications
            .notify_from_admin(
                admin_id,
                account.user_id,
                NotificationType::Info,
                "Account Status Updated",
                &format!("Your {} is now {}.", account.account_name, status),
            )
            .await;
        Ok(account)
    }

    /// Administrative failure of a pending transfer.
    pub async fn resolve_pending(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        reason: &str,
    ) -> LedgerResult<Transaction> {
        validate_required("reason", reason)?;
        let failed = self.transfers.fail_transfer(transaction_id, reason).await?;

        self.record(AdminAction::new(
            admin_id,
            AdminActionType::ResolvePending,
            failed.user_id,
            json!({ "transaction_id": transaction_id, "reason": reason }),
        ))
        .await?;
        Ok(failed)
    }

    pub async fn mark_disputed(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        note: &str,
    ) -> LedgerResult<Transaction> {
        let note = clean_notes(Some(note))?
            .ok_or_else(|| LedgerError::InvalidParties("note: must not be empty".to_string()))?;
        let disputed = self.journal.mark_disputed(transaction_id, &note).await?;

        self.record(AdminAction::new(
            admin_id,
            AdminActionType::MarkDisputed,
            disputed.user_id,
            json!({ "transaction_id": transaction_id, "note": note }),
        ))
        .await?;

        self.notifications
            .notify_from_admin(
                admin_id,
                disputed.user_id,
                NotificationType::Warning,
                "Transaction Disputed",
                &format!(
                    "Your {} of {} {} is under review.",
                    disputed.transaction_type, disputed.amount, disputed.currency
                ),
            )
            .await;
        Ok(disputed)
    }

    pub async fn audit_trail(&self, user_id: Uuid) -> LedgerResult<Vec<AdminAction>> {
        Ok(self.audit.list_actions_for_user(user_id).await?)
    }

    async fn record(&self, action: AdminAction) -> LedgerResult<AdminAction> {
        let recorded = self.audit.record_action(&action).await?;
        tracing::info!(
            admin_id = %recorded.admin_id,
            target_user_id = %recorded.target_user_id,
            action = recorded.action_type.as_str(),
            "admin action recorded"
        );
        Ok(recorded)
    }
}
