//! Account request approval.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::account::DEFAULT_CURRENCY;
use crate::domain::{Account, AccountRequest, NotificationType};
use crate::error::LedgerResult;
use crate::ports::AccountRequestRepository;
use crate::services::{LedgerStore, NotificationDispatcher};
use crate::validation::{
    sanitize_string, validate_max_len, validate_required, ACCOUNT_TYPE_MAX_LEN,
};

pub const DEFAULT_AUTO_APPROVE_AFTER_MINUTES: i64 = 30;

#[derive(Clone)]
pub struct AccountApproval {
    ledger: LedgerStore,
    requests: Arc<dyn AccountRequestRepository>,
    notifications: NotificationDispatcher,
}

impl AccountApproval {
    pub fn new(
        ledger: LedgerStore,
        requests: Arc<dyn AccountRequestRepository>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            ledger,
            requests,
            notifications,
        }
    }

    pub async fn request_account(
        &self,
        user_id: Uuid,
        account_type: &str,
    ) -> LedgerResult<AccountRequest> {
        let account_type = sanitize_string(account_type);
        validate_required("account_type", &account_type)?;
        validate_max_len("account_type", &account_type, ACCOUNT_TYPE_MAX_LEN)?;

        Ok(self
            .requests
            .insert_request(&AccountRequest::new(user_id, &account_type))
            .await?)
    }

    /// Approve every pending request older than `min_age`. One failing
    /// request does not stop the batch.
    pub async fn approve_pending_requests(&self, min_age: Duration) -> LedgerResult<Vec<Account>> {
        let cutoff = Utc::now() - min_age;
        let pending = self.requests.list_pending_requests_before(cutoff).await?;

        let mut approved = Vec::with_capacity(pending.len());
        for request in pending {
            match self.approve(&request).await {
                Ok(Some(account)) => approved.push(account),
                Ok(None) => tracing::debug!(
                    request_id = %request.id,
                    "account request already claimed"
                ),
                Err(e) => tracing::warn!(
                    request_id = %request.id,
                    user_id = %request.user_id,
                    error = %e,
                    "account request approval failed"
                ),
            }
        }
        Ok(approved)
    }

    async fn approve(&self, request: &AccountRequest) -> LedgerResult<Option<Account>> {
        // Claim first so overlapping passes open at most one account.
        if self.requests.claim_request(request.id).await?.is_none() {
            return Ok(None);
        }

        // Reuse an account of the same type if the user already has one.
        let account = match self
            .ledger
            .find_account_by_type(request.user_id, &request.account_type)
            .await?
        {
            Some(existing) => existing,
            None => {
                self.ledger
                    .open_account(request.user_id, &request.account_type, DEFAULT_CURRENCY)
                    .await?
            }
        };
        tracing::info!(
            request_id = %request.id,
            account_id = %account.id,
            "account request approved"
        );
        self.notifications
            .notify_admins(
                NotificationType::Info,
                "Account Auto-Approved",
                &format!(
                    "Auto-approved {} account for user {}",
                    request.account_type, request.user_id
                ),
            )
            .await;
        Ok(Some(account))
    }
}
