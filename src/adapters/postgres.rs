//! Postgres implementation of every port.
//!
//! Balance changes are single conditional `UPDATE ... RETURNING` statements.
//! Postings that touch the journal and the ledger together run inside one
//! database transaction.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{
    Account, AccountRequest, AccountStatus, AdminAction, Notification, NotificationTarget,
    OtpChallenge, ParseEnumError, Profile, Transaction, TransactionFilter, TransactionStatus,
    TransferRecipient,
};
use crate::ports::{
    AccountRepository, AccountRequestRepository, AuditRepository, JournalRepository,
    NotificationRepository, OtpRepository, Posting, PostingRepository, ProfileRepository,
    RecipientRepository, RepositoryError, RepositoryResult,
};
use crate::utils::cursor::Cursor;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse<T>(value: &str) -> RepositoryResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: ParseEnumError| RepositoryError::Database(e.to_string()))
}

/// Conditional balance update on an open connection. When no row qualifies,
/// a follow-up read says why.
async fn adjust_on(
    conn: &mut PgConnection,
    id: Uuid,
    delta: &BigDecimal,
) -> RepositoryResult<Account> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        UPDATE accounts
        SET balance = balance + $2,
            available_balance = available_balance + $2,
            version = version + 1,
            updated_at = NOW()
        WHERE id = $1 AND status = 'active' AND available_balance + $2 >= 0
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row.into_domain(),
        None => Err(classify_rejected(conn, id).await),
    }
}

async fn classify_rejected(conn: &mut PgConnection, id: Uuid) -> RepositoryError {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;

    match status {
        Ok(None) => RepositoryError::NotFound(format!("account {}", id)),
        Ok(Some(status)) if status != AccountStatus::Active.as_str() => {
            RepositoryError::AccountNotActive(id)
        }
        Ok(Some(_)) => RepositoryError::InsufficientFunds(id),
        Err(e) => RepositoryError::from(e),
    }
}

async fn insert_transaction_on(
    conn: &mut PgConnection,
    tx: &Transaction,
) -> RepositoryResult<Transaction> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transactions (
            id, account_id, user_id, transaction_type, direction, amount, currency,
            status, description, category, merchant, recipient_id, dispute_note,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.account_id)
    .bind(tx.user_id)
    .bind(tx.transaction_type.as_str())
    .bind(tx.direction.as_str())
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(tx.status.as_str())
    .bind(&tx.description)
    .bind(&tx.category)
    .bind(&tx.merchant)
    .bind(tx.recipient_id)
    .bind(&tx.dispute_note)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(&mut *conn)
    .await?;

    row.into_domain()
}

async fn record_action_on(
    conn: &mut PgConnection,
    action: &AdminAction,
) -> RepositoryResult<AdminAction> {
    let row = sqlx::query_as::<_, AdminActionRow>(
        r#"
        INSERT INTO admin_actions (id, admin_id, action_type, target_user_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(action.id)
    .bind(action.admin_id)
    .bind(action.action_type.as_str())
    .bind(action.target_user_id)
    .bind(&action.details)
    .bind(action.created_at)
    .fetch_one(&mut *conn)
    .await?;

    row.into_domain()
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn get_account(&self, id: Uuid) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("account {}", id)))?
            .into_domain()
    }

    async fn list_accounts_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AccountRow::into_domain).collect()
    }

    async fn find_account_by_type(
        &self,
        user_id: Uuid,
        account_type: &str,
    ) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE user_id = $1 AND account_type = $2 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(user_id)
        .bind(account_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRow::into_domain).transpose()
    }

    async fn insert_account(&self, account: &Account) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (
                id, user_id, account_type, account_name, account_number, status,
                balance, available_balance, currency, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.account_type)
        .bind(&account.account_name)
        .bind(&account.account_number)
        .bind(account.status.as_str())
        .bind(&account.balance)
        .bind(&account.available_balance)
        .bind(&account.currency)
        .bind(account.version)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn adjust_balance(&self, id: Uuid, delta: &BigDecimal) -> RepositoryResult<Account> {
        let mut conn = self.pool.acquire().await?;
        adjust_on(&mut conn, id, delta).await
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts SET status = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("account {}", id)))?
            .into_domain()
    }
}

#[async_trait]
impl JournalRepository for PgStore {
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction_on(&mut conn, tx).await
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let current = self.get_transaction(id).await?;
                Err(RepositoryError::InvalidTransition {
                    from: current.status,
                    to,
                })
            }
        }
    }

    async fn mark_disputed(&self, id: Uuid, note: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions SET status = 'disputed', dispute_note = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(note)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let current = self.get_transaction(id).await?;
                Err(RepositoryError::InvalidTransition {
                    from: current.status,
                    to: TransactionStatus::Disputed,
                })
            }
        }
    }

    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE account_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6))
            ORDER BY created_at DESC, id DESC
            LIMIT $7
            "#,
        )
        .bind(account_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(cursor.map(|c| c.created_at))
        .bind(cursor.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_settled(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE account_id = $1 AND status IN ('completed', 'disputed')
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

#[async_trait]
impl PostingRepository for PgStore {
    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        delta: &BigDecimal,
    ) -> RepositoryResult<Posting> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", transaction_id)))?;
        let pending = row.into_domain()?;

        if pending.status != TransactionStatus::Pending {
            return Err(RepositoryError::InvalidTransition {
                from: pending.status,
                to: TransactionStatus::Completed,
            });
        }

        let account = adjust_on(&mut db_tx, pending.account_id, delta).await?;

        let transaction = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions SET status = 'completed', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .fetch_one(&mut *db_tx)
        .await?
        .into_domain()?;

        db_tx.commit().await?;

        Ok(Posting {
            transaction,
            account,
        })
    }

    async fn post_completed(
        &self,
        tx: &Transaction,
        delta: &BigDecimal,
        audit: Option<&AdminAction>,
    ) -> RepositoryResult<Posting> {
        let mut db_tx = self.pool.begin().await?;

        let account = adjust_on(&mut db_tx, tx.account_id, delta).await?;
        let transaction = insert_transaction_on(&mut db_tx, tx).await?;
        if let Some(action) = audit {
            record_action_on(&mut db_tx, action).await?;
        }

        db_tx.commit().await?;

        Ok(Posting {
            transaction,
            account,
        })
    }
}

#[async_trait]
impl RecipientRepository for PgStore {
    async fn get_recipient(&self, id: Uuid) -> RepositoryResult<TransferRecipient> {
        sqlx::query_as::<_, RecipientRow>("SELECT * FROM transfer_recipients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(RecipientRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("recipient {}", id)))
    }

    async fn find_recipient(
        &self,
        user_id: Uuid,
        account_identifier: &str,
    ) -> RepositoryResult<Option<TransferRecipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(
            "SELECT * FROM transfer_recipients WHERE user_id = $1 AND account_identifier = $2",
        )
        .bind(user_id)
        .bind(account_identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RecipientRow::into_domain))
    }

    async fn insert_recipient(
        &self,
        recipient: &TransferRecipient,
    ) -> RepositoryResult<TransferRecipient> {
        let inserted = sqlx::query_as::<_, RecipientRow>(
            r#"
            INSERT INTO transfer_recipients (
                id, user_id, recipient_name, bank_name, account_identifier, last_used_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, account_identifier) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(recipient.id)
        .bind(recipient.user_id)
        .bind(&recipient.recipient_name)
        .bind(&recipient.bank_name)
        .bind(&recipient.account_identifier)
        .bind(recipient.last_used_at)
        .bind(recipient.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(row.into_domain()),
            None => self
                .find_recipient(recipient.user_id, &recipient.account_identifier)
                .await?
                .ok_or_else(|| RepositoryError::Conflict("recipient vanished".to_string())),
        }
    }

    async fn touch_recipient(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<TransferRecipient> {
        // GREATEST ignores NULL, so a first touch just sets the value.
        sqlx::query_as::<_, RecipientRow>(
            r#"
            UPDATE transfer_recipients SET last_used_at = GREATEST(last_used_at, $2)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .map(RecipientRow::into_domain)
        .ok_or_else(|| RepositoryError::NotFound(format!("recipient {}", id)))
    }

    async fn list_recipients(&self, user_id: Uuid) -> RepositoryResult<Vec<TransferRecipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT * FROM transfer_recipients
            WHERE user_id = $1
            ORDER BY last_used_at DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecipientRow::into_domain).collect())
    }
}

#[async_trait]
impl OtpRepository for PgStore {
    async fn insert_challenge(
        &self,
        challenge: &OtpChallenge,
        now: DateTime<Utc>,
    ) -> RepositoryResult<OtpChallenge> {
        let mut db_tx = self.pool.begin().await?;

        // Serialises issuance per transaction.
        sqlx::query("SELECT id FROM transactions WHERE id = $1 FOR UPDATE")
            .bind(challenge.transaction_id)
            .fetch_optional(&mut *db_tx)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("transaction {}", challenge.transaction_id))
            })?;

        let live = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM otp_challenges
                WHERE transaction_id = $1
                  AND consumed_at IS NULL
                  AND abandoned_at IS NULL
                  AND expires_at > $2
            )
            "#,
        )
        .bind(challenge.transaction_id)
        .bind(now)
        .fetch_one(&mut *db_tx)
        .await?;

        if live {
            return Err(RepositoryError::DuplicatePending(challenge.transaction_id));
        }

        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            INSERT INTO otp_challenges (
                id, user_id, transaction_id, code_hash, expires_at, consumed_at, abandoned_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(challenge.id)
        .bind(challenge.user_id)
        .bind(challenge.transaction_id)
        .bind(&challenge.code_hash)
        .bind(challenge.expires_at)
        .bind(challenge.consumed_at)
        .bind(challenge.abandoned_at)
        .bind(challenge.created_at)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        Ok(row.into_domain())
    }

    async fn latest_challenge(
        &self,
        transaction_id: Uuid,
    ) -> RepositoryResult<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            SELECT * FROM otp_challenges
            WHERE transaction_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChallengeRow::into_domain))
    }

    async fn consume_challenge(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE otp_challenges SET consumed_at = $2
            WHERE id = $1 AND consumed_at IS NULL AND abandoned_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM otp_challenges WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound(format!("challenge {}", id)))
        }
    }

    async fn abandon_challenges(
        &self,
        transaction_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE otp_challenges SET abandoned_at = $2
            WHERE transaction_id = $1 AND consumed_at IS NULL AND abandoned_at IS NULL
            "#,
        )
        .bind(transaction_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, n: &Notification) -> RepositoryResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (
                id, audience, user_id, kind, title, message, is_read, issued_by, created_at, sent_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(n.id)
        .bind(n.target.audience())
        .bind(n.target.user_id())
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.is_read)
        .bind(n.issued_by)
        .bind(n.created_at)
        .bind(n.sent_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_notification(&self, id: Uuid) -> RepositoryResult<Notification> {
        sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("notification {}", id)))?
            .into_domain()
    }

    async fn list_notifications(
        &self,
        target: NotificationTarget,
        limit: i64,
    ) -> RepositoryResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE audience = $1 AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(target.audience())
        .bind(target.user_id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(NotificationRow::into_domain).collect()
    }

    async fn mark_read(&self, id: Uuid) -> RepositoryResult<Notification> {
        sqlx::query_as::<_, NotificationRow>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("notification {}", id)))?
        .into_domain()
    }

    async fn mark_all_read(&self, target: NotificationTarget) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE audience = $1 AND ($2::uuid IS NULL OR user_id = $2) AND is_read = FALSE
            "#,
        )
        .bind(target.audience())
        .bind(target.user_id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, target: NotificationTarget) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE audience = $1 AND ($2::uuid IS NULL OR user_id = $2) AND is_read = FALSE
            "#,
        )
        .bind(target.audience())
        .bind(target.user_id())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn record_action(&self, action: &AdminAction) -> RepositoryResult<AdminAction> {
        let mut conn = self.pool.acquire().await?;
        record_action_on(&mut conn, action).await
    }

    async fn list_actions_for_user(
        &self,
        target_user_id: Uuid,
    ) -> RepositoryResult<Vec<AdminAction>> {
        let rows = sqlx::query_as::<_, AdminActionRow>(
            "SELECT * FROM admin_actions WHERE target_user_id = $1 ORDER BY created_at ASC",
        )
        .bind(target_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AdminActionRow::into_domain).collect()
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Profile> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ProfileRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("profile {}", user_id)))
    }

    async fn upsert_profile(&self, profile: &Profile) -> RepositoryResult<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (user_id, email, full_name, can_transact)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                can_transact = EXCLUDED.can_transact
            RETURNING *
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(profile.can_transact)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    async fn set_transaction_permission(
        &self,
        user_id: Uuid,
        allowed: bool,
    ) -> RepositoryResult<Profile> {
        sqlx::query_as::<_, ProfileRow>(
            "UPDATE profiles SET can_transact = $2 WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(allowed)
        .fetch_optional(&self.pool)
        .await?
        .map(ProfileRow::into_domain)
        .ok_or_else(|| RepositoryError::NotFound(format!("profile {}", user_id)))
    }
}

#[async_trait]
impl AccountRequestRepository for PgStore {
    async fn insert_request(&self, request: &AccountRequest) -> RepositoryResult<AccountRequest> {
        let row = sqlx::query_as::<_, AccountRequestRow>(
            r#"
            INSERT INTO account_requests (id, user_id, account_type, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(&request.account_type)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn list_pending_requests_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AccountRequest>> {
        let rows = sqlx::query_as::<_, AccountRequestRow>(
            r#"
            SELECT * FROM account_requests
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AccountRequestRow::into_domain).collect()
    }

    async fn claim_request(&self, id: Uuid) -> RepositoryResult<Option<AccountRequest>> {
        let row = sqlx::query_as::<_, AccountRequestRow>(
            r#"
            UPDATE account_requests SET status = 'approved'
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRequestRow::into_domain).transpose()
    }
}

// Internal row types for SQLx. Enums are stored as TEXT.

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    user_id: Uuid,
    account_type: String,
    account_name: String,
    account_number: String,
    status: String,
    balance: BigDecimal,
    available_balance: BigDecimal,
    currency: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> RepositoryResult<Account> {
        Ok(Account {
            id: self.id,
            user_id: self.user_id,
            account_type: self.account_type,
            account_name: self.account_name,
            account_number: self.account_number,
            status: parse(&self.status)?,
            balance: self.balance,
            available_balance: self.available_balance,
            currency: self.currency,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    user_id: Uuid,
    transaction_type: String,
    direction: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    description: Option<String>,
    category: Option<String>,
    merchant: Option<String>,
    recipient_id: Option<Uuid>,
    dispute_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            account_id: self.account_id,
            user_id: self.user_id,
            transaction_type: parse(&self.transaction_type)?,
            direction: parse(&self.direction)?,
            amount: self.amount,
            currency: self.currency,
            status: parse(&self.status)?,
            description: self.description,
            category: self.category,
            merchant: self.merchant,
            recipient_id: self.recipient_id,
            dispute_note: self.dispute_note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    user_id: Uuid,
    recipient_name: String,
    bank_name: Option<String>,
    account_identifier: String,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RecipientRow {
    fn into_domain(self) -> TransferRecipient {
        TransferRecipient {
            id: self.id,
            user_id: self.user_id,
            recipient_name: self.recipient_name,
            bank_name: self.bank_name,
            account_identifier: self.account_identifier,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChallengeRow {
    id: Uuid,
    user_id: Uuid,
    transaction_id: Uuid,
    code_hash: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    abandoned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ChallengeRow {
    fn into_domain(self) -> OtpChallenge {
        OtpChallenge {
            id: self.id,
            user_id: self.user_id,
            transaction_id: self.transaction_id,
            code_hash: self.code_hash,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            abandoned_at: self.abandoned_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    audience: String,
    user_id: Option<Uuid>,
    kind: String,
    title: String,
    message: String,
    is_read: bool,
    issued_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl NotificationRow {
    fn into_domain(self) -> RepositoryResult<Notification> {
        let target = match (self.audience.as_str(), self.user_id) {
            ("admin", _) => NotificationTarget::Admin,
            ("user", Some(user_id)) => NotificationTarget::User(user_id),
            (audience, _) => {
                return Err(RepositoryError::Database(format!(
                    "notification {} has invalid audience '{}'",
                    self.id, audience
                )))
            }
        };

        Ok(Notification {
            id: self.id,
            target,
            kind: parse(&self.kind)?,
            title: self.title,
            message: self.message,
            is_read: self.is_read,
            issued_by: self.issued_by,
            created_at: self.created_at,
            sent_at: self.sent_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminActionRow {
    id: Uuid,
    admin_id: Uuid,
    action_type: String,
    target_user_id: Uuid,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AdminActionRow {
    fn into_domain(self) -> RepositoryResult<AdminAction> {
        Ok(AdminAction {
            id: self.id,
            admin_id: self.admin_id,
            action_type: parse(&self.action_type)?,
            target_user_id: self.target_user_id,
            details: self.details,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    email: String,
    full_name: Option<String>,
    can_transact: bool,
}

impl ProfileRow {
    fn into_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            can_transact: self.can_transact,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRequestRow {
    id: Uuid,
    user_id: Uuid,
    account_type: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl AccountRequestRow {
    fn into_domain(self) -> RepositoryResult<AccountRequest> {
        Ok(AccountRequest {
            id: self.id,
            user_id: self.user_id,
            account_type: self.account_type,
            status: parse(&self.status)?,
            created_at: self.created_at,
        })
    }
}
