//! Transaction Journal: the append-only record of balance-affecting events
//! and the read models built from it.

use async_stream::try_stream;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Direction, Transaction, TransactionFilter, TransactionStatus};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::JournalRepository;
use crate::services::events::EventBus;
use crate::utils::cursor::Cursor;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Transaction>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub income: BigDecimal,
    pub expenses: BigDecimal,
    pub net: BigDecimal,
    pub settled_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
}

/// Sum of the signed effects of settled entries.
pub fn replay(entries: &[Transaction]) -> BigDecimal {
    entries
        .iter()
        .filter(|t| t.status.is_settled())
        .fold(BigDecimal::from(0), |acc, t| acc + t.signed_amount())
}

#[derive(Clone)]
pub struct TransactionJournal {
    repo: Arc<dyn JournalRepository>,
    events: EventBus,
}

impl TransactionJournal {
    pub fn new(repo: Arc<dyn JournalRepository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Insert at the entry's requested status.
    pub async fn record(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        let recorded = self.repo.insert_transaction(tx).await?;
        tracing::info!(
            transaction_id = %recorded.id,
            account_id = %recorded.account_id,
            transaction_type = recorded.transaction_type.as_str(),
            status = recorded.status.as_str(),
            "transaction recorded"
        );
        self.events.publish(&recorded);
        Ok(recorded)
    }

    pub async fn get(&self, id: Uuid) -> LedgerResult<Transaction> {
        Ok(self.repo.get_transaction(id).await?)
    }

    /// `pending -> completed` and `pending -> failed` only.
    ///
    /// Completing a transfer through here does not move money; confirmation
    /// goes through `LedgerStore::settle_pending` instead.
    pub async fn advance(&self, id: Uuid, to: TransactionStatus) -> LedgerResult<Transaction> {
        let current = self.repo.get_transaction(id).await?;
        if !current.status.can_advance_to(to) {
            return Err(LedgerError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let advanced = self.repo.update_status(id, current.status, to).await?;
        tracing::info!(
            transaction_id = %id,
            from = current.status.as_str(),
            to = to.as_str(),
            "transaction advanced"
        );
        self.events.publish(&advanced);
        Ok(advanced)
    }

    /// Completed -> disputed. The entry keeps counting toward the balance.
    pub async fn mark_disputed(&self, id: Uuid, note: &str) -> LedgerResult<Transaction> {
        let disputed = self.repo.mark_disputed(id, note).await?;
        tracing::info!(transaction_id = %id, "transaction disputed");
        self.events.publish(&disputed);
        Ok(disputed)
    }

    pub async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> LedgerResult<Page> {
        let cursor = cursor
            .map(Cursor::decode)
            .transpose()
            .map_err(LedgerError::InvalidCursor)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let items = self
            .repo
            .list_page(account_id, filter, cursor.as_ref(), limit)
            .await?;
        let next_cursor = if items.len() as i64 == limit {
            items
                .last()
                .map(|t| Cursor::new(t.created_at, t.id).encode())
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    /// Newest-first lazy sequence over the account's entries. Restarting the
    /// stream repeats the same window when nothing new was written.
    pub fn list_for_account(
        &self,
        account_id: Uuid,
        filter: TransactionFilter,
    ) -> impl Stream<Item = Result<Transaction, LedgerError>> + Send + 'static {
        let repo = self.repo.clone();
        try_stream! {
            let mut cursor: Option<Cursor> = None;
            loop {
                let page = repo
                    .list_page(account_id, &filter, cursor.as_ref(), MAX_PAGE_SIZE)
                    .await
                    .map_err(LedgerError::from)?;
                let exhausted = (page.len() as i64) < MAX_PAGE_SIZE;
                cursor = page.last().map(|t| Cursor::new(t.created_at, t.id));
                for tx in page {
                    yield tx;
                }
                if exhausted || cursor.is_none() {
                    break;
                }
            }
        }
    }

    async fn collect(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut entries = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = self
                .repo
                .list_page(account_id, filter, cursor.as_ref(), MAX_PAGE_SIZE)
                .await?;
            let exhausted = (page.len() as i64) < MAX_PAGE_SIZE;
            cursor = page.last().map(|t| Cursor::new(t.created_at, t.id));
            entries.extend(page);
            if exhausted || cursor.is_none() {
                return Ok(entries);
            }
        }
    }

    pub async fn replay_balance(&self, account_id: Uuid) -> LedgerResult<BigDecimal> {
        let settled = self.repo.list_settled(account_id).await?;
        Ok(replay(&settled))
    }

    /// Running balance, one closing point per calendar day with activity.
    pub async fn balance_history(&self, account_id: Uuid) -> LedgerResult<Vec<BalancePoint>> {
        let settled = self.repo.list_settled(account_id).await?;

        let mut points: Vec<BalancePoint> = Vec::new();
        let mut running = BigDecimal::from(0);
        for tx in &settled {
            running = running + tx.signed_amount();
            let date = tx.created_at.date_naive();
            let same_day = points.last().map_or(false, |p| p.date == date);
            match points.last_mut() {
                Some(last) if same_day => last.balance = running.clone(),
                _ => points.push(BalancePoint {
                    date,
                    balance: running.clone(),
                }),
            }
        }
        Ok(points)
    }

    pub async fn summary(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
    ) -> LedgerResult<AccountSummary> {
        let entries = self.collect(account_id, filter).await?;

        let mut income = BigDecimal::from(0);
        let mut expenses = BigDecimal::from(0);
        let mut settled_count = 0;
        let mut pending_count = 0;
        let mut failed_count = 0;
        for tx in &entries {
            match tx.status {
                TransactionStatus::Pending => pending_count += 1,
                TransactionStatus::Failed => failed_count += 1,
                TransactionStatus::Completed | TransactionStatus::Disputed => {
                    settled_count += 1;
                    match tx.direction {
                        Direction::Credit => income = income + &tx.amount,
                        Direction::Debit => expenses = expenses + &tx.amount,
                    }
                }
            }
        }
        let net = &income - &expenses;

        Ok(AccountSummary {
            income,
            expenses,
            net,
            settled_count,
            pending_count,
            failed_count,
        })
    }

    pub async fn pending_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<Transaction>> {
        Ok(self.repo.list_pending_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{Account, TransactionType};
    use crate::ports::{AccountRepository, PostingRepository};
    use chrono::Duration;
    use futures::TryStreamExt;
    use std::str::FromStr;

    fn usd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    async fn setup() -> (Arc<MemoryStore>, TransactionJournal, Account) {
        let store = Arc::new(MemoryStore::new());
        let account = Account::open(Uuid::new_v4(), "checking", "USD");
        store.insert_account(&account).await.unwrap();
        let journal = TransactionJournal::new(store.clone(), EventBus::default());
        (store, journal, account)
    }

    async fn post(
        store: &MemoryStore,
        account: &Account,
        kind: TransactionType,
        amount: &str,
        at: DateTime<Utc>,
    ) -> Transaction {
        let tx = Transaction::new(
            account.id,
            account.user_id,
            kind,
            usd(amount),
            "USD",
            TransactionStatus::Completed,
        )
        .effective_at(at);
        store
            .post_completed(&tx, &tx.signed_amount(), None)
            .await
            .unwrap()
            .transaction
    }

    #[tokio::test]
    async fn test_advance_rejects_terminal_entries() {
        let (_store, journal, account) = setup().await;
        let tx = Transaction::new(
            account.id,
            account.user_id,
            TransactionType::Transfer,
            usd("10.00"),
            "USD",
            TransactionStatus::Pending,
        );
        journal.record(&tx).await.unwrap();

        journal.advance(tx.id, TransactionStatus::Failed).await.unwrap();
        let err = journal
            .advance(tx.id, TransactionStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition {
                from: TransactionStatus::Failed,
                to: TransactionStatus::Completed,
            }
        );
    }

    #[tokio::test]
    async fn test_pages_walk_newest_first_without_overlap() {
        let (store, journal, account) = setup().await;
        let start = Utc::now() - Duration::days(1);
        for i in 0..5 {
            post(&store, &account, TransactionType::Deposit, "1.00", start + Duration::minutes(i)).await;
        }

        let first = journal
            .list_page(account.id, &TransactionFilter::default(), None, Some(2))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.items[0].created_at > first.items[1].created_at);

        let cursor = first.next_cursor.clone().unwrap();
        let second = journal
            .list_page(account.id, &TransactionFilter::default(), Some(&cursor), Some(2))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.items[0].created_at < first.items[1].created_at);
    }

    #[tokio::test]
    async fn test_bad_cursor_is_rejected() {
        let (_store, journal, account) = setup().await;
        let err = journal
            .list_page(account.id, &TransactionFilter::default(), Some("%%%"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
    }

    #[tokio::test]
    async fn test_stream_is_restartable() {
        let (store, journal, account) = setup().await;
        let start = Utc::now() - Duration::hours(5);
        for i in 0..3 {
            post(&store, &account, TransactionType::Deposit, "5.00", start + Duration::minutes(i)).await;
        }

        let first: Vec<Transaction> = journal
            .list_for_account(account.id, TransactionFilter::default())
            .try_collect()
            .await
            .unwrap();
        let again: Vec<Transaction> = journal
            .list_for_account(account.id, TransactionFilter::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_history_and_summary() {
        let (store, journal, account) = setup().await;
        let yesterday = Utc::now() - Duration::days(1);
        post(&store, &account, TransactionType::Deposit, "200.00", yesterday).await;
        post(&store, &account, TransactionType::Fee, "5.00", Utc::now()).await;

        let history = journal.balance_history(account.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].balance, usd("200.00"));
        assert_eq!(history[1].balance, usd("195.00"));

        let summary = journal
            .summary(account.id, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(summary.income, usd("200.00"));
        assert_eq!(summary.expenses, usd("5.00"));
        assert_eq!(summary.net, usd("195.00"));
        assert_eq!(summary.settled_count, 2);

        assert_eq!(journal.replay_balance(account.id).await.unwrap(), usd("195.00"));
    }
}
