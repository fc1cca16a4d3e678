use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, TransactionType};

pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Published after every successful journal write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCommitted {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub committed_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionCommitted {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            account_id: tx.account_id,
            user_id: tx.user_id,
            transaction_type: tx.transaction_type,
            status: tx.status,
            amount: tx.amount.clone(),
            committed_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransactionCommitted>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, tx: &Transaction) {
        // No subscribers is fine.
        if self.sender.send(TransactionCommitted::from(tx)).is_err() {
            tracing::debug!(transaction_id = %tx.id, "no event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionCommitted> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TransactionType::Fee,
            BigDecimal::from(2),
            "USD",
            TransactionStatus::Completed,
        )
    }

    #[tokio::test]
    async fn test_subscriber_receives_committed_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let tx = fee();

        bus.publish(&tx);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.transaction_id, tx.id);
        assert_eq!(event.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(&fee());
    }
}
