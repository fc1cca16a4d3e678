//! Transaction domain entity.
//! Framework-agnostic representation of one balance-affecting journal entry.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
    Fee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
            TransactionType::Payment => "payment",
            TransactionType::Fee => "fee",
        }
    }

    /// Direction of the balance effect for this type.
    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Deposit => Direction::Credit,
            _ => Direction::Debit,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "transfer" => Ok(TransactionType::Transfer),
            "payment" => Ok(TransactionType::Payment),
            "fee" => Ok(TransactionType::Fee),
            other => Err(ParseEnumError::new("transaction type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    /// Apply the direction to a positive amount.
    pub fn signed(&self, amount: &BigDecimal) -> BigDecimal {
        match self {
            Direction::Credit => amount.clone(),
            Direction::Debit => -amount.clone(),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(ParseEnumError::new("direction", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Disputed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Disputed => "disputed",
        }
    }

    /// Journal transitions: only a pending entry may move, and only to a
    /// terminal outcome.
    pub fn can_advance_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }

    /// Whether the entry's effect is part of the account balance.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Disputed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "disputed" => Ok(TransactionStatus::Disputed),
            other => Err(ParseEnumError::new("transaction status", other)),
        }
    }
}

/// Domain entity representing a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub recipient_id: Option<Uuid>,
    pub dispute_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: Uuid,
        user_id: Uuid,
        transaction_type: TransactionType,
        amount: BigDecimal,
        currency: &str,
        status: TransactionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            user_id,
            transaction_type,
            direction: transaction_type.direction(),
            amount,
            currency: currency.to_string(),
            status,
            description: None,
            category: None,
            merchant: None,
            recipient_id: None,
            dispute_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: &str, merchant: &str) -> Self {
        self.category = Some(category.to_string());
        self.merchant = Some(merchant.to_string());
        self
    }

    pub fn with_recipient(mut self, recipient_id: Uuid) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    /// Backdate (or postdate) the entry's effective timestamp.
    pub fn effective_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Signed effect on the account balance.
    pub fn signed_amount(&self) -> BigDecimal {
        self.direction.signed(&self.amount)
    }
}

/// Filter for journal listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(from) = self.from {
            if tx.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if tx.created_at >= to {
                return false;
            }
        }
        match self.status {
            Some(status) => tx.status == status,
            None => true,
        }
    }
}
