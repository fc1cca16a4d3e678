//! Account, account request and profile entities.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const ACCOUNT_NUMBER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Restricted,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Restricted => "restricted",
            AccountStatus::Closed => "closed",
        }
    }

    /// Status only moves forward; `restricted -> active` is the single way back
    /// and is reserved for administrators.
    pub fn can_transition_to(&self, next: AccountStatus, administrative: bool) -> bool {
        match (self, next) {
            (AccountStatus::Active, AccountStatus::Restricted) => true,
            (AccountStatus::Active, AccountStatus::Closed) => true,
            (AccountStatus::Restricted, AccountStatus::Closed) => true,
            (AccountStatus::Restricted, AccountStatus::Active) => administrative,
            _ => false,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "restricted" => Ok(AccountStatus::Restricted),
            "closed" => Ok(AccountStatus::Closed),
            other => Err(ParseEnumError::new("account status", other)),
        }
    }
}

/// A customer account. Balances are only ever written by the ledger store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub account_name: String,
    pub account_number: String,
    pub status: AccountStatus,
    pub balance: BigDecimal,
    pub available_balance: BigDecimal,
    pub currency: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A freshly opened, empty, active account.
    pub fn open(user_id: Uuid, account_type: &str, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_type: account_type.to_string(),
            account_name: display_name(account_type),
            account_number: generate_account_number(),
            status: AccountStatus::Active,
            balance: BigDecimal::from(0),
            available_balance: BigDecimal::from(0),
            currency: currency.to_string(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Amount currently held (balance minus available balance).
    pub fn holds(&self) -> BigDecimal {
        &self.balance - &self.available_balance
    }
}

fn display_name(account_type: &str) -> String {
    let mut chars = account_type.chars();
    match chars.next() {
        Some(first) => format!("{}{} Account", first.to_uppercase(), chars.as_str()),
        None => "Account".to_string(),
    }
}

fn generate_account_number() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000_000_000u64..1_000_000_000_000u64)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRequestStatus::Pending => "pending",
            AccountRequestStatus::Approved => "approved",
            AccountRequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for AccountRequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountRequestStatus::Pending),
            "approved" => Ok(AccountRequestStatus::Approved),
            "rejected" => Ok(AccountRequestStatus::Rejected),
            other => Err(ParseEnumError::new("account request status", other)),
        }
    }
}

/// A customer's request to open an account of a given type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub status: AccountRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl AccountRequest {
    pub fn new(user_id: Uuid, account_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_type: account_type.to_string(),
            status: AccountRequestStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// The slice of a user profile the core needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub can_transact: bool,
}
