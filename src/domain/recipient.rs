//! Saved transfer recipients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved destination. The account identifier is opaque bookkeeping; no
/// settlement happens against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecipient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_name: String,
    pub bank_name: Option<String>,
    pub account_identifier: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Destination details supplied with a first transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipient {
    pub recipient_name: String,
    pub bank_name: Option<String>,
    pub account_identifier: String,
}

impl TransferRecipient {
    pub fn from_new(user_id: Uuid, new: &NewRecipient) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            recipient_name: new.recipient_name.clone(),
            bank_name: new.bank_name.clone(),
            account_identifier: new.account_identifier.clone(),
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    /// Later of the stored and the offered timestamp.
    pub fn touched_at(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_used_at {
            Some(previous) if previous > at => previous,
            _ => at,
        }
    }
}
