//! Domain entities.
//! Framework-agnostic types shared by the services, the stores and the HTTP layer.

pub mod account;
pub mod audit;
pub mod notification;
pub mod otp;
pub mod recipient;
pub mod transaction;

pub use account::{Account, AccountRequest, AccountRequestStatus, AccountStatus, Profile};
pub use audit::{AdminAction, AdminActionType};
pub use notification::{NewNotification, Notification, NotificationTarget, NotificationType};
pub use otp::{ChallengeState, OtpChallenge, VerifyOutcome};
pub use recipient::{NewRecipient, TransferRecipient};
pub use transaction::{
    Direction, Transaction, TransactionFilter, TransactionStatus, TransactionType,
};

/// Parse error for the string forms of domain enums stored as TEXT.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
