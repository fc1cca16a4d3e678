use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AccountStatus, TransactionStatus};
use crate::ports::RepositoryError;
use crate::validation::ValidationError;

/// Failures of the ledger and transfer pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parties: {0}")]
    InvalidParties(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account {0} is not active")]
    AccountNotActive(Uuid),

    #[error("Transfer blocked: {0}")]
    Blocked(String),

    #[error("Insufficient funds on account {0}")]
    InsufficientFunds(Uuid),

    #[error("Verification code does not match")]
    OtpMismatch,

    #[error("Verification code has expired")]
    OtpExpired,

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Account cannot move from {from} to {to}")]
    InvalidStatusChange {
        from: AccountStatus,
        to: AccountStatus,
    },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("A verification code is already pending for transaction {0}")]
    DuplicatePending(Uuid),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidParties(_) => "INVALID_PARTIES",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::AccountNotActive(_) => "ACCOUNT_NOT_ACTIVE",
            LedgerError::Blocked(_) => "BLOCKED",
            LedgerError::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            LedgerError::OtpMismatch => "OTP_MISMATCH",
            LedgerError::OtpExpired => "OTP_EXPIRED",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::InvalidStatusChange { .. } => "INVALID_STATUS_CHANGE",
            LedgerError::InvalidCursor(_) => "INVALID_CURSOR",
            LedgerError::DuplicatePending(_) => "DUPLICATE_PENDING",
            LedgerError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidParties(_)
            | LedgerError::InvalidAmount(_)
            | LedgerError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            LedgerError::Blocked(_) => StatusCode::FORBIDDEN,
            LedgerError::AccountNotActive(_) | LedgerError::InsufficientFunds(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::OtpMismatch => StatusCode::UNAUTHORIZED,
            LedgerError::OtpExpired => StatusCode::GONE,
            LedgerError::InvalidTransition { .. }
            | LedgerError::InvalidStatusChange { .. }
            | LedgerError::DuplicatePending(_) => StatusCode::CONFLICT,
            LedgerError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(what) => LedgerError::NotFound(what),
            RepositoryError::AccountNotActive(id) => LedgerError::AccountNotActive(id),
            RepositoryError::InsufficientFunds(id) => LedgerError::InsufficientFunds(id),
            RepositoryError::InvalidTransition { from, to } => {
                LedgerError::InvalidTransition { from, to }
            }
            RepositoryError::DuplicatePending(id) => LedgerError::DuplicatePending(id),
            RepositoryError::Conflict(msg) | RepositoryError::Database(msg) => {
                LedgerError::PersistenceFailure(msg)
            }
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        match e.field {
            "amount" => LedgerError::InvalidAmount(e.message),
            _ => LedgerError::InvalidParties(e.to_string()),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ledger(e) => e.status_code(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Ledger(e) => e.code(),
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ledger_error_status_codes() {
        let blocked = AppError::from(LedgerError::Blocked("restricted".into()));
        assert_eq!(blocked.status_code(), StatusCode::FORBIDDEN);

        let funds = AppError::from(LedgerError::InsufficientFunds(Uuid::new_v4()));
        assert_eq!(funds.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let expired = AppError::from(LedgerError::OtpExpired);
        assert_eq!(expired.status_code(), StatusCode::GONE);

        let transition = AppError::from(LedgerError::InvalidTransition {
            from: TransactionStatus::Completed,
            to: TransactionStatus::Failed,
        });
        assert_eq!(transition.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_repository_errors_map_onto_taxonomy() {
        let id = Uuid::new_v4();
        assert_eq!(
            LedgerError::from(RepositoryError::InsufficientFunds(id)),
            LedgerError::InsufficientFunds(id)
        );
        assert_eq!(
            LedgerError::from(RepositoryError::Database("down".into())).code(),
            "PERSISTENCE_FAILURE"
        );
    }

    #[test]
    fn test_amount_validation_maps_to_invalid_amount() {
        let err = LedgerError::from(ValidationError::new("amount", "must be greater than zero"));
        assert_eq!(err.code(), "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_ledger_error_response() {
        let error = AppError::from(LedgerError::OtpMismatch);
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Account not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
