use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Account, TransactionFilter, TransactionStatus};
use crate::error::{AppError, LedgerError};
use crate::handlers::auth::CallerId;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<TransactionStatus>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

impl TransactionQuery {
    fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            from: self.from,
            to: self.to,
            status: self.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountRequestBody {
    pub account_type: String,
}

/// Another user's account reads as not found.
pub(crate) async fn owned_account(state: &AppState, caller: Uuid, id: Uuid) -> Result<Account, AppError> {
    let account = state.core.ledger.get_account(id).await?;
    if account.user_id != caller {
        return Err(LedgerError::NotFound(format!("account {}", id)).into());
    }
    Ok(account)
}

pub async fn list_accounts(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let accounts = state.core.ledger.accounts_for_user(caller).await?;
    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = owned_account(&state, caller, id).await?;
    Ok(Json(account))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_account(&state, caller, id).await?;
    let page = state
        .core
        .journal
        .list_page(id, &query.filter(), query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

pub async fn balance_history(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    owned_account(&state, caller, id).await?;
    let points = state.core.journal.balance_history(id).await?;
    Ok(Json(points))
}

pub async fn summary(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_account(&state, caller, id).await?;
    let summary = state.core.journal.summary(id, &query.filter()).await?;
    Ok(Json(summary))
}

pub async fn list_recipients(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let recipients = state.core.transfers.list_recipients(caller).await?;
    Ok(Json(recipients))
}

pub async fn request_account(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(body): Json<AccountRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let request = state
        .core
        .approvals
        .request_account(caller, &body.account_type)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(request)))
}
