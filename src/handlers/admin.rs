//! Administrative endpoints. Every mutation is audited by the admin path.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::AccountStatus;
use crate::error::AppError;
use crate::handlers::auth::AdminId;
use crate::use_cases::account_approval::DEFAULT_AUTO_APPROVE_AFTER_MINUTES;
use crate::use_cases::ManualAdjustment;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub allowed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub note: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub min_age_minutes: Option<i64>,
}

pub async fn manual_deposit(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(adjustment): Json<ManualAdjustment>,
) -> Result<impl IntoResponse, AppError> {
    let posting = state.core.admin.manual_deposit(admin, adjustment).await?;
    Ok((StatusCode::CREATED, Json(posting)))
}

pub async fn manual_withdrawal(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(adjustment): Json<ManualAdjustment>,
) -> Result<impl IntoResponse, AppError> {
    let posting = state.core.admin.manual_withdrawal(admin, adjustment).await?;
    Ok((StatusCode::CREATED, Json(posting)))
}

pub async fn set_permission(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .core
        .admin
        .set_transaction_permission(admin, user_id, body.allowed, body.reason)
        .await?;
    Ok(Json(profile))
}

pub async fn set_account_status(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Path(account_id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .core
        .admin
        .set_account_status(admin, account_id, body.status)
        .await?;
    Ok(Json(account))
}

pub async fn fail_transaction(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Path(transaction_id): Path<Uuid>,
    Json(body): Json<FailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let failed = state
        .core
        .admin
        .resolve_pending(admin, transaction_id, &body.reason)
        .await?;
    Ok(Json(failed))
}

pub async fn dispute_transaction(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Path(transaction_id): Path<Uuid>,
    Json(body): Json<DisputeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let disputed = state
        .core
        .admin
        .mark_disputed(admin, transaction_id, &body.note)
        .await?;
    Ok(Json(disputed))
}

pub async fn reconcile(
    State(state): State<AppState>,
    AdminId(_admin): AdminId,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.core.ledger.reconcile(account_id).await?;
    if !report.consistent {
        tracing::warn!(
            account_id = %account_id,
            stored = %report.stored_balance,
            replayed = %report.replayed_balance,
            "ledger drift detected"
        );
    }
    Ok(Json(report))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    AdminId(_admin): AdminId,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let actions = state.core.admin.audit_trail(user_id).await?;
    Ok(Json(actions))
}

pub async fn approve_requests(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    body: Option<Json<ApproveRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let minutes = body
        .and_then(|Json(b)| b.min_age_minutes)
        .unwrap_or(DEFAULT_AUTO_APPROVE_AFTER_MINUTES);
    if minutes < 0 {
        return Err(AppError::BadRequest(
            "min_age_minutes must not be negative".to_string(),
        ));
    }

    let approved = state
        .core
        .approvals
        .approve_pending_requests(Duration::minutes(minutes))
        .await?;
    tracing::info!(admin_id = %admin, approved = approved.len(), "account requests approved");
    Ok(Json(json!({ "approved": approved })))
}
