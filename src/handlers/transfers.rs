use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::auth::CallerId;
use crate::use_cases::TransferRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub code: String,
}

pub async fn initiate(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(request): Json<TransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state.core.transfers.initiate(caller, request).await?;
    let status = if receipt.otp_required {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(receipt)))
}

pub async fn confirm(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    let settled = state
        .core
        .transfers
        .confirm(caller, id, body.code.trim())
        .await?;
    Ok(Json(settled))
}

pub async fn resend(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.core.transfers.resend_code(caller, id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "transaction_id": id, "resent": true })),
    ))
}
