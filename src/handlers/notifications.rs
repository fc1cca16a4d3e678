use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::NotificationTarget;
use crate::error::AppError;
use crate::handlers::auth::{AdminId, CallerId};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

async fn list_for(
    state: &AppState,
    target: NotificationTarget,
    limit: Option<i64>,
) -> Result<serde_json::Value, AppError> {
    let notifications = &state.core.notifications;
    let items = notifications.list_recent(target, limit).await?;
    let unread = notifications.unread_count(target).await?;
    Ok(json!({ "items": items, "unread": unread }))
}

pub async fn list_mine(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let body = list_for(&state, NotificationTarget::User(caller), query.limit).await?;
    Ok(Json(body))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let notification = state
        .core
        .notifications
        .mark_read(NotificationTarget::User(caller), id)
        .await?;
    Ok(Json(notification))
}

pub async fn list_admin(
    State(state): State<AppState>,
    AdminId(_admin): AdminId,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let body = list_for(&state, NotificationTarget::Admin, query.limit).await?;
    Ok(Json(body))
}

pub async fn mark_all_admin_read(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .core
        .notifications
        .mark_all_read(NotificationTarget::Admin)
        .await?;
    tracing::debug!(admin_id = %admin, updated, "admin notifications marked read");
    Ok(Json(json!({ "updated": updated })))
}
