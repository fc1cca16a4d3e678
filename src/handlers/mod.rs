pub mod accounts;
pub mod admin;
pub mod auth;
pub mod notifications;
pub mod transfers;
pub mod ws;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub store: String,
    pub db: String,
    pub db_pool: Option<DbPoolStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (store, db_status, db_pool) = match &state.pool {
        Some(pool) => {
            // Check database connectivity with SELECT 1 query
            let db_status = match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => "connected",
                Err(e) => {
                    tracing::warn!(error = %e, "health check could not reach the database");
                    "disconnected"
                }
            };
            let stats = DbPoolStats {
                active_connections: pool.size(),
                idle_connections: pool.num_idle() as u32,
                max_connections: pool.options().get_max_connections(),
            };
            ("postgres", db_status, Some(stats))
        }
        None => ("memory", "not_configured", None),
    };

    let healthy = db_status != "disconnected";
    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
        db: db_status.to_string(),
        db_pool,
    };

    // Return 503 if database is down, 200 otherwise
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
