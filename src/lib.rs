pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::adapters::{HttpCodeSender, LogCodeSender, MemoryStore, PgStore};
use crate::config::Config;
use crate::ports::CodeSender;
use crate::use_cases::Core;

#[derive(Clone)]
pub struct AppState {
    pub core: Core,
    /// Present when running against Postgres; used by the health check.
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Wire the core against Postgres when `DATABASE_URL` is set, otherwise
    /// against the in-memory store.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let code_sender: Arc<dyn CodeSender> = match &config.code_delivery_url {
            Some(url) => Arc::new(HttpCodeSender::new(url.clone())),
            None => {
                tracing::warn!("CODE_DELIVERY_URL not set, verification codes will only be logged");
                Arc::new(LogCodeSender)
            }
        };

        match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                db::run_migrations(&pool).await?;
                let store = Arc::new(PgStore::new(pool.clone()));
                Ok(Self {
                    core: Core::new(store, code_sender, config.core_settings()),
                    pool: Some(pool),
                })
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using the in-memory store");
                let store = Arc::new(MemoryStore::new());
                Ok(Self {
                    core: Core::new(store, code_sender, config.core_settings()),
                    pool: None,
                })
            }
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/notifications", get(handlers::notifications::list_admin))
        .route(
            "/notifications/read-all",
            post(handlers::notifications::mark_all_admin_read),
        )
        .route("/deposits", post(handlers::admin::manual_deposit))
        .route("/withdrawals", post(handlers::admin::manual_withdrawal))
        .route("/users/:id/permission", put(handlers::admin::set_permission))
        .route("/users/:id/audit", get(handlers::admin::audit_trail))
        .route("/accounts/:id/status", put(handlers::admin::set_account_status))
        .route("/accounts/:id/reconcile", get(handlers::admin::reconcile))
        .route("/transactions/:id/fail", post(handlers::admin::fail_transaction))
        .route(
            "/transactions/:id/dispute",
            post(handlers::admin::dispute_transaction),
        )
        .route(
            "/account-requests/approve",
            post(handlers::admin::approve_requests),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts", get(handlers::accounts::list_accounts))
        .route("/accounts/:id", get(handlers::accounts::get_account))
        .route(
            "/accounts/:id/transactions",
            get(handlers::accounts::list_transactions),
        )
        .route(
            "/accounts/:id/balance-history",
            get(handlers::accounts::balance_history),
        )
        .route("/accounts/:id/summary", get(handlers::accounts::summary))
        .route("/account-requests", post(handlers::accounts::request_account))
        .route("/recipients", get(handlers::accounts::list_recipients))
        .route("/transfers", post(handlers::transfers::initiate))
        .route("/transfers/:id/confirm", post(handlers::transfers::confirm))
        .route("/transfers/:id/resend", post(handlers::transfers::resend))
        .route("/notifications", get(handlers::notifications::list_mine))
        .route(
            "/notifications/:id/read",
            post(handlers::notifications::mark_read),
        )
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/admin", admin)
        .layer(cors)
        .with_state(state)
}
