use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::accounts::owned_account;
use crate::handlers::auth::CallerId;
use crate::services::TransactionCommitted;
use crate::AppState;

const HEARTBEAT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Only forward events for this account.
    pub account_id: Option<Uuid>,
}

/// Which events a socket receives: the caller's own, optionally narrowed to
/// one of their accounts.
#[derive(Debug, Clone, Copy)]
struct FeedFilter {
    user_id: Uuid,
    account_id: Option<Uuid>,
}

impl FeedFilter {
    async fn resolve(state: &AppState, caller: Uuid, query: &WsQuery) -> Result<Self, AppError> {
        if let Some(id) = query.account_id {
            owned_account(state, caller, id).await?;
        }
        Ok(Self {
            user_id: caller,
            account_id: query.account_id,
        })
    }

    fn wanted(&self, event: &TransactionCommitted) -> bool {
        event.user_id == self.user_id && self.account_id.map_or(true, |id| event.account_id == id)
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let filter = FeedFilter::resolve(&state, caller, &params).await?;
    let rx = state.core.events.subscribe();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rx, filter)))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<TransactionCommitted>,
    filter: FeedFilter,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!(len = text.len(), "ignoring client text frame");
                }
                Message::Close(_) => {
                    tracing::debug!("client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(HEARTBEAT_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        tracing::debug!("client disconnected during heartbeat");
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) if filter.wanted(&event) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!(error = %e, "failed to serialize event");
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json)).await.is_err() {
                                tracing::debug!("client disconnected");
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "websocket client lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    tracing::debug!("websocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use std::sync::Arc;

    use crate::adapters::{LogCodeSender, MemoryStore};
    use crate::domain::{TransactionStatus, TransactionType};
    use crate::use_cases::{Core, CoreSettings};

    fn event(user_id: Uuid, account_id: Uuid) -> TransactionCommitted {
        TransactionCommitted {
            transaction_id: Uuid::new_v4(),
            account_id,
            user_id,
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Completed,
            amount: BigDecimal::from(10),
            committed_at: Utc::now(),
        }
    }

    fn state() -> AppState {
        AppState {
            core: Core::new(
                Arc::new(MemoryStore::new()),
                Arc::new(LogCodeSender),
                CoreSettings::default(),
            ),
            pool: None,
        }
    }

    #[test]
    fn test_feed_only_carries_callers_events() {
        let me = Uuid::new_v4();
        let mine = Uuid::new_v4();
        let everything = FeedFilter {
            user_id: me,
            account_id: None,
        };
        assert!(everything.wanted(&event(me, mine)));
        assert!(!everything.wanted(&event(Uuid::new_v4(), Uuid::new_v4())));

        let one_account = FeedFilter {
            user_id: me,
            account_id: Some(mine),
        };
        assert!(one_account.wanted(&event(me, mine)));
        assert!(!one_account.wanted(&event(me, Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_filter_rejects_foreign_account() {
        let state = state();
        let owner = Uuid::new_v4();
        let account = state
            .core
            .ledger
            .open_account(owner, "checking", "USD")
            .await
            .unwrap();
        let query = WsQuery {
            account_id: Some(account.id),
        };

        let filter = FeedFilter::resolve(&state, owner, &query).await.unwrap();
        assert_eq!(filter.account_id, Some(account.id));

        let intruder = FeedFilter::resolve(&state, Uuid::new_v4(), &query).await;
        assert!(matches!(
            intruder,
            Err(AppError::Ledger(crate::error::LedgerError::NotFound(_)))
        ));
    }
}
