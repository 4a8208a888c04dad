//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::UserId;

/// Query string of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// User the connection belongs to.
    pub user_id: uuid::Uuid,
}

/// `GET /ws?user_id=...`: Upgrade to a per-user push connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = UserId::from_uuid(params.user_id);
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| run_connection(socket, user_id, registry))
}
