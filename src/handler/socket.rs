use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Query,
    },
    http::HeaderMap,
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;

use crate::{
    error::HttpError,
    middleware::bearer_token,
    realtime::socket,
    service::error::ServiceError,
    utils::token,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// Authenticates before upgrading; a bad token never gets a socket.
pub async fn socket_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let token = query
        .token
        .or_else(|| bearer_token(&headers))
        .ok_or(ServiceError::Unauthenticated)?;

    let user = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let ws = ws.map_err(|e| HttpError::new(e.body_text(), e.status()))?;

    let services = app_state.services.clone();
    let sessions = app_state.sessions.clone();
    let heartbeat = app_state.env.heartbeat();

    Ok(ws.on_upgrade(move |stream| socket::run(stream, user, services, sessions, heartbeat)))
}
