use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{error::HttpError, middleware::JWTAuthMiddleware, AppState};

/// Routes mounted under `/api`.
pub fn chat_api_handler() -> Router {
    Router::new()
        .route("/chats", get(get_user_chats).post(create_chat))
        .route("/messages/:chat_id", get(get_messages))
}

/// Chat request routes, mounted at the root.
pub fn chat_request_handler() -> Router {
    Router::new()
        .route("/chats/:chat_id/approve", post(approve_chat))
        .route("/chats/:chat_id/reject", post(reject_chat))
        .route("/chats/:chat_id/status", get(get_chat_status))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatDto {
    pub recipient_id: Uuid,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaginationQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

impl PaginationQuery {
    /// `(limit, offset)` with the defaults applied.
    pub fn limit_offset(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1) as i64;
        let limit = self.limit.unwrap_or(20).clamp(1, 100) as i64;
        (limit, (page - 1) * limit)
    }
}

pub async fn create_chat(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateChatDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let chat = app_state
        .services
        .chat_service
        .create(auth.user, body.recipient_id, body.job_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": chat
    })))
}

pub async fn get_user_chats(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    pagination
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let (limit, offset) = pagination.limit_offset();

    let chats = app_state
        .services
        .chat_service
        .list(auth.user, limit, offset)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": chats
    })))
}

/// The viewer's transcript, oldest first.
pub async fn get_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let messages = app_state
        .services
        .message_service
        .history(chat_id, auth.user)
        .await?;

    Ok(Json(messages))
}

pub async fn approve_chat(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let chat = app_state
        .services
        .chat_service
        .approve(chat_id, auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": chat
    })))
}

pub async fn reject_chat(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let chat = app_state
        .services
        .chat_service
        .reject(chat_id, auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": chat
    })))
}

pub async fn get_chat_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let view = app_state
        .services
        .chat_service
        .status(chat_id, auth.user)
        .await?;

    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_offsets() {
        let query = PaginationQuery { page: None, limit: None };
        assert_eq!(query.limit_offset(), (20, 0));

        let query = PaginationQuery { page: Some(3), limit: Some(10) };
        assert_eq!(query.limit_offset(), (10, 20));

        let query = PaginationQuery { page: Some(1), limit: Some(500) };
        assert!(query.validate().is_err());
    }
}
