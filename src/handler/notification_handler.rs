// handler/notification_handler.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::HttpError, handler::chat::PaginationQuery, middleware::JWTAuthMiddleware, AppState,
};

pub fn notification_handler() -> Router {
    Router::new()
        .route("/", get(get_user_notifications))
        .route("/read-all", put(mark_all_notifications_read))
        .route("/:id/read", put(mark_notification_read))
}

async fn get_user_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    pagination
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let (limit, offset) = pagination.limit_offset();

    let (notifications, unread_count) = app_state
        .services
        .notification_service
        .list(auth.user.id, limit, offset)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "notifications": notifications,
        "unreadCount": unread_count
    })))
}

async fn mark_notification_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .services
        .notification_service
        .mark_read(notification_id, auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Notification marked as read"
    })))
}

async fn mark_all_notifications_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .services
        .notification_service
        .mark_all_read(auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "updated": updated
    })))
}
