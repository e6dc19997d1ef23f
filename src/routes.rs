// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    handler::{
        chat::{chat_api_handler, chat_request_handler},
        notification_handler::notification_handler,
        socket::socket_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .merge(chat_api_handler())
        .nest("/notifications", notification_handler())
        .layer(middleware::from_fn(auth));

    let chat_requests = chat_request_handler().layer(middleware::from_fn(auth));

    Router::new()
        .nest("/api", api_route)
        .merge(chat_requests)
        .route("/socket", get(socket_handler))
        .route("/health", get(health_check))
        .nest_service("/uploads", ServeDir::new(&app_state.env.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}
