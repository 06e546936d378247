//! Read-only HTTP status endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::error;

use crate::dispatcher::Dispatcher;

/// Build the status router.
pub fn status_routes(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/users/{user_id}/today", get(today))
        .with_state(dispatcher)
}

async fn index() -> &'static str {
    "PFC assist is running."
}

async fn today(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match dispatcher.today_summary(&user_id).await {
        Ok(Some(summary)) => (StatusCode::OK, Json(serde_json::json!(summary))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "User not found or not registered"})),
        ),
        Err(e) => {
            error!(user_id = %user_id, "Failed to load today's summary: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Storage failure"})),
            )
        }
    }
}
