use std::sync::Arc;

use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{auth::auth_handler, complaints::complaints_handler, users::users_handler},
    middleware::auth,
    AppState,
};

async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Some(db_client) = &app_state.db_client {
        if let Err(e) = db_client.ping().await {
            tracing::error!("Health check failed to reach the database: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "fail",
                    "message": "Database unavailable"
                })),
            );
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Server is running"
        })),
    )
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/users", users_handler().layer(middleware::from_fn(auth)))
        .nest("/complaints", complaints_handler())
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(Extension(app_state))
}
