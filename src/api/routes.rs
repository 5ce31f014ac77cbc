//! Router assembly

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{stream, tasks, versions};
use crate::AppState;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/stats", get(tasks::task_stats))
        .route("/tasks/stream", get(stream::stream_tasks))
        .route("/tasks/:task_id", get(tasks::get_task))
        .route("/tasks/:task_type/:resource_id", post(tasks::create_task))
        .route(
            "/versions/:resource_type/:resource_id",
            get(versions::get_versions),
        )
        .route(
            "/versions/:resource_type/:resource_id/restore/:version",
            post(versions::restore_version),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
