use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::AppState;

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/api/healthchecker", get(health_checker_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/api/cache/invalidate", post(cache_invalidate_handler))
        .route("/api/cache/cleanup", post(cache_cleanup_handler))
}

async fn health_checker_handler(State(state): State<AppState>) -> Json<Value> {
    let health = state.db.check_health().await;
    let cache = state.cache.get_stats().await;

    Json(json!({
        "status": if health.is_healthy() { "success" } else { "degraded" },
        "message": "Homesite data service is running! 🚀",
        "database": health,
        "cache": cache,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn cache_stats_handler(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.get_stats().await;
    Json(json!({ "status": "success", "stats": stats }))
}

#[derive(Debug, Deserialize)]
struct InvalidateRequest {
    tag: Option<String>,
    pattern: Option<String>,
}

/// Bulk invalidation after a write: by tag (preferred) or by key substring.
async fn cache_invalidate_handler(
    State(state): State<AppState>,
    Json(body): Json<InvalidateRequest>,
) -> Result<Json<Value>> {
    let invalidated = match (body.tag, body.pattern) {
        (Some(tag), None) => state.cache.invalidate_by_tag(&tag).await,
        (None, Some(pattern)) => state.cache.invalidate_pattern(&pattern).await,
        _ => {
            return Err(AppError::BadRequest(
                "Provide exactly one of `tag` or `pattern`".to_string(),
            ))
        }
    };

    Ok(Json(json!({ "status": "success", "invalidated": invalidated })))
}

async fn cache_cleanup_handler(State(state): State<AppState>) -> Json<Value> {
    let removed = state.cache.cleanup().await;
    Json(json!({ "status": "success", "removed": removed }))
}
