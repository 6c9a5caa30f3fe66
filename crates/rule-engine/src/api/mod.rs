//! REST 接口
//!
//! 规则增删改查、启停、手动运行、校验、元数据查询与事件分发。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{Json, Router, middleware, routing::get};
use roster_shared::observability::middleware as obs_middleware;
use serde_json::{Value, json};

pub use dto::ApiResponse;
pub use error::ApiError;
pub use state::AppState;

/// 完整应用路由（含可观测性中间件）
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .route("/health", get(health_check))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

/// 存活探针
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rule-engine"
    }))
}
