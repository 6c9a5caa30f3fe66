//! 路由配置

use axum::{
    Router,
    routing::{get, post},
};

use super::handlers;
use super::state::AppState;

/// 规则管理路由
fn rule_routes() -> Router<AppState> {
    Router::new()
        .route("/rules", get(handlers::list_rules).post(handlers::create_rule))
        .route("/rules/validate", post(handlers::validate_rule))
        .route(
            "/rules/{id}",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route("/rules/{id}/enable", post(handlers::enable_rule))
        .route("/rules/{id}/disable", post(handlers::disable_rule))
        .route("/rules/{id}/run", post(handlers::run_rule))
}

/// 挂载在 `/api` 下的全部路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(rule_routes())
        .route("/metadata", get(handlers::get_metadata))
        .route("/dispatch/{trigger_type}", post(handlers::dispatch))
}
