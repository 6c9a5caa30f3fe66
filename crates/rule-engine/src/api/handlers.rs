//! 规则管理接口处理函数

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Map, Value};
use tracing::info;
use validator::Validate;

use super::dto::{ApiResponse, ListRulesQuery, RunResponse, SaveRuleRequest};
use super::error::ApiError;
use super::state::AppState;
use crate::dispatch::dispatch_event_with_report;
use crate::error::EngineError;
use crate::metadata::Catalog;
use crate::models::Rule;
use crate::store::RuleDocument;
use crate::validation::ValidationResult;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// 请求校验后执行两层规则校验
fn checked_rule(state: &AppState, req: SaveRuleRequest) -> Result<Rule, ApiError> {
    req.validate()?;
    let rule = req.into_rule();
    let result = state.validate(&rule);
    if !result.valid {
        return Err(ApiError::InvalidRule(result.errors));
    }
    Ok(rule)
}

/// GET /api/rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> ApiResult<Vec<RuleDocument>> {
    let rules = state
        .store
        .list_all()
        .await?
        .into_iter()
        .filter(|doc| query.trigger_type.as_deref().is_none_or(|t| doc.trigger_type == t))
        .filter(|doc| query.enabled.is_none_or(|enabled| doc.enabled == enabled))
        .collect();
    Ok(Json(ApiResponse::success(rules)))
}

/// POST /api/rules
pub async fn create_rule(
    State(state): State<AppState>,
    Json(req): Json<SaveRuleRequest>,
) -> ApiResult<RuleDocument> {
    let rule = checked_rule(&state, req)?;
    let doc = state.store.create(&rule).await?;
    info!(rule_id = %doc.id, trigger_type = %doc.trigger_type, "Rule created");
    Ok(Json(ApiResponse::success(doc)))
}

/// GET /api/rules/{id}
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RuleDocument> {
    let doc = state.store.get(&id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

/// PUT /api/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SaveRuleRequest>,
) -> ApiResult<RuleDocument> {
    let rule = checked_rule(&state, req)?;
    let doc = state.store.update(&id, &rule).await?;
    info!(rule_id = %id, "Rule updated");
    Ok(Json(ApiResponse::success(doc)))
}

/// DELETE /api/rules/{id}
pub async fn delete_rule(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.store.delete(&id).await?;
    info!(rule_id = %id, "Rule deleted");
    Ok(Json(ApiResponse::<()>::success_empty()))
}

/// POST /api/rules/{id}/enable
pub async fn enable_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RuleDocument> {
    let doc = state.store.set_enabled(&id, true).await?;
    info!(rule_id = %id, "Rule enabled");
    Ok(Json(ApiResponse::success(doc)))
}

/// POST /api/rules/{id}/disable
pub async fn disable_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RuleDocument> {
    let doc = state.store.set_enabled(&id, false).await?;
    info!(rule_id = %id, "Rule disabled");
    Ok(Json(ApiResponse::success(doc)))
}

/// POST /api/rules/{id}/run
///
/// 通过规则自身的触发器立即运行一次，与启用状态无关
pub async fn run_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RunResponse> {
    let doc = state.store.get(&id).await?;
    let (report, errors) = state.engine.run_rule_with_report(&doc.spec).await;
    Ok(Json(ApiResponse::success(RunResponse::new(report, errors))))
}

/// POST /api/rules/validate
pub async fn validate_rule(
    State(state): State<AppState>,
    Json(rule): Json<Rule>,
) -> ApiResult<ValidationResult> {
    Ok(Json(ApiResponse::success(state.validate(&rule))))
}

/// GET /api/metadata
pub async fn get_metadata() -> ApiResult<&'static Catalog> {
    Ok(Json(ApiResponse::success(Catalog::builtin())))
}

/// POST /api/dispatch/{trigger_type}
///
/// 业务系统写入实体后调用，请求体作为评估上下文数据
pub async fn dispatch(
    State(state): State<AppState>,
    Path(trigger_type): Path<String>,
    Json(data): Json<Map<String, Value>>,
) -> ApiResult<RunResponse> {
    if !state.registry().has_trigger(&trigger_type) {
        return Err(EngineError::UnknownTrigger(trigger_type).into());
    }

    let (report, errors) =
        dispatch_event_with_report(&state.engine, state.store.as_ref(), &trigger_type, data).await;
    Ok(Json(ApiResponse::success(RunResponse::new(report, errors))))
}
