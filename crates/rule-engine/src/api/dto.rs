//! 请求与响应 DTO

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::engine::RunReport;
use crate::error::MultiError;
use crate::models::{ActionSpec, Condition, Rule, TriggerSpec};

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    pub fn success_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }
}

/// 创建或更新规则
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveRuleRequest {
    #[validate(length(min = 1, max = 200, message = "规则名称长度必须在1-200个字符之间"))]
    pub name: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    #[validate(length(max = 100, message = "条件数量不能超过100"))]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    #[validate(length(max = 50, message = "动作数量不能超过50"))]
    pub actions: Vec<ActionSpec>,
    pub ui_layout: Option<Value>,
}

impl SaveRuleRequest {
    pub fn into_rule(self) -> Rule {
        Rule {
            name: self.name,
            trigger: self.trigger,
            conditions: self.conditions,
            actions: self.actions,
            ui_layout: self.ui_layout,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRulesQuery {
    pub trigger_type: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// 手动运行或事件分发的结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub report: RunReport,
    pub errors: Vec<ErrorDetail>,
}

impl RunResponse {
    pub fn new(report: RunReport, errors: MultiError) -> Self {
        Self {
            report,
            errors: errors
                .iter()
                .map(|e| ErrorDetail {
                    code: e.code().to_string(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_request_validation() {
        let req: SaveRuleRequest = serde_json::from_value(json!({
            "name": "",
            "trigger": { "type": "manual" }
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: SaveRuleRequest = serde_json::from_value(json!({
            "name": "ok",
            "trigger": { "type": "manual", "parameters": {} },
            "uiLayout": { "x": 1 }
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        let rule = req.into_rule();
        assert!(rule.conditions.is_empty());
        assert_eq!(rule.ui_layout, Some(json!({ "x": 1 })));
    }
}
