use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{ActionHandler, optional_str, required_str};
use crate::error::ActionError;
use crate::models::{EvalContext, Parameters};

/// `level` 参数可选值，与元数据目录共用
pub const LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// `log` 动作：把渲染后的消息写入日志
pub struct LogAction;

#[async_trait]
impl ActionHandler for LogAction {
    async fn execute(&self, _ctx: &EvalContext, params: &Parameters) -> Result<(), ActionError> {
        let message = required_str(params, "message")?;
        let level = optional_str(params, "level")?.unwrap_or("info");

        match level.to_ascii_lowercase().as_str() {
            "debug" => debug!(target: "rule_engine::actions", "{}", message),
            "info" => info!(target: "rule_engine::actions", "{}", message),
            "warn" => warn!(target: "rule_engine::actions", "{}", message),
            "error" => error!(target: "rule_engine::actions", "{}", message),
            other => {
                return Err(ActionError::InvalidParameter {
                    name: "level".to_string(),
                    message: format!("不支持的日志级别: {}", other),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_action() {
        let params = json!({ "message": "hello", "level": "WARN" });
        let result = LogAction
            .execute(&EvalContext::default(), params.as_object().unwrap())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_log_action_rejects_unknown_level() {
        for level in ["loud", "warning"] {
            let params = json!({ "message": "hello", "level": level });
            let err = LogAction
                .execute(&EvalContext::default(), params.as_object().unwrap())
                .await
                .unwrap_err();
            assert!(
                matches!(err, ActionError::InvalidParameter { ref name, .. } if name == "level")
            );
        }
    }

    #[tokio::test]
    async fn test_log_action_accepts_every_listed_level() {
        for level in LEVELS {
            let params = json!({ "message": "hello", "level": level.to_uppercase() });
            let result = LogAction
                .execute(&EvalContext::default(), params.as_object().unwrap())
                .await;
            assert!(result.is_ok(), "{level}");
        }
    }

    #[tokio::test]
    async fn test_log_action_requires_message() {
        let params = json!({ "level": "info" });
        let err = LogAction
            .execute(&EvalContext::default(), params.as_object().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::MissingParameter("message".to_string()));
    }
}
