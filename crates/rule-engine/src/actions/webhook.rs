use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ActionHandler, optional_str, required_str};
use crate::error::ActionError;
use crate::models::{EvalContext, Parameters};

/// `webhook` 动作：向外部地址推送 JSON
///
/// 未配置 `payload` 时推送整个上下文数据。非 2xx 响应视为失败。
pub struct WebhookAction {
    client: reqwest::Client,
}

impl WebhookAction {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for WebhookAction {
    async fn execute(&self, ctx: &EvalContext, params: &Parameters) -> Result<(), ActionError> {
        let url = required_str(params, "url")?;
        let parsed = reqwest::Url::parse(url).map_err(|e| ActionError::InvalidParameter {
            name: "url".to_string(),
            message: e.to_string(),
        })?;

        let request = match optional_str(params, "method")?
            .unwrap_or("POST")
            .to_ascii_uppercase()
            .as_str()
        {
            "POST" => self.client.post(parsed),
            "PUT" => self.client.put(parsed),
            other => {
                return Err(ActionError::InvalidParameter {
                    name: "method".to_string(),
                    message: format!("不支持的请求方法: {}", other),
                });
            }
        };

        let body = match params.get("payload") {
            Some(Value::Null) | None => Value::Object(ctx.data.clone()),
            Some(payload) => payload.clone(),
        };

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ActionError::Downstream(format!("请求 {} 失败: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Downstream(format!("{} 返回 HTTP {}", url, status)));
        }

        debug!(url = %url, status = %status, "webhook 推送成功");
        Ok(())
    }
}
