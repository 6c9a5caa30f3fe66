//! 动作处理器
//!
//! 动作只接收已渲染的参数；模板渲染由引擎在调用前完成。

pub mod log;
pub mod notify;
pub mod webhook;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ActionError;
use crate::models::{EvalContext, Parameters};

pub use log::LogAction;
pub use notify::{Channel, LogNotifier, Message, Notifier, SendEmailAction, SendSmsAction};
pub use webhook::WebhookAction;

/// 动作处理器 trait
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, ctx: &EvalContext, params: &Parameters) -> Result<(), ActionError>;
}

/// 读取必填字符串参数，空白字符串视为缺失
pub(crate) fn required_str<'a>(params: &'a Parameters, name: &str) -> Result<&'a str, ActionError> {
    match params.get(name) {
        None | Some(Value::Null) => Err(ActionError::MissingParameter(name.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ActionError::MissingParameter(name.to_string()))
        }
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ActionError::InvalidParameter {
            name: name.to_string(),
            message: "应为字符串".to_string(),
        }),
    }
}

/// 读取可选字符串参数
pub(crate) fn optional_str<'a>(
    params: &'a Parameters,
    name: &str,
) -> Result<Option<&'a str>, ActionError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ActionError::InvalidParameter {
            name: name.to_string(),
            message: "应为字符串".to_string(),
        }),
    }
}
