//! 邮件与短信动作
//!
//! 实际投递由 [`Notifier`] 完成；默认的 [`LogNotifier`] 仅记录日志，
//! 接入真实网关时实现同一 trait 即可。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{ActionHandler, required_str};
use crate::error::ActionError;
use crate::models::{EvalContext, Parameters};

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "EMAIL"),
            Self::Sms => write!(f, "SMS"),
        }
    }
}

/// 待发送消息
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub channel: Channel,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// 消息投递
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), ActionError>;
}

/// 仅记录日志的投递实现
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: Message) -> Result<(), ActionError> {
        let message_id = Uuid::now_v7();
        info!(
            channel = %message.channel,
            to = %message.to,
            subject = message.subject.as_deref().unwrap_or(""),
            message_id = %message_id,
            body = %message.body,
            "模拟发送通知"
        );
        Ok(())
    }
}

/// `sendEmail` 动作
pub struct SendEmailAction {
    notifier: Arc<dyn Notifier>,
}

impl SendEmailAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ActionHandler for SendEmailAction {
    async fn execute(&self, _ctx: &EvalContext, params: &Parameters) -> Result<(), ActionError> {
        let message = Message {
            channel: Channel::Email,
            to: required_str(params, "to")?.to_string(),
            subject: Some(required_str(params, "subject")?.to_string()),
            body: required_str(params, "body")?.to_string(),
        };
        self.notifier.send(message).await
    }
}

/// `sendSms` 动作
pub struct SendSmsAction {
    notifier: Arc<dyn Notifier>,
}

impl SendSmsAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ActionHandler for SendSmsAction {
    async fn execute(&self, _ctx: &EvalContext, params: &Parameters) -> Result<(), ActionError> {
        let message = Message {
            channel: Channel::Sms,
            to: required_str(params, "to")?.to_string(),
            subject: None,
            body: required_str(params, "message")?.to_string(),
        };
        self.notifier.send(message).await
    }
}
