//! 定时触发器

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use serde_json::Value;

use super::entity::{EntityKind, EntitySource};
use super::{ContextSink, TriggerHandler, trigger_context};
use crate::error::{EngineError, Result};
use crate::models::Parameters;

const TRIGGER_TYPE: &str = "schedule";

/// 预置执行频率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [Self::Hourly, Self::Daily, Self::Weekly, Self::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// 对应的 cron 表达式（秒 分 时 日 月 周）
    pub fn cron_expression(&self) -> &'static str {
        match self {
            Self::Hourly => "0 0 * * * *",
            Self::Daily => "0 0 0 * * *",
            Self::Weekly => "0 0 0 * * Mon",
            Self::Monthly => "0 0 0 1 * *",
        }
    }
}

impl FromStr for Frequency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| trigger_error(format!("未知的执行频率: {}", s)))
    }
}

fn trigger_error(message: String) -> EngineError {
    EngineError::Trigger {
        trigger_type: TRIGGER_TYPE.to_string(),
        message,
    }
}

fn string_param<'a>(params: &'a Parameters, name: &str) -> Result<Option<&'a str>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(trigger_error(format!("参数 {} 必须是字符串", name))),
    }
}

/// 从触发器参数得到调度计划；`cron` 优先于 `frequency`
pub fn schedule_for(params: &Parameters) -> Result<Schedule> {
    let expression = match string_param(params, "cron")? {
        Some(cron) => cron,
        None => {
            let frequency = string_param(params, "frequency")?
                .ok_or_else(|| trigger_error("缺少 frequency 或 cron 参数".to_string()))?;
            Frequency::from_str(frequency)?.cron_expression()
        }
    };

    Schedule::from_str(expression)
        .map_err(|e| trigger_error(format!("无效的 cron 表达式 '{}': {}", expression, e)))
}

/// `schedule` 触发器
///
/// 未指定 `entity` 时产生一个空上下文；指定时按实体逐个产生上下文，
/// `activeOnly` 为真时只保留在职员工。
pub struct ScheduleTrigger {
    source: Arc<dyn EntitySource>,
}

impl ScheduleTrigger {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self { source }
    }

    fn is_active(entity: &Value) -> bool {
        entity
            .as_object()
            .and_then(|map| crate::facts::path::get_key(map, "EmployeeStatus"))
            .and_then(Value::as_str)
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("active"))
    }
}

#[async_trait]
impl TriggerHandler for ScheduleTrigger {
    async fn fire(&self, params: &Parameters, sink: &mut dyn ContextSink) -> Result<()> {
        let now = Utc::now();

        let Some(entity) = string_param(params, "entity")? else {
            return sink.emit(trigger_context(now, TRIGGER_TYPE, TRIGGER_TYPE, None)).await;
        };

        let kind = EntityKind::from_str(entity)?;
        let active_only = params
            .get("activeOnly")
            .and_then(crate::facts::coerce::to_bool)
            .unwrap_or(false);

        for value in self.source.list(kind).await? {
            if active_only && kind == EntityKind::Employee && !Self::is_active(&value) {
                continue;
            }
            sink.emit(trigger_context(now, TRIGGER_TYPE, TRIGGER_TYPE, Some((kind, value))))
                .await?;
        }
        Ok(())
    }
}
