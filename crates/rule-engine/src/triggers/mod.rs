//! 触发器
//!
//! 触发器在被调用时产生零到多个评估上下文，通过 [`ContextSink`] 逐个交给引擎。
//! 事件驱动的规则不走这里，而是由分发器直接用事件载荷构建上下文。

pub mod entity;
pub mod manual;
pub mod schedule;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::{EvalContext, Parameters};

pub use entity::{EntityKind, EntitySource, LifecycleTrigger, MemoryEntitySource};
pub use manual::ManualTrigger;
pub use schedule::{Frequency, ScheduleTrigger, schedule_for};

/// 上下文接收端
///
/// 实现方负责立即评估收到的上下文。评估错误通常在内部记录；
/// 只有需要中止整个运行时才返回 Err。
#[async_trait]
pub trait ContextSink: Send {
    async fn emit(&mut self, ctx: EvalContext) -> Result<()>;
}

/// 触发器处理器
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn fire(&self, params: &Parameters, sink: &mut dyn ContextSink) -> Result<()>;
}

/// 收集全部上下文的接收端
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CollectingSink {
    pub contexts: Vec<EvalContext>,
}

#[cfg(test)]
#[async_trait]
impl ContextSink for CollectingSink {
    async fn emit(&mut self, ctx: EvalContext) -> Result<()> {
        self.contexts.push(ctx);
        Ok(())
    }
}

/// 构建携带触发器元数据的上下文
pub(crate) fn trigger_context(
    now: DateTime<Utc>,
    trigger_type: &str,
    operation: &str,
    entity: Option<(EntityKind, Value)>,
) -> EvalContext {
    let mut ctx = EvalContext::default().at(now).with_trigger(trigger_type, operation);
    if let Some((kind, value)) = entity {
        if let Some(Value::Object(meta)) = ctx.data.get_mut("trigger") {
            meta.insert("entityType".to_string(), Value::from(kind.as_str()));
        }
        ctx.data.insert(kind.as_str().to_string(), value);
    }
    ctx
}
