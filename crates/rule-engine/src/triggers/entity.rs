//! 领域实体来源与生命周期触发器

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::{ContextSink, TriggerHandler, trigger_context};
use crate::error::{EngineError, Result};
use crate::models::Parameters;

/// 领域实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Employee,
    Competency,
    ScheduledEvent,
    JobPosition,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        Self::Employee,
        Self::Competency,
        Self::ScheduledEvent,
        Self::JobPosition,
    ];

    /// 上下文键名，也是生命周期触发器的类型名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Competency => "competency",
            Self::ScheduledEvent => "scheduledEvent",
            Self::JobPosition => "jobPosition",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::Trigger {
                trigger_type: "entity".to_string(),
                message: format!("未知的实体类型: {}", s),
            })
    }
}

/// 领域实体来源
///
/// 人事数据的持久化不在本服务内，触发器通过该 trait 读取实体列表。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>>;
}

/// 内存实体来源
#[derive(Default)]
pub struct MemoryEntitySource {
    entities: DashMap<EntityKind, Vec<Value>>,
}

impl MemoryEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, entity: Value) {
        self.entities.entry(kind).or_default().push(entity);
    }

    pub fn with(self, kind: EntityKind, entities: impl IntoIterator<Item = Value>) -> Self {
        self.entities.entry(kind).or_default().extend(entities);
        self
    }
}

#[async_trait]
impl EntitySource for MemoryEntitySource {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>> {
        Ok(self
            .entities
            .get(&kind)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// 生命周期触发器
///
/// 正常情况下由增删改事件经分发器驱动；直接触发时对该类型的全部实体做一次扫描，
/// 每个实体产生一个 `operation = "sweep"` 的上下文。
pub struct LifecycleTrigger {
    kind: EntityKind,
    source: Arc<dyn EntitySource>,
}

impl LifecycleTrigger {
    pub fn new(kind: EntityKind, source: Arc<dyn EntitySource>) -> Self {
        Self { kind, source }
    }
}

#[async_trait]
impl TriggerHandler for LifecycleTrigger {
    async fn fire(&self, _params: &Parameters, sink: &mut dyn ContextSink) -> Result<()> {
        let now = Utc::now();
        let entities = self.source.list(self.kind).await?;
        debug!(entity = %self.kind, count = entities.len(), "生命周期触发器扫描实体");

        for entity in entities {
            let ctx = trigger_context(now, self.kind.as_str(), "sweep", Some((self.kind, entity)));
            sink.emit(ctx).await?;
        }
        Ok(())
    }
}
