//! 内置能力装配

use std::sync::Arc;
use std::time::Duration;

use crate::actions::{
    LogAction, LogNotifier, Notifier, SendEmailAction, SendSmsAction, WebhookAction,
};
use crate::facts::{
    CompetencyResolver, ContextResolver, EmployeeResolver, JobPositionResolver,
    ScheduledEventResolver,
};
use crate::registry::Registry;
use crate::triggers::{
    EntityKind, EntitySource, LifecycleTrigger, ManualTrigger, MemoryEntitySource,
    ScheduleTrigger,
};

/// 内置能力的外部协作者
#[derive(Clone)]
pub struct BuiltinDeps {
    pub notifier: Arc<dyn Notifier>,
    pub entities: Arc<dyn EntitySource>,
    pub http: reqwest::Client,
}

impl BuiltinDeps {
    /// 日志通知 + 内存实体源
    pub fn local() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            entities: Arc::new(MemoryEntitySource::new()),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

/// 注册全部内置触发器、事实解析器、操作符与动作
pub fn default_registry(deps: BuiltinDeps) -> Registry {
    let mut registry = Registry::new()
        .use_trigger("manual", ManualTrigger)
        .use_trigger("schedule", ScheduleTrigger::new(deps.entities.clone()));

    for kind in EntityKind::ALL {
        registry = registry.use_trigger(
            kind.as_str(),
            LifecycleTrigger::new(kind, deps.entities.clone()),
        );
    }

    registry
        .use_fact_resolver(EmployeeResolver)
        .use_fact_resolver(CompetencyResolver)
        .use_fact_resolver(JobPositionResolver)
        .use_fact_resolver(ScheduledEventResolver)
        // 通用路径兜底，必须最后注册
        .use_fact_resolver(ContextResolver)
        .use_action("log", LogAction)
        .use_action("sendEmail", SendEmailAction::new(deps.notifier.clone()))
        .use_action("sendSms", SendSmsAction::new(deps.notifier))
        .use_action("webhook", WebhookAction::new(deps.http))
}
