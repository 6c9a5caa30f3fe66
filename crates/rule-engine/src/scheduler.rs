//! 定时规则调度
//!
//! 轮询已启用的 `schedule` 规则，若规则的计划在 `(上次检查, 本次检查]` 区间内有触发点，
//! 就通过规则自身的触发器运行一次。单条规则出错只记录日志，不影响循环。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use roster_shared::observability::metrics;
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::error::Result;
use crate::store::RuleStore;
use crate::triggers::schedule_for;

const TRIGGER_TYPE: &str = "schedule";

pub struct ScheduleRunner {
    engine: Arc<Engine>,
    store: Arc<dyn RuleStore>,
    poll_interval: Duration,
    last_tick: Mutex<DateTime<Utc>>,
}

/// 计划在 `(since, now]` 内是否有触发点
pub fn is_due(schedule: &Schedule, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    schedule.after(&since).next().is_some_and(|next| next <= now)
}

impl ScheduleRunner {
    pub fn new(engine: Arc<Engine>, store: Arc<dyn RuleStore>, poll_interval: Duration) -> Self {
        Self {
            engine,
            store,
            poll_interval,
            last_tick: Mutex::new(Utc::now()),
        }
    }

    /// 指定首次检查区间的起点
    pub fn starting_at(self, at: DateTime<Utc>) -> Self {
        *self.last_tick.lock() = at;
        self
    }

    pub fn last_tick(&self) -> DateTime<Utc> {
        *self.last_tick.lock()
    }

    /// 主循环：持续检查直到进程退出
    pub async fn run(&self) {
        info!(poll_interval = ?self.poll_interval, "定时规则调度已启动");
        loop {
            tokio::time::sleep(self.poll_interval).await;

            if let Err(e) = self.tick(Utc::now()).await {
                error!(error = %e, "定时规则检查出错");
            }
        }
    }

    /// 执行一次检查，返回被运行的规则数
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let since = self.last_tick();
        let rules = self.store.list_by_trigger(TRIGGER_TYPE).await?;
        let mut due = 0;

        for doc in &rules {
            let schedule = match schedule_for(&doc.spec.trigger.parameters) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!(rule = %doc.name, error = %e, "定时规则的计划无效，跳过");
                    continue;
                }
            };
            if !is_due(&schedule, since, now) {
                continue;
            }

            due += 1;
            let (report, errors) = self.engine.run_rule_with_report(&doc.spec).await;
            if errors.is_empty() {
                debug!(rule = %doc.name, matched = report.matched, "定时规则已运行");
            } else {
                error!(rule = %doc.name, error = %errors, "定时规则运行出错");
            }
        }

        *self.last_tick.lock() = now;
        metrics::record_schedule_tick(due);
        if due > 0 {
            info!(due, "定时规则检查完成");
        }
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionHandler;
    use crate::error::{ActionError, StoreError};
    use crate::models::{ActionSpec, EvalContext, Parameters, Rule, TriggerSpec};
    use crate::registry::Registry;
    use crate::store::{MemoryRuleStore, MockRuleStore};
    use crate::triggers::{MemoryEntitySource, ScheduleTrigger};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl ActionHandler for Counter {
        async fn execute(
            &self,
            _ctx: &EvalContext,
            _params: &Parameters,
        ) -> std::result::Result<(), ActionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn engine(counter: &Counter) -> Arc<Engine> {
        let registry = Registry::new()
            .use_trigger("schedule", ScheduleTrigger::new(Arc::new(MemoryEntitySource::new())))
            .use_action("count", counter.clone());
        Arc::new(Engine::new(Arc::new(registry)))
    }

    fn scheduled(name: &str, params: serde_json::Value) -> Rule {
        let mut trigger = TriggerSpec::new("schedule");
        trigger.parameters = params.as_object().cloned().unwrap();
        Rule::new(name, trigger).with_action(ActionSpec::new("count"))
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_is_due_window() {
        let hourly = Schedule::from_str("0 0 * * * *").unwrap();
        assert!(is_due(&hourly, at(9, 59), at(10, 0)));
        assert!(!is_due(&hourly, at(10, 0), at(10, 30)));
        assert!(is_due(&hourly, at(10, 0), at(11, 5)));
    }

    #[tokio::test]
    async fn test_tick_runs_due_rules_once() {
        let counter = Counter::default();
        let store = Arc::new(MemoryRuleStore::new());
        store
            .create(&scheduled("every-minute", serde_json::json!({ "cron": "0 * * * * *" })))
            .await
            .unwrap();
        store
            .create(&scheduled("monthly", serde_json::json!({ "frequency": "monthly" })))
            .await
            .unwrap();
        store
            .create(&scheduled("broken", serde_json::json!({ "cron": "whenever" })))
            .await
            .unwrap();

        let runner = ScheduleRunner::new(engine(&counter), store, Duration::from_secs(60))
            .starting_at(at(10, 0));

        assert_eq!(runner.tick(at(10, 5)).await.unwrap(), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(runner.last_tick(), at(10, 5));

        // 同一时刻再次检查不会重复运行
        assert_eq!(runner.tick(at(10, 5)).await.unwrap(), 0);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_store_error_keeps_window() {
        let counter = Counter::default();
        let mut store = MockRuleStore::new();
        store
            .expect_list_by_trigger()
            .returning(|_| Err(StoreError::NotFound("schedule".to_string())));

        let runner = ScheduleRunner::new(engine(&counter), Arc::new(store), Duration::from_secs(60))
            .starting_at(at(10, 0));

        assert!(runner.tick(at(10, 5)).await.is_err());
        assert_eq!(runner.last_tick(), at(10, 0));
    }
}
