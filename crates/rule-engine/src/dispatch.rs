//! 外部事件分发
//!
//! 业务系统在实体写入后调用 [`dispatch_event`]：加载该触发器类型下的已启用规则，
//! 用同一个上下文依次评估。此路径不调用触发器处理器。

use roster_shared::observability::metrics;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::engine::{Engine, RunReport};
use crate::error::{MultiError, Result};
use crate::models::{EvalContext, Rule};
use crate::store::RuleStore;

/// 分发事件并在出现任何错误时返回聚合错误
pub async fn dispatch_event(
    engine: &Engine,
    store: &dyn RuleStore,
    trigger_type: &str,
    data: Map<String, Value>,
) -> Result<RunReport> {
    let (report, errors) = dispatch_event_with_report(engine, store, trigger_type, data).await;
    errors.into_result().map(|_| report)
}

/// 分发事件，返回统计与全部错误
#[instrument(skip(engine, store, data))]
pub async fn dispatch_event_with_report(
    engine: &Engine,
    store: &dyn RuleStore,
    trigger_type: &str,
    data: Map<String, Value>,
) -> (RunReport, MultiError) {
    let mut report = RunReport::default();
    let mut errors = MultiError::new();

    let rules = match store.list_by_trigger(trigger_type).await {
        Ok(rules) => rules,
        Err(e) => {
            errors.push(e.into());
            return (report, errors);
        }
    };
    metrics::record_dispatch(trigger_type, rules.len());

    let ctx = EvalContext::new(data);
    let operation = ctx
        .lookup("trigger.operation")
        .and_then(Value::as_str)
        .map(str::to_string);

    for doc in &rules {
        if let Some(op) = operation.as_deref() {
            if !accepts_operation(&doc.spec, op) {
                debug!(rule = %doc.name, operation = op, "规则不响应该操作，跳过");
                report.skipped += 1;
                continue;
            }
        }

        if let Err(e) = engine.evaluate(&doc.spec, &ctx, &mut report, &mut errors).await {
            errors.push(e);
            break;
        }
    }

    info!(
        rules = rules.len(),
        evaluated = report.evaluated,
        matched = report.matched,
        skipped = report.skipped,
        errors = errors.len(),
        "事件分发完成"
    );
    (report, errors)
}

/// 规则触发参数 `operations` 为空或缺省时响应所有操作
fn accepts_operation(rule: &Rule, operation: &str) -> bool {
    match rule.trigger.parameters.get("operations") {
        Some(Value::Array(ops)) if !ops.is_empty() => ops
            .iter()
            .filter_map(Value::as_str)
            .any(|op| op.eq_ignore_ascii_case(operation)),
        Some(Value::String(op)) if !op.trim().is_empty() => op
            .split(',')
            .any(|op| op.trim().eq_ignore_ascii_case(operation)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::LogAction;
    use crate::engine::EngineOptions;
    use crate::error::{EngineError, OperatorError, StoreError};
    use crate::facts::{ContextResolver, EmployeeResolver};
    use crate::models::{ActionSpec, Condition, TriggerSpec};
    use crate::operators::operator;
    use crate::registry::Registry;
    use crate::store::{MemoryRuleStore, MockRuleStore};
    use roster_shared::test_utils::TestDataGenerator;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Registry {
        Registry::new()
            .use_fact_resolver(EmployeeResolver)
            .use_fact_resolver(ContextResolver)
            .use_action("log", LogAction)
            .use_operator(
                "strict",
                operator(|_, _| Err(OperatorError::InvalidOperand("总是失败".to_string()))),
            )
    }

    fn active_rule(name: &str) -> Rule {
        Rule::new(name, TriggerSpec::new("employee"))
            .with_condition(Condition::new("employee.EmployeeStatus", "equals", "Active"))
            .with_action(
                ActionSpec::new("log").with_parameter("message", "{{.employee.EmployeeNumber}}"),
            )
    }

    fn payload(operation: &str) -> Map<String, Value> {
        TestDataGenerator::employee_event(operation)
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_evaluates_only_enabled_rules() {
        let engine = Engine::new(Arc::new(registry()));
        let store = MemoryRuleStore::new();
        store.create(&active_rule("a")).await.unwrap();
        let b = store.create(&active_rule("b")).await.unwrap();
        store.create(&Rule::new("other", TriggerSpec::new("competency"))).await.unwrap();
        store.set_enabled(&b.id, false).await.unwrap();

        let report = dispatch_event(&engine, &store, "employee", payload("update"))
            .await
            .unwrap();

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.actions_executed, 1);
    }

    #[tokio::test]
    async fn test_dispatch_skips_rules_for_other_operations() {
        let engine = Engine::new(Arc::new(registry()));
        let store = MemoryRuleStore::new();
        let mut on_create = active_rule("on-create");
        on_create.trigger =
            TriggerSpec::new("employee").with_parameter("operations", json!(["create"]));
        store.create(&on_create).await.unwrap();
        store.create(&active_rule("any")).await.unwrap();

        let report = dispatch_event(&engine, &store, "employee", payload("update"))
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.evaluated, 1);

        let report = dispatch_event(&engine, &store, "employee", payload("create"))
            .await
            .unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.evaluated, 2);
    }

    #[tokio::test]
    async fn test_dispatch_without_rules() {
        let engine = Engine::new(Arc::new(registry()));
        let report = dispatch_event(&engine, &MemoryRuleStore::new(), "employee", Map::new())
            .await
            .unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[tokio::test]
    async fn test_dispatch_store_failure() {
        let engine = Engine::new(Arc::new(registry()));
        let mut store = MockRuleStore::new();
        store
            .expect_list_by_trigger()
            .returning(|_| Err(StoreError::NotFound("employee".to_string())));

        let result = dispatch_event(&engine, &store, "employee", Map::new()).await;
        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_dispatch_condition_error_policy() {
        let store = MemoryRuleStore::new();
        let failing = Rule::new("failing", TriggerSpec::new("employee"))
            .with_condition(Condition::new("employee.EmployeeStatus", "strict", 1));
        store.create(&failing).await.unwrap();
        store.create(&active_rule("ok")).await.unwrap();

        let lenient = Engine::new(Arc::new(registry()));
        let (report, errors) =
            dispatch_event_with_report(&lenient, &store, "employee", payload("update")).await;
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.matched, 1);
        assert_eq!(errors.len(), 1);

        let strict = Engine::with_options(
            Arc::new(registry()),
            EngineOptions {
                stop_on_condition_error: true,
                ..EngineOptions::default()
            },
        );
        let (report, errors) =
            dispatch_event_with_report(&strict, &store, "employee", payload("update")).await;
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.matched, 0);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_accepts_operation_forms() {
        let rule = |ops: Value| {
            Rule::new("r", TriggerSpec::new("employee").with_parameter("operations", ops))
        };
        assert!(accepts_operation(&rule(json!(["create", "Update"])), "update"));
        assert!(!accepts_operation(&rule(json!(["create"])), "delete"));
        assert!(accepts_operation(&rule(json!("create, delete")), "delete"));
        assert!(accepts_operation(&rule(json!([])), "delete"));
        assert!(accepts_operation(&Rule::new("r", TriggerSpec::new("employee")), "delete"));
    }
}
