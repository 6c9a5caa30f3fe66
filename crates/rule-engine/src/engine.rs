//! 规则评估引擎
//!
//! 对单条规则与单个上下文：按顺序评估条件（短路），全部通过后渲染参数并执行动作。
//! 同一次运行内的规则与上下文按顺序处理，不做并发扇出。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use roster_shared::observability::metrics;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{EngineError, MultiError, Result};
use crate::facts::{FactPath, Resolution};
use crate::models::{ActionSpec, Condition, EvalContext, Rule};
use crate::registry::Registry;
use crate::template::{MissingKeyPolicy, TemplateRenderer};
use crate::triggers::ContextSink;

/// 失败策略，作用于整个引擎实例
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// 条件评估出错时中止整个运行；否则记录错误并视该规则为不匹配
    pub stop_on_condition_error: bool,
    /// 某个动作失败后继续执行后续动作；否则在该规则的第一个失败处停止
    pub continue_on_action_error: bool,
    pub missing_key: MissingKeyPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            stop_on_condition_error: false,
            continue_on_action_error: true,
            missing_key: MissingKeyPolicy::Empty,
        }
    }
}

/// 一次运行（分发或手动执行）的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// 被评估的 (规则, 上下文) 组合数
    pub evaluated: usize,
    pub matched: usize,
    /// 成功执行的动作数
    pub actions_executed: usize,
    /// 因操作类型不匹配而跳过的规则数
    pub skipped: usize,
}

pub struct Engine {
    registry: Arc<Registry>,
    options: EngineOptions,
    renderer: TemplateRenderer,
}

impl Engine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, EngineOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, options: EngineOptions) -> Self {
        Self {
            registry,
            options,
            renderer: TemplateRenderer::new(options.missing_key),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// 解析事实
    ///
    /// 依次询问已注册的解析器，第一个认领的解析器决定结果；
    /// 无人认领或认领但缺值都返回 `None`。
    pub fn resolve_fact(&self, ctx: &EvalContext, fact: &str) -> Result<Option<Value>> {
        let path = FactPath::parse(fact)?;
        for resolver in self.registry.fact_resolvers() {
            match resolver.resolve(ctx, &path)? {
                Resolution::Unhandled => continue,
                Resolution::Missing => return Ok(None),
                Resolution::Value(value) => return Ok(Some(value)),
            }
        }
        Ok(None)
    }

    /// 评估条件列表（与关系，短路）；空列表为真
    pub fn evaluate_conditions(&self, conditions: &[Condition], ctx: &EvalContext) -> Result<bool> {
        for condition in conditions {
            let Some(left) = self.resolve_fact(ctx, &condition.fact)? else {
                trace!(fact = %condition.fact, "事实无法解析，条件不成立");
                return Ok(false);
            };

            let op = self.registry.operator(&condition.operator)?;
            let passed = op(&left, &condition.value).map_err(|source| EngineError::Operator {
                operator: condition.operator.clone(),
                fact: condition.fact.clone(),
                source,
            })?;

            if !passed {
                trace!(fact = %condition.fact, operator = %condition.operator, "条件不成立");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 执行动作列表，返回成功执行的动作数
    ///
    /// 按策略聚合全部错误，或在第一个失败处停止。
    pub async fn execute_actions(
        &self,
        actions: &[ActionSpec],
        ctx: &EvalContext,
    ) -> Result<usize> {
        let mut errors = MultiError::new();
        let executed = self.run_actions(actions, ctx, &mut errors).await;
        errors.into_result().map(|_| executed)
    }

    async fn run_actions(
        &self,
        actions: &[ActionSpec],
        ctx: &EvalContext,
        errors: &mut MultiError,
    ) -> usize {
        let mut executed = 0;
        for action in actions {
            match self.execute_action(action, ctx).await {
                Ok(()) => {
                    metrics::record_action_execution(&action.action_type, "success");
                    executed += 1;
                }
                Err(e) => {
                    metrics::record_action_execution(&action.action_type, "failure");
                    warn!(action_type = %action.action_type, error = %e, "动作执行失败");
                    errors.push(e);
                    if !self.options.continue_on_action_error {
                        break;
                    }
                }
            }
        }
        executed
    }

    async fn execute_action(&self, action: &ActionSpec, ctx: &EvalContext) -> Result<()> {
        let handler = self.registry.action(&action.action_type)?;

        let params = self
            .renderer
            .render_params(&action.parameters, &ctx.data)
            .map_err(|source| EngineError::Template {
                action_type: action.action_type.clone(),
                source,
            })?;

        handler
            .execute(ctx, &params)
            .await
            .map_err(|source| EngineError::Action {
                action_type: action.action_type.clone(),
                source,
            })
    }

    /// 用一个上下文评估一条规则
    ///
    /// 错误按规则名包装后写入 `errors`；只有在需要中止整个运行时才返回 Err。
    pub async fn evaluate(
        &self,
        rule: &Rule,
        ctx: &EvalContext,
        report: &mut RunReport,
        errors: &mut MultiError,
    ) -> Result<()> {
        let start = Instant::now();
        report.evaluated += 1;

        let matched = match self.evaluate_conditions(&rule.conditions, ctx) {
            Ok(matched) => matched,
            Err(e) => {
                metrics::record_rule_evaluation(false, start.elapsed().as_secs_f64());
                let e = e.in_rule(&rule.name);
                if self.options.stop_on_condition_error {
                    return Err(e);
                }
                warn!(rule = %rule.name, error = %e, "条件评估失败，规则视为不匹配");
                errors.push(e);
                return Ok(());
            }
        };

        metrics::record_rule_evaluation(matched, start.elapsed().as_secs_f64());
        if !matched {
            debug!(rule = %rule.name, "规则未匹配");
            return Ok(());
        }

        report.matched += 1;
        debug!(rule = %rule.name, actions = rule.actions.len(), "规则匹配，执行动作");

        let mut action_errors = MultiError::new();
        report.actions_executed += self.run_actions(&rule.actions, ctx, &mut action_errors).await;
        for e in action_errors {
            errors.push(e.in_rule(&rule.name));
        }
        Ok(())
    }

    /// 通过规则自身的触发器运行规则
    pub async fn run_rule(&self, rule: &Rule) -> Result<RunReport> {
        let (report, errors) = self.run_rule_with_report(rule).await;
        errors.into_result().map(|_| report)
    }

    /// 运行规则并同时返回统计与全部错误
    #[instrument(
        skip(self, rule),
        fields(rule = %rule.name, trigger_type = %rule.trigger.trigger_type)
    )]
    pub async fn run_rule_with_report(&self, rule: &Rule) -> (RunReport, MultiError) {
        let mut sink = RuleSink {
            engine: self,
            rule,
            report: RunReport::default(),
            errors: MultiError::new(),
            aborted: false,
        };

        let handler = match self.registry.trigger(rule.trigger_type()) {
            Ok(handler) => handler,
            Err(e) => {
                sink.errors.push(e.in_rule(&rule.name));
                return (sink.report, sink.errors);
            }
        };

        if let Err(e) = handler.fire(&rule.trigger.parameters, &mut sink).await {
            let e = if sink.aborted { e } else { e.in_rule(&rule.name) };
            sink.errors.push(e);
        }

        info!(
            evaluated = sink.report.evaluated,
            matched = sink.report.matched,
            errors = sink.errors.len(),
            "规则运行完成"
        );
        (sink.report, sink.errors)
    }
}

/// 把触发器产生的上下文立即交给引擎评估
struct RuleSink<'a> {
    engine: &'a Engine,
    rule: &'a Rule,
    report: RunReport,
    errors: MultiError,
    aborted: bool,
}

#[async_trait]
impl ContextSink for RuleSink<'_> {
    async fn emit(&mut self, ctx: EvalContext) -> Result<()> {
        let result = self
            .engine
            .evaluate(self.rule, &ctx, &mut self.report, &mut self.errors)
            .await;
        self.aborted = result.is_err();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionHandler;
    use crate::error::{ActionError, OperatorError};
    use crate::facts::{ContextResolver, EmployeeResolver};
    use crate::models::{Parameters, TriggerSpec};
    use crate::operators::operator;
    use crate::triggers::{ManualTrigger, TriggerHandler};
    use parking_lot::Mutex;
    use serde_json::json;

    /// 记录每次调用参数的动作
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<(String, Parameters)>>>,
    }

    struct RecordingAction {
        name: &'static str,
        fail: bool,
        recorder: Recorder,
    }

    #[async_trait]
    impl ActionHandler for RecordingAction {
        async fn execute(
            &self,
            _ctx: &EvalContext,
            params: &Parameters,
        ) -> std::result::Result<(), ActionError> {
            self.recorder.calls.lock().push((self.name.to_string(), params.clone()));
            if self.fail {
                Err(ActionError::Downstream(format!("{} exploded", self.name)))
            } else {
                Ok(())
            }
        }
    }

    /// 每次触发产生三个上下文
    struct RepeatTrigger;

    #[async_trait]
    impl TriggerHandler for RepeatTrigger {
        async fn fire(&self, _params: &Parameters, sink: &mut dyn ContextSink) -> Result<()> {
            for i in 0..3 {
                sink.emit(EvalContext::from_value(json!({ "n": i }))).await?;
            }
            Ok(())
        }
    }

    fn registry(recorder: &Recorder) -> Registry {
        Registry::new()
            .use_trigger("manual", ManualTrigger)
            .use_trigger("repeat", RepeatTrigger)
            .use_fact_resolver(EmployeeResolver)
            .use_fact_resolver(ContextResolver)
            .use_action(
                "record",
                RecordingAction {
                    name: "record",
                    fail: false,
                    recorder: recorder.clone(),
                },
            )
            .use_action(
                "explode",
                RecordingAction {
                    name: "explode",
                    fail: true,
                    recorder: recorder.clone(),
                },
            )
            .use_operator(
                "strict",
                operator(|_, _| Err(OperatorError::InvalidOperand("always fails".to_string()))),
            )
    }

    fn engine(recorder: &Recorder, options: EngineOptions) -> Engine {
        Engine::with_options(Arc::new(registry(recorder)), options)
    }

    fn employee_ctx() -> EvalContext {
        EvalContext::from_value(json!({
            "employee": { "EmployeeStatus": "Active", "EmployeeNumber": "E-007" }
        }))
    }

    #[test]
    fn test_unresolvable_fact_is_false_not_error() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let conditions = vec![Condition::new("employee.Nickname", "equals", "Ace")];
        assert!(!engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap());
    }

    #[test]
    fn test_zero_conditions_is_true() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        assert!(engine.evaluate_conditions(&[], &EvalContext::default()).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_later_conditions() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        // 第二个条件使用未知操作符，但第一个条件为假，不应被评估
        let conditions = vec![
            Condition::new("employee.EmployeeStatus", "equals", "Terminated"),
            Condition::new("employee.EmployeeStatus", "~=", "x"),
        ];
        assert!(!engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap());
    }

    #[test]
    fn test_unknown_operator_is_error() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let conditions = vec![Condition::new("employee.EmployeeStatus", "~=", "Active")];
        let err = engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownOperator(ref name) if name == "~="));
    }

    #[test]
    fn test_malformed_fact_is_error() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let conditions = vec![Condition::new("employee.HasCompetency[]", "isTrue", true)];
        let err = engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_FACT");

        let conditions = vec![Condition::new("employee.HasCompetency", "isTrue", true)];
        let err = engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_FACT");
    }

    #[test]
    fn test_operator_error_names_condition() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let conditions = vec![Condition::new("employee.EmployeeStatus", "strict", 1)];
        let err = engine.evaluate_conditions(&conditions, &employee_ctx()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("strict"));
        assert!(message.contains("employee.EmployeeStatus"));
    }

    #[test]
    fn test_first_claiming_resolver_wins() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let ctx = EvalContext::from_value(json!({
            "employee": { "EmployeeStatus": "Active", "Active": "from-data" }
        }));
        // EmployeeResolver 先注册，派生值覆盖数据中的同名字段
        assert_eq!(engine.resolve_fact(&ctx, "employee.Active").unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_example_scenario_renders_template() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let rule = Rule::new("active", TriggerSpec::new("manual"))
            .with_condition(Condition::new("employee.EmployeeStatus", "equals", "Active"))
            .with_action(
                ActionSpec::new("record")
                    .with_parameter("message", "Employee {{.employee.EmployeeNumber}} is active"),
            );

        let mut report = RunReport::default();
        let mut errors = MultiError::new();
        engine
            .evaluate(&rule, &employee_ctx(), &mut report, &mut errors)
            .await
            .unwrap();

        assert!(errors.is_empty());
        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["message"], json!("Employee E-007 is active"));
        assert_eq!(report.matched, 1);
        assert_eq!(report.actions_executed, 1);
    }

    #[tokio::test]
    async fn test_continue_on_action_error_runs_all() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let actions = vec![ActionSpec::new("explode"), ActionSpec::new("record")];

        let err = engine
            .execute_actions(&actions, &EvalContext::default())
            .await
            .unwrap_err();

        let names: Vec<_> = recorder.calls.lock().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["explode", "record"]);
        assert!(err.to_string().contains("explode"));
        assert_eq!(err.code(), "ACTION_ERROR");
    }

    #[tokio::test]
    async fn test_stop_on_first_action_error() {
        let recorder = Recorder::default();
        let options = EngineOptions {
            continue_on_action_error: false,
            ..EngineOptions::default()
        };
        let engine = engine(&recorder, options);
        let actions = vec![ActionSpec::new("explode"), ActionSpec::new("record")];

        assert!(engine.execute_actions(&actions, &EvalContext::default()).await.is_err());
        assert_eq!(recorder.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_aggregate_in_order() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let actions = vec![
            ActionSpec::new("sendFax"),
            ActionSpec::new("record").with_parameter("x", "{{.broken"),
            ActionSpec::new("explode"),
        ];

        let err = engine
            .execute_actions(&actions, &EvalContext::default())
            .await
            .unwrap_err();

        let EngineError::Multiple(errors) = err else {
            panic!("expected aggregated error");
        };
        let codes: Vec<_> = errors.iter().map(EngineError::code).collect();
        assert_eq!(codes, vec!["UNKNOWN_ACTION", "TEMPLATE_ERROR", "ACTION_ERROR"]);
        // 模板错误的动作不会被调用
        assert_eq!(recorder.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_strict_templates_fail_action() {
        let recorder = Recorder::default();
        let options = EngineOptions {
            missing_key: MissingKeyPolicy::Error,
            ..EngineOptions::default()
        };
        let engine = engine(&recorder, options);
        let actions = vec![ActionSpec::new("record").with_parameter("to", "{{.employee.Email}}")];

        let err = engine.execute_actions(&actions, &employee_ctx()).await.unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_ERROR");
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_condition_error_recorded_by_default() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let rule = Rule::new("bad-op", TriggerSpec::new("manual"))
            .with_condition(Condition::new("employee.EmployeeStatus", "~=", "x"))
            .with_action(ActionSpec::new("record"));

        let mut report = RunReport::default();
        let mut errors = MultiError::new();
        engine
            .evaluate(&rule, &employee_ctx(), &mut report, &mut errors)
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(report.matched, 0);
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_condition_error_aborts_when_configured() {
        let recorder = Recorder::default();
        let options = EngineOptions {
            stop_on_condition_error: true,
            ..EngineOptions::default()
        };
        let engine = engine(&recorder, options);
        let rule = Rule::new("bad-op", TriggerSpec::new("repeat"))
            .with_condition(Condition::new("n", "strict", 0))
            .with_action(ActionSpec::new("record"));

        let (report, errors) = engine.run_rule_with_report(&rule).await;
        assert_eq!(report.evaluated, 1);
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().next().unwrap().to_string().contains("bad-op"));
    }

    #[tokio::test]
    async fn test_run_rule_evaluates_each_emitted_context() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let rule = Rule::new("repeat", TriggerSpec::new("repeat"))
            .with_condition(Condition::new("n", "greaterThan", 0))
            .with_action(ActionSpec::new("record").with_parameter("n", "{{.n}}"));

        let report = engine.run_rule(&rule).await.unwrap();

        assert_eq!(report.evaluated, 3);
        assert_eq!(report.matched, 2);
        let values: Vec<_> = recorder.calls.lock().iter().map(|(_, p)| p["n"].clone()).collect();
        assert_eq!(values, vec![json!("1"), json!("2")]);
    }

    #[tokio::test]
    async fn test_run_rule_accumulates_errors_across_contexts() {
        let recorder = Recorder::default();
        let engine = engine(&recorder, EngineOptions::default());
        let rule =
            Rule::new("boom", TriggerSpec::new("repeat")).with_action(ActionSpec::new("explode"));

        let err = engine.run_rule(&rule).await.unwrap_err();
        let EngineError::Multiple(errors) = err else {
            panic!("expected aggregated error");
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(recorder.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_run_rule_unknown_trigger() {
        let engine = engine(&Recorder::default(), EngineOptions::default());
        let rule = Rule::new("ghost", TriggerSpec::new("telepathy"));
        let err = engine.run_rule(&rule).await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_TRIGGER");
        assert!(err.to_string().contains("ghost"));
    }
}
