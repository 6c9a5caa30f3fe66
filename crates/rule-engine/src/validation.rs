//! 规则校验
//!
//! 两层检查：结构检查对照元数据目录（必填、类型、可选值、事实路径、模板语法），
//! 注册表检查确认触发器、操作符与动作都已注册。每个出错字段只报告一次，
//! 顺序与规则中字段出现的顺序一致。

use std::str::FromStr;

use cron::Schedule;
use serde::Serialize;
use serde_json::Value;

use crate::facts::FactPath;
use crate::facts::coerce::{to_bool, to_datetime, to_f64, type_name};
use crate::metadata::{CapabilityMetadata, Catalog, ParameterMetadata, ParameterType};
use crate::models::{Parameters, Rule};
use crate::registry::Registry;
use crate::template::{TemplateRenderer, has_template};

const SCHEDULE_TRIGGER: &str = "schedule";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    Required,
    Empty,
    TypeMismatch,
    InvalidOption,
    InvalidValue,
    MalformedFact,
    InvalidTemplate,
    UnknownTrigger,
    UnknownOperator,
    UnknownAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// 字段路径，如 `conditions[0].operator`、`actions[1].parameters.to`
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Clone, Copy)]
struct Layers {
    structure: bool,
    registry: bool,
}

/// 规则校验器，只读取目录与注册表，不修改任何状态
pub struct RuleValidator<'a> {
    catalog: &'a Catalog,
    registry: &'a Registry,
}

impl<'a> RuleValidator<'a> {
    /// 使用内置元数据目录
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_catalog(Catalog::builtin(), registry)
    }

    pub fn with_catalog(catalog: &'a Catalog, registry: &'a Registry) -> Self {
        Self { catalog, registry }
    }

    /// 执行两层校验
    pub fn validate(&self, rule: &Rule) -> ValidationResult {
        self.run(rule, Layers { structure: true, registry: true })
    }

    pub fn validate_structure(&self, rule: &Rule) -> ValidationResult {
        self.run(rule, Layers { structure: true, registry: false })
    }

    pub fn validate_against_registry(&self, rule: &Rule) -> ValidationResult {
        self.run(rule, Layers { structure: false, registry: true })
    }

    fn run(&self, rule: &Rule, layers: Layers) -> ValidationResult {
        let mut errors = Vec::new();

        if layers.structure && rule.name.trim().is_empty() {
            errors.push(FieldError::new("name", FieldErrorKind::Empty, "规则名称不能为空"));
        }

        self.check_trigger(rule, layers, &mut errors);

        for (i, condition) in rule.conditions.iter().enumerate() {
            let prefix = format!("conditions[{}]", i);

            if layers.structure {
                if condition.fact.trim().is_empty() {
                    errors.push(FieldError::new(
                        format!("{}.fact", prefix),
                        FieldErrorKind::Empty,
                        "事实路径不能为空",
                    ));
                } else if let Err(e) = FactPath::parse(&condition.fact) {
                    errors.push(FieldError::new(
                        format!("{}.fact", prefix),
                        FieldErrorKind::MalformedFact,
                        e.to_string(),
                    ));
                }
            }

            let operator = condition.operator.trim();
            if operator.is_empty() {
                if layers.structure {
                    errors.push(FieldError::new(
                        format!("{}.operator", prefix),
                        FieldErrorKind::Empty,
                        "操作符不能为空",
                    ));
                }
            } else if layers.registry && !self.registry.has_operator(operator) {
                errors.push(FieldError::new(
                    format!("{}.operator", prefix),
                    FieldErrorKind::UnknownOperator,
                    format!("未注册的操作符: {}", operator),
                ));
            } else if layers.structure {
                if let Some(message) = check_operand(operator, &condition.value) {
                    errors.push(FieldError::new(
                        format!("{}.value", prefix),
                        FieldErrorKind::InvalidValue,
                        message,
                    ));
                }
            }
        }

        for (i, action) in rule.actions.iter().enumerate() {
            let prefix = format!("actions[{}]", i);
            let action_type = action.action_type.trim();

            if action_type.is_empty() {
                if layers.structure {
                    errors.push(FieldError::new(
                        format!("{}.type", prefix),
                        FieldErrorKind::Empty,
                        "动作类型不能为空",
                    ));
                }
                continue;
            }
            if layers.registry && !self.registry.has_action(action_type) {
                errors.push(FieldError::new(
                    format!("{}.type", prefix),
                    FieldErrorKind::UnknownAction,
                    format!("未注册的动作类型: {}", action_type),
                ));
                continue;
            }
            if layers.structure {
                let metadata = self.catalog.action(action_type);
                check_parameters(metadata, &action.parameters, &prefix, true, &mut errors);
            }
        }

        ValidationResult::from_errors(errors)
    }

    fn check_trigger(&self, rule: &Rule, layers: Layers, errors: &mut Vec<FieldError>) {
        let trigger_type = rule.trigger_type().trim();
        if trigger_type.is_empty() {
            if layers.structure {
                errors.push(FieldError::new(
                    "trigger.type",
                    FieldErrorKind::Empty,
                    "触发器类型不能为空",
                ));
            }
            return;
        }
        if layers.registry && !self.registry.has_trigger(trigger_type) {
            errors.push(FieldError::new(
                "trigger.type",
                FieldErrorKind::UnknownTrigger,
                format!("未注册的触发器类型: {}", trigger_type),
            ));
            return;
        }
        if layers.structure {
            let metadata = self.catalog.trigger(trigger_type);
            check_parameters(metadata, &rule.trigger.parameters, "trigger", false, errors);
            if trigger_type.eq_ignore_ascii_case(SCHEDULE_TRIGGER) {
                check_schedule(&rule.trigger.parameters, errors);
            }
        }
    }
}

/// 定时触发器需要 `frequency` 或 `cron` 之一，`cron` 必须能被解析
fn check_schedule(params: &Parameters, errors: &mut Vec<FieldError>) {
    let present = |name: &str| params.get(name).is_some_and(|v| !is_blank(v));

    if !present("frequency") && !present("cron") {
        errors.push(FieldError::new(
            "trigger.parameters.frequency",
            FieldErrorKind::Required,
            "定时触发器需要 frequency 或 cron 参数",
        ));
        return;
    }

    if let Some(Value::String(expression)) = params.get("cron").filter(|v| !is_blank(v)) {
        if let Err(e) = Schedule::from_str(expression.trim()) {
            errors.push(FieldError::new(
                "trigger.parameters.cron",
                FieldErrorKind::InvalidValue,
                format!("无效的 cron 表达式 '{}': {}", expression, e),
            ));
        }
    }
}

/// 按元数据检查参数；没有元数据的能力（自定义注册）只检查模板语法
fn check_parameters(
    metadata: Option<&CapabilityMetadata>,
    params: &Parameters,
    prefix: &str,
    templated: bool,
    errors: &mut Vec<FieldError>,
) {
    let field = |name: &str| format!("{}.parameters.{}", prefix, name);

    if let Some(metadata) = metadata {
        for param in &metadata.parameters {
            let value = params.get(&param.name).filter(|v| !is_blank(v));
            match value {
                None if param.required => errors.push(FieldError::new(
                    field(&param.name),
                    FieldErrorKind::Required,
                    format!("缺少必填参数: {}", param.name),
                )),
                None => {}
                Some(Value::String(s)) if templated && has_template(s) => {
                    if let Err(e) = TemplateRenderer::check(s) {
                        errors.push(FieldError::new(
                            field(&param.name),
                            FieldErrorKind::InvalidTemplate,
                            e.to_string(),
                        ));
                    }
                }
                Some(value) => {
                    if let Some(e) = check_type(param, value, &field(&param.name)) {
                        errors.push(e);
                    } else if templated {
                        check_nested_templates(value, &field(&param.name), errors);
                    }
                }
            }
        }
    }

    if templated {
        let known = |name: &str| {
            metadata.is_some_and(|m| m.parameters.iter().any(|p| p.name == name))
        };
        for (name, value) in params {
            if !known(name) {
                check_nested_templates(value, &field(name), errors);
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_type(param: &ParameterMetadata, value: &Value, field: &str) -> Option<FieldError> {
    let mismatch = || {
        Some(FieldError::new(
            field,
            FieldErrorKind::TypeMismatch,
            format!(
                "参数 {} 应为 {}，实际为 {}",
                param.name,
                param.param_type.as_str(),
                type_name(value)
            ),
        ))
    };

    let matches = match param.param_type {
        ParameterType::String => value.is_string(),
        ParameterType::Number => to_f64(value).is_some(),
        ParameterType::Boolean => {
            value.is_boolean() || (value.is_string() && to_bool(value).is_some())
        }
        ParameterType::Date => to_datetime(value).is_some(),
        ParameterType::Object => value.is_object(),
        ParameterType::Array => match value {
            Value::Array(items) => return check_options(param, items.iter(), field),
            _ => false,
        },
        ParameterType::Enum => match value {
            Value::String(_) => return check_options(param, std::iter::once(value), field),
            _ => false,
        },
    };

    if matches { None } else { mismatch() }
}

fn check_options<'v>(
    param: &ParameterMetadata,
    mut values: impl Iterator<Item = &'v Value>,
    field: &str,
) -> Option<FieldError> {
    let options = param.options.as_deref()?;
    let invalid = values.find(|value| {
        !value
            .as_str()
            .is_some_and(|s| options.iter().any(|o| o.eq_ignore_ascii_case(s.trim())))
    })?;

    Some(FieldError::new(
        field,
        FieldErrorKind::InvalidOption,
        format!(
            "参数 {} 的值 {} 不在可选范围 [{}] 内",
            param.name,
            invalid,
            options.join(", ")
        ),
    ))
}

/// 递归检查嵌套值中的模板语法，每个字段只报告第一处错误
fn check_nested_templates(value: &Value, field: &str, errors: &mut Vec<FieldError>) {
    match value {
        Value::String(s) if has_template(s) => {
            if let Err(e) = TemplateRenderer::check(s) {
                errors.push(FieldError::new(field, FieldErrorKind::InvalidTemplate, e.to_string()));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_nested_templates(item, &format!("{}[{}]", field, i), errors);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                check_nested_templates(item, &format!("{}.{}", field, key), errors);
            }
        }
        _ => {}
    }
}

/// 操作数形状检查
fn check_operand(operator: &str, value: &Value) -> Option<String> {
    match operator {
        "between" => match value {
            Value::Array(items) if items.len() == 2 => None,
            Value::Array(items) => Some(format!(
                "between 需要 [min, max] 数组，当前有 {} 个元素",
                items.len()
            )),
            _ => Some("between 需要 [min, max] 数组".to_string()),
        },
        "matches" => match value.as_str() {
            Some(pattern) => regex::Regex::new(pattern)
                .err()
                .map(|e| format!("正则表达式无效: {}", e)),
            None => Some("matches 需要字符串形式的正则表达式".to_string()),
        },
        _ => None,
    }
}
