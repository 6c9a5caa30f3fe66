//! 规则引擎领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::facts::path;

/// 参数表（触发器与动作共用）
pub type Parameters = Map<String, Value>;

/// 规则定义
///
/// 规则在一次评估过程中不可变，修改只能经由规则存储完成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    /// 前端编辑器布局信息，引擎不解释
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_layout: Option<Value>,
}

impl Rule {
    pub fn new(name: impl Into<String>, trigger: TriggerSpec) -> Self {
        Self {
            name: name.into(),
            trigger,
            conditions: Vec::new(),
            actions: Vec::new(),
            ui_layout: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    /// 分发键
    pub fn trigger_type(&self) -> &str {
        &self.trigger.trigger_type
    }
}

/// 触发器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TriggerSpec {
    pub fn new(trigger_type: impl Into<String>) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// 条件：单个 事实/操作符/值 三元组，规则内所有条件为与关系
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub fact: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(
        fact: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            fact: fact.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// 动作配置
///
/// 参数中任意层级的字符串都会在执行前按模板渲染。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ActionSpec {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// 评估上下文 - 一次评估可见的全部事实与参考时间
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub now: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl EvalContext {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            now: Utc::now(),
            data,
        }
    }

    /// 从任意 JSON 构建；非对象载荷放在 `payload` 键下
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            Value::Null => Self::default(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                Self::new(map)
            }
        }
    }

    /// 固定参考时间（测试与定时重放使用）
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// 以序列化结果放入领域对象
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    /// 写入触发器元数据（`event.Operation` 等派生事实的来源）
    pub fn with_trigger(mut self, trigger_type: &str, operation: &str) -> Self {
        let mut meta = Map::new();
        meta.insert("type".to_string(), Value::from(trigger_type));
        meta.insert("operation".to_string(), Value::from(operation));
        self.data.insert("trigger".to_string(), Value::Object(meta));
        self
    }

    /// 按点号路径读取（大小写不敏感）
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path::lookup_path(&self.data, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_serialization() {
        let rule = Rule::new("active-check", TriggerSpec::new("employee"))
            .with_condition(Condition::new("employee.EmployeeStatus", "equals", "Active"))
            .with_action(ActionSpec::new("log").with_parameter("message", "hello"));

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["trigger"]["type"], "employee");
        assert_eq!(json["conditions"][0]["operator"], "equals");
        assert_eq!(json["actions"][0]["type"], "log");
        assert!(json.get("uiLayout").is_none());

        let parsed: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, rule);
    }

    #[test]
    fn test_rule_deserialization_defaults() {
        let json = r#"
        {
            "name": "bare",
            "trigger": { "type": "manual" }
        }
        "#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.trigger_type(), "manual");
        assert!(rule.trigger.parameters.is_empty());
        assert!(rule.conditions.is_empty());
        assert!(rule.actions.is_empty());
    }

    #[test]
    fn test_ui_layout_round_trip() {
        let json = json!({
            "name": "with-layout",
            "trigger": { "type": "manual", "parameters": {} },
            "conditions": [],
            "actions": [],
            "uiLayout": { "nodes": [{ "x": 1, "y": 2 }] }
        });

        let rule: Rule = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&rule).unwrap(), json);
    }

    #[test]
    fn test_eval_context_lookup() {
        let ctx = EvalContext::from_value(json!({
            "employee": {
                "EmployeeStatus": "Active",
                "Competencies": [{"CompetencyID": 12}]
            }
        }));

        assert_eq!(ctx.lookup("employee.EmployeeStatus"), Some(&json!("Active")));
        assert_eq!(ctx.lookup("Employee.employeestatus"), Some(&json!("Active")));
        assert_eq!(ctx.lookup("employee.Competencies.0.CompetencyID"), Some(&json!(12)));
        assert_eq!(ctx.lookup("employee.Missing"), None);
    }

    #[test]
    fn test_eval_context_from_scalar() {
        let ctx = EvalContext::from_value(json!(42));
        assert_eq!(ctx.data.get("payload"), Some(&json!(42)));
    }

    #[test]
    fn test_insert_serialized() {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Employee {
            employee_number: String,
        }

        let mut ctx = EvalContext::default();
        ctx.insert_serialized(
            "employee",
            &Employee {
                employee_number: "E-001".to_string(),
            },
        )
        .unwrap();

        assert_eq!(ctx.lookup("employee.EmployeeNumber"), Some(&json!("E-001")));
    }

    #[test]
    fn test_with_trigger_metadata() {
        let ctx = EvalContext::default().with_trigger("employee", "update");
        assert_eq!(ctx.lookup("trigger.operation"), Some(&json!("update")));
    }
}
