//! 能力元数据目录
//!
//! 描述内置触发器、动作、事实与操作符，供规则编辑器展示，
//! 同时是结构校验中参数检查的依据。

use std::sync::LazyLock;

use serde::Serialize;
use serde_json::{Value, json};

use crate::actions::log::LEVELS as LOG_LEVELS;
use crate::operators::BUILTIN_NAMES;
use crate::triggers::{EntityKind, Frequency};

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Enum,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
            Self::Object => "object",
            Self::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl ParameterMetadata {
    fn new(name: &str, param_type: ParameterType, required: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required,
            description: description.to_string(),
            example: None,
            options: None,
        }
    }

    fn required(name: &str, param_type: ParameterType, description: &str) -> Self {
        Self::new(name, param_type, true, description)
    }

    fn optional(name: &str, param_type: ParameterType, description: &str) -> Self {
        Self::new(name, param_type, false, description)
    }

    fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

/// 触发器或动作的描述
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterMetadata>,
}

impl CapabilityMetadata {
    fn new(kind: &str, name: &str, description: &str, parameters: Vec<ParameterMetadata>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ParameterType,
    pub description: String,
    pub operators: Vec<String>,
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub description: String,
    pub types: Vec<ParameterType>,
}

/// 元数据目录
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub triggers: Vec<CapabilityMetadata>,
    pub actions: Vec<CapabilityMetadata>,
    pub facts: Vec<FactMetadata>,
    pub operators: Vec<OperatorMetadata>,
}

static BUILTIN: LazyLock<Catalog> = LazyLock::new(|| Catalog {
    triggers: builtin_triggers(),
    actions: builtin_actions(),
    facts: builtin_facts(),
    operators: builtin_operators(),
});

impl Catalog {
    /// 内置能力目录（进程内共享）
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn trigger(&self, kind: &str) -> Option<&CapabilityMetadata> {
        self.triggers.iter().find(|t| t.kind == kind)
    }

    pub fn action(&self, kind: &str) -> Option<&CapabilityMetadata> {
        self.actions.iter().find(|a| a.kind == kind)
    }

    pub fn fact(&self, name: &str) -> Option<&FactMetadata> {
        self.facts.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorMetadata> {
        self.operators
            .iter()
            .find(|o| o.name == name || o.symbol.as_deref() == Some(name))
    }
}

fn lifecycle_operations() -> ParameterMetadata {
    ParameterMetadata::optional(
        "operations",
        ParameterType::Array,
        "响应的写入操作，缺省时响应全部",
    )
    .options(["create", "update", "delete"])
    .example(json!(["create", "update"]))
}

fn builtin_triggers() -> Vec<CapabilityMetadata> {
    use ParameterType::*;

    let mut triggers = vec![
        CapabilityMetadata::new(
            "manual",
            "手动触发",
            "通过接口手动运行规则",
            vec![ParameterMetadata::optional("payload", Object, "作为上下文数据的载荷")
                .example(json!({ "employee": { "EmployeeStatus": "Active" } }))],
        ),
        CapabilityMetadata::new(
            "schedule",
            "定时触发",
            "按频率或 cron 表达式周期运行",
            vec![
                ParameterMetadata::optional("frequency", Enum, "执行频率，未配置 cron 时必填")
                    .options(Frequency::ALL.iter().map(|f| f.as_str())),
                ParameterMetadata::optional(
                    "cron",
                    String,
                    "6 段 cron 表达式（含秒），优先于 frequency",
                )
                .example(json!("0 0 8 * * Mon-Fri")),
                ParameterMetadata::optional("entity", Enum, "逐个评估的实体类型")
                    .options(EntityKind::ALL.iter().map(|k| k.as_str())),
                ParameterMetadata::optional("activeOnly", Boolean, "只评估在职员工"),
            ],
        ),
    ];

    let lifecycle = [
        (EntityKind::Employee, "员工变更", "员工新增、修改或删除时触发"),
        (EntityKind::Competency, "资质变更", "员工资质新增、修改或删除时触发"),
        (EntityKind::ScheduledEvent, "排班事件变更", "排班事件新增、修改或删除时触发"),
        (EntityKind::JobPosition, "岗位变更", "岗位新增、修改或删除时触发"),
    ];
    triggers.extend(lifecycle.into_iter().map(|(kind, name, description)| {
        CapabilityMetadata::new(kind.as_str(), name, description, vec![lifecycle_operations()])
    }));
    triggers
}

fn builtin_actions() -> Vec<CapabilityMetadata> {
    use ParameterType::*;

    vec![
        CapabilityMetadata::new(
            "log",
            "记录日志",
            "输出一条日志",
            vec![
                ParameterMetadata::required("message", String, "日志内容，支持模板")
                    .example(json!("员工 {{.employee.EmployeeNumber}} 已入职")),
                ParameterMetadata::optional("level", Enum, "日志级别")
                    .options(LOG_LEVELS),
            ],
        ),
        CapabilityMetadata::new(
            "sendEmail",
            "发送邮件",
            "通过通知渠道发送邮件",
            vec![
                ParameterMetadata::required("to", String, "收件人")
                    .example(json!("{{.employee.Email}}")),
                ParameterMetadata::required("subject", String, "主题"),
                ParameterMetadata::required("body", String, "正文"),
            ],
        ),
        CapabilityMetadata::new(
            "sendSms",
            "发送短信",
            "通过通知渠道发送短信",
            vec![
                ParameterMetadata::required("to", String, "手机号")
                    .example(json!("{{.employee.Phone}}")),
                ParameterMetadata::required("message", String, "短信内容"),
            ],
        ),
        CapabilityMetadata::new(
            "webhook",
            "调用 Webhook",
            "向外部地址发送 HTTP 请求",
            vec![
                ParameterMetadata::required("url", String, "目标地址")
                    .example(json!("https://hooks.example.com/roster")),
                ParameterMetadata::optional("method", Enum, "请求方法，默认 POST")
                    .options(["POST", "PUT"]),
                ParameterMetadata::optional("payload", Object, "请求体，缺省时发送整个上下文"),
            ],
        ),
    ]
}

const NUMERIC_OPS: &[&str] = &[
    "equals",
    "notEquals",
    "greaterThan",
    "lessThan",
    "greaterThanOrEqual",
    "lessThanOrEqual",
    "between",
    "in",
    "notIn",
];
const BOOLEAN_OPS: &[&str] = &["isTrue", "isFalse", "equals", "notEquals"];
const STRING_OPS: &[&str] = &[
    "equals",
    "notEquals",
    "contains",
    "notContains",
    "startsWith",
    "endsWith",
    "in",
    "notIn",
    "matches",
    "isEmpty",
    "isNotEmpty",
];
const DATE_OPS: &[&str] = &["before", "after", "between", "equals"];

fn fact(
    name: &str,
    value_type: ParameterType,
    description: &str,
    triggers: &[&str],
) -> FactMetadata {
    let operators = match value_type {
        ParameterType::Number => NUMERIC_OPS,
        ParameterType::Boolean => BOOLEAN_OPS,
        ParameterType::Date => DATE_OPS,
        _ => STRING_OPS,
    };
    FactMetadata {
        name: name.to_string(),
        value_type,
        description: description.to_string(),
        operators: operators.iter().map(|s| s.to_string()).collect(),
        triggers: triggers.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_facts() -> Vec<FactMetadata> {
    use ParameterType::*;

    const EMPLOYEE: &[&str] = &["employee", "schedule", "manual"];
    const COMPETENCY: &[&str] = &["competency", "schedule", "manual"];
    const EVENT: &[&str] = &["scheduledEvent", "schedule", "manual"];
    const POSITION: &[&str] = &["jobPosition", "competency", "manual"];
    const LIFECYCLE: &[&str] = &["employee", "competency", "scheduledEvent", "jobPosition"];
    const ANY: &[&str] = &[];

    vec![
        fact("employee.EmployeeStatus", String, "员工状态", EMPLOYEE),
        fact("employee.Active", Boolean, "员工是否在职", EMPLOYEE),
        fact("employee.HireDate", Date, "入职日期", EMPLOYEE),
        fact("employee.DaysSinceHire", Number, "入职至今天数", EMPLOYEE),
        fact("employee.HasCompetency[id]", Boolean, "员工是否持有指定资质", EMPLOYEE),
        fact("competency.ExpiryDate", Date, "资质到期日", COMPETENCY),
        fact("competency.DaysUntilExpiry", Number, "距资质到期天数", COMPETENCY),
        fact("competency.Expired", Boolean, "资质是否已过期", COMPETENCY),
        fact("competency.IsRequired", Boolean, "资质是否为岗位必需", COMPETENCY),
        fact("jobPosition.RequiresCompetency[id]", Boolean, "岗位是否要求指定资质", POSITION),
        fact("scheduledEvent.StartTime", Date, "事件开始时间", EVENT),
        fact("scheduledEvent.DaysUntilStart", Number, "距事件开始天数", EVENT),
        fact("scheduledEvent.DurationHours", Number, "事件时长（小时）", EVENT),
        fact("scheduledEvent.InProgress", Boolean, "事件是否正在进行", EVENT),
        fact("event.Operation", String, "触发的写入操作", LIFECYCLE),
        fact("event.EntityType", String, "触发的实体类型", LIFECYCLE),
        fact("now", Date, "评估时刻", ANY),
    ]
}

fn describe_operator(name: &str) -> (&'static str, Vec<ParameterType>) {
    use ParameterType::*;

    match name {
        "equals" => ("等于", vec![String, Number, Boolean, Date]),
        "notEquals" => ("不等于", vec![String, Number, Boolean, Date]),
        "greaterThan" => ("大于", vec![Number, Date]),
        "lessThan" => ("小于", vec![Number, Date]),
        "greaterThanOrEqual" => ("大于等于", vec![Number, Date]),
        "lessThanOrEqual" => ("小于等于", vec![Number, Date]),
        "contains" => ("包含", vec![String, Array]),
        "notContains" => ("不包含", vec![String, Array]),
        "startsWith" => ("以指定文本开头", vec![String]),
        "endsWith" => ("以指定文本结尾", vec![String]),
        "in" => ("属于列表", vec![String, Number]),
        "notIn" => ("不属于列表", vec![String, Number]),
        "isTrue" => ("为真", vec![Boolean]),
        "isFalse" => ("为假", vec![Boolean]),
        "before" => ("早于", vec![Date]),
        "after" => ("晚于", vec![Date]),
        "between" => ("介于两值之间（含边界）", vec![Number, Date]),
        "matches" => ("匹配正则表达式", vec![String]),
        "isEmpty" => ("为空", vec![String, Array, Object]),
        "isNotEmpty" => ("不为空", vec![String, Array, Object]),
        _ => ("", Vec::new()),
    }
}

fn builtin_operators() -> Vec<OperatorMetadata> {
    BUILTIN_NAMES
        .iter()
        .map(|(name, symbol)| {
            let (description, types) = describe_operator(name);
            OperatorMetadata {
                name: name.to_string(),
                symbol: symbol.map(str::to_string),
                description: description.to_string(),
                types,
            }
        })
        .collect()
}
