//! 规则引擎错误类型
//!
//! 叶子能力（事实、操作符、模板、动作、存储）各有独立错误类型，
//! 由 [`EngineError`] 统一承载；可聚合的错误通过 [`MultiError`] 按出现顺序收集。

use std::fmt;

use thiserror::Error;

/// 事实解析错误
///
/// 仅表示路径本身格式非法；事实不存在不是错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    #[error("事实路径格式错误 '{path}': {reason}")]
    Malformed { path: String, reason: String },
}

impl FactError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// 操作符错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无效的操作数: {0}")]
    InvalidOperand(String),
}

impl OperatorError {
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// 参数模板错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("模板语法错误 '{template}': {reason}")]
    Malformed { template: String, reason: String },

    #[error("模板引用的键不存在: {0}")]
    MissingKey(String),
}

/// 动作执行错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("缺少参数: {0}")]
    MissingParameter(String),

    #[error("参数 {name} 无效: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("下游调用失败: {0}")]
    Downstream(String),
}

/// 规则存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("规则未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("规则文档序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("未知的触发器类型: {0}")]
    UnknownTrigger(String),

    #[error("未知的操作符: {0}")]
    UnknownOperator(String),

    #[error("未知的动作类型: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    MalformedFact(#[from] FactError),

    #[error("条件 `{fact} {operator}` 评估失败: {source}")]
    Operator {
        operator: String,
        fact: String,
        #[source]
        source: OperatorError,
    },

    #[error("动作 {action_type} 参数渲染失败: {source}")]
    Template {
        action_type: String,
        #[source]
        source: TemplateError,
    },

    #[error("动作 {action_type} 执行失败: {source}")]
    Action {
        action_type: String,
        #[source]
        source: ActionError,
    },

    #[error("触发器 {trigger_type} 执行失败: {message}")]
    Trigger {
        trigger_type: String,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("规则 '{rule}': {source}")]
    Rule {
        rule: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("{0}")]
    Multiple(MultiError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// 附加规则名称，便于定位出错的规则
    pub fn in_rule(self, rule: &str) -> Self {
        Self::Rule {
            rule: rule.to_string(),
            source: Box::new(self),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTrigger(_) => "UNKNOWN_TRIGGER",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::MalformedFact(_) => "MALFORMED_FACT",
            Self::Operator { .. } => "OPERATOR_ERROR",
            Self::Template { .. } => "TEMPLATE_ERROR",
            Self::Action { .. } => "ACTION_ERROR",
            Self::Trigger { .. } => "TRIGGER_ERROR",
            Self::Store(StoreError::NotFound(_)) => "RULE_NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
            Self::Rule { source, .. } => source.code(),
            Self::Multiple(_) => "MULTIPLE_ERRORS",
        }
    }
}

/// 有序错误集合
///
/// 保留错误出现顺序；压入聚合错误时自动展开，避免嵌套。
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<EngineError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: EngineError) {
        match error {
            EngineError::Multiple(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineError> {
        self.errors.iter()
    }

    /// 空集合返回 Ok，单个错误直接返回该错误，多个错误返回聚合错误
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(EngineError::Multiple(self)),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "共 {} 个错误", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            write!(f, "; [{}] {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = EngineError;
    type IntoIter = std::vec::IntoIter<EngineError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
