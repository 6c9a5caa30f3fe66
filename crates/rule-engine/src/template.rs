//! 动作参数模板渲染
//!
//! 占位符语法为 `{{.a.b.c}}`，路径按与事实解析相同的规则（忽略大小写、数字下标）
//! 在评估上下文数据中查找。不含 `{{` 的字符串原样返回，单独出现的 `}}` 视为普通文本。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TemplateError;
use crate::facts::coerce::as_text;
use crate::facts::path::lookup_path;
use crate::models::Parameters;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("占位符正则必须合法"));

static DOTTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\.[A-Za-z0-9_\-]+)+$").expect("路径正则必须合法"));

/// 缺失键处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// 渲染为空字符串
    #[default]
    Empty,
    /// 视为模板错误
    Error,
}

/// 判断字符串是否包含模板语法（只以 `{{` 开启）
pub fn has_template(text: &str) -> bool {
    text.contains("{{")
}

/// 模板渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer {
    missing_key: MissingKeyPolicy,
}

impl TemplateRenderer {
    pub fn new(missing_key: MissingKeyPolicy) -> Self {
        Self { missing_key }
    }

    /// 仅检查语法，不做渲染
    pub fn check(template: &str) -> Result<(), TemplateError> {
        Self::scan(template, |_| Ok(String::new())).map(|_| ())
    }

    /// 渲染单个字符串
    pub fn render_str(
        &self,
        template: &str,
        data: &Map<String, Value>,
    ) -> Result<String, TemplateError> {
        Self::scan(template, |path| match lookup_path(data, path) {
            Some(value) => Ok(as_text(value)),
            None => match self.missing_key {
                MissingKeyPolicy::Empty => Ok(String::new()),
                MissingKeyPolicy::Error => Err(TemplateError::MissingKey(format!(".{}", path))),
            },
        })
    }

    /// 递归渲染参数值，保留原有结构；非字符串叶子原样保留
    pub fn render_value(
        &self,
        value: &Value,
        data: &Map<String, Value>,
    ) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => self.render_str(s, data).map(Value::String),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item, data))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => self.render_params(map, data).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    /// 渲染整个参数表
    pub fn render_params(
        &self,
        params: &Parameters,
        data: &Map<String, Value>,
    ) -> Result<Parameters, TemplateError> {
        let mut rendered = Parameters::with_capacity(params.len());
        for (key, value) in params {
            rendered.insert(key.clone(), self.render_value(value, data)?);
        }
        Ok(rendered)
    }

    /// 扫描占位符并以 `resolve` 的结果替换
    fn scan<F>(template: &str, mut resolve: F) -> Result<String, TemplateError>
    where
        F: FnMut(&str) -> Result<String, TemplateError>,
    {
        if !has_template(template) {
            return Ok(template.to_string());
        }

        let malformed = |reason: String| TemplateError::Malformed {
            template: template.to_string(),
            reason,
        };

        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let literal = &template[last..whole.start()];
            if has_template(literal) {
                return Err(malformed("花括号不匹配".to_string()));
            }
            output.push_str(literal);

            let expr = inner.as_str();
            if !DOTTED_PATH.is_match(expr) {
                return Err(malformed(format!("无效的占位符 '{}'，应为 .a.b 形式的路径", expr)));
            }
            output.push_str(&resolve(&expr[1..])?);
            last = whole.end();
        }

        let tail = &template[last..];
        if has_template(tail) {
            return Err(malformed("花括号不匹配".to_string()));
        }
        output.push_str(tail);

        Ok(output)
    }
}
