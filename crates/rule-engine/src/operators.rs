//! 内置条件操作符
//!
//! 操作符是纯函数 `(左值, 右值) -> bool`，左值为解析后的事实，右值为条件中的配置值。
//! 数值比较统一转为 f64，因此整数、浮点数与数字字符串之间可以互相比较。

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::error::OperatorError;
use crate::facts::coerce::{scalar_text, to_bool, to_datetime, to_f64, type_name};

/// 操作符函数
pub type OperatorFn = Arc<dyn Fn(&Value, &Value) -> Result<bool, OperatorError> + Send + Sync>;

/// 包装闭包为操作符
pub fn operator<F>(f: F) -> OperatorFn
where
    F: Fn(&Value, &Value) -> Result<bool, OperatorError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 内置操作符名称与符号别名
pub const BUILTIN_NAMES: &[(&str, Option<&str>)] = &[
    ("equals", Some("==")),
    ("notEquals", Some("!=")),
    ("greaterThan", Some(">")),
    ("lessThan", Some("<")),
    ("greaterThanOrEqual", Some(">=")),
    ("lessThanOrEqual", Some("<=")),
    ("contains", None),
    ("notContains", None),
    ("startsWith", None),
    ("endsWith", None),
    ("in", None),
    ("notIn", None),
    ("isTrue", None),
    ("isFalse", None),
    ("before", None),
    ("after", None),
    ("between", None),
    ("matches", None),
    ("isEmpty", None),
    ("isNotEmpty", None),
];

/// 按名称构造内置操作符
pub fn builtin(name: &str) -> Option<OperatorFn> {
    let op = match name {
        "equals" | "==" => operator(|l, r| Ok(equals(l, r))),
        "notEquals" | "!=" => operator(|l, r| Ok(!equals(l, r))),
        "greaterThan" | ">" => operator(|l, r| ordering(l, r).map(Ordering::is_gt)),
        "lessThan" | "<" => operator(|l, r| ordering(l, r).map(Ordering::is_lt)),
        "greaterThanOrEqual" | ">=" => operator(|l, r| ordering(l, r).map(Ordering::is_ge)),
        "lessThanOrEqual" | "<=" => operator(|l, r| ordering(l, r).map(Ordering::is_le)),
        "contains" => operator(contains),
        "notContains" => operator(|l, r| contains(l, r).map(|found| !found)),
        "startsWith" => operator(|l, r| text_pair(l, r).map(|(l, r)| l.starts_with(&r))),
        "endsWith" => operator(|l, r| text_pair(l, r).map(|(l, r)| l.ends_with(&r))),
        "in" => operator(in_list),
        "notIn" => operator(|l, r| in_list(l, r).map(|found| !found)),
        "isTrue" => operator(|l, _| Ok(to_bool(l) == Some(true))),
        "isFalse" => operator(|l, _| Ok(to_bool(l) == Some(false))),
        "before" => operator(|l, r| time_pair(l, r).map(|(l, r)| l < r)),
        "after" => operator(|l, r| time_pair(l, r).map(|(l, r)| l > r)),
        "between" => operator(between),
        "matches" => operator(regex_match),
        "isEmpty" => operator(|l, _| Ok(is_empty(l))),
        "isNotEmpty" => operator(|l, _| Ok(!is_empty(l))),
        _ => return None,
    };
    Some(op)
}

/// 全部内置操作符（含符号别名）
pub fn builtin_operators() -> Vec<(String, OperatorFn)> {
    let mut ops = Vec::with_capacity(BUILTIN_NAMES.len() + 6);
    for (name, symbol) in BUILTIN_NAMES {
        if let Some(op) = builtin(name) {
            if let Some(symbol) = symbol {
                ops.push((symbol.to_string(), op.clone()));
            }
            ops.push((name.to_string(), op));
        }
    }
    ops
}

/// 相等比较
///
/// 依次尝试：数值、布尔、时间、文本，最后结构比较。
pub fn equals(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (to_f64(left), to_f64(right)) {
        return (a - b).abs() < f64::EPSILON;
    }

    if left.is_boolean() || right.is_boolean() {
        return match (to_bool(left), to_bool(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }

    if left.is_string() && right.is_string() {
        if let (Some(a), Some(b)) = (to_datetime(left), to_datetime(right)) {
            return a == b;
        }
    }

    match (scalar_text(left), scalar_text(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// 有序比较：数值优先，其次时间
fn ordering(left: &Value, right: &Value) -> Result<Ordering, OperatorError> {
    if let (Some(a), Some(b)) = (to_f64(left), to_f64(right)) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| OperatorError::InvalidOperand("无法比较的数值".to_string()));
    }

    if let (Some(a), Some(b)) = (to_datetime(left), to_datetime(right)) {
        return Ok(a.cmp(&b));
    }

    let offending = if to_f64(left).is_none() && to_datetime(left).is_none() {
        left
    } else {
        right
    };
    Err(OperatorError::mismatch("number or datetime", type_name(offending)))
}

/// 文本包含或数组成员检查
fn contains(left: &Value, right: &Value) -> Result<bool, OperatorError> {
    match left {
        Value::Null => Ok(false),
        Value::Array(items) => Ok(items.iter().any(|item| equals(item, right))),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            let (haystack, needle) = text_pair(left, right)?;
            Ok(haystack.contains(&needle))
        }
        Value::Object(_) => Err(OperatorError::mismatch("string or array", "object")),
    }
}

/// 列表成员检查；右值可以是数组或逗号分隔的字符串
fn in_list(left: &Value, right: &Value) -> Result<bool, OperatorError> {
    match right {
        Value::Null => Ok(false),
        Value::Array(items) => Ok(items.iter().any(|item| equals(left, item))),
        Value::String(list) => Ok(list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .any(|item| equals(left, &Value::String(item.to_string())))),
        other => Err(OperatorError::mismatch("array or comma-separated string", type_name(other))),
    }
}

/// 范围比较，右值为 [min, max]，闭区间
fn between(left: &Value, right: &Value) -> Result<bool, OperatorError> {
    let bounds = right
        .as_array()
        .ok_or_else(|| OperatorError::mismatch("array [min, max]", type_name(right)))?;

    if bounds.len() != 2 {
        return Err(OperatorError::InvalidOperand(
            "between 操作符需要 [min, max] 数组".to_string(),
        ));
    }

    let lower = ordering(left, &bounds[0])?;
    let upper = ordering(left, &bounds[1])?;
    Ok(lower.is_ge() && upper.is_le())
}

/// 正则表达式匹配
fn regex_match(left: &Value, right: &Value) -> Result<bool, OperatorError> {
    let (text, pattern) = text_pair(left, right)?;
    let regex = Regex::new(&pattern).map_err(|e| {
        OperatorError::InvalidOperand(format!("无效的正则表达式 '{}': {}", pattern, e))
    })?;
    Ok(regex.is_match(&text))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn text_pair(left: &Value, right: &Value) -> Result<(String, String), OperatorError> {
    let l = scalar_text(left).ok_or_else(|| OperatorError::mismatch("string", type_name(left)))?;
    let r = scalar_text(right).ok_or_else(|| OperatorError::mismatch("string", type_name(right)))?;
    Ok((l, r))
}

fn time_pair(left: &Value, right: &Value) -> Result<(DateTime<Utc>, DateTime<Utc>), OperatorError> {
    let l = to_datetime(left).ok_or_else(|| OperatorError::mismatch("datetime", type_name(left)))?;
    let r = to_datetime(right)
        .ok_or_else(|| OperatorError::mismatch("datetime", type_name(right)))?;
    Ok((l, r))
}
