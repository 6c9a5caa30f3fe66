//! 事实解析
//!
//! 事实解析器按注册顺序被询问，第一个认领路径的解析器给出结果。
//! 认领但取不到值（`Missing`）与不认领（`Unhandled`）是两种不同结果：
//! 前者终止查找，后者交给下一个解析器。

pub mod coerce;
pub mod competency;
pub mod context;
pub mod employee;
pub mod path;
pub mod schedule;

use serde_json::Value;

use crate::error::FactError;
use crate::models::EvalContext;

pub use competency::{CompetencyResolver, JobPositionResolver};
pub use context::ContextResolver;
pub use employee::EmployeeResolver;
pub use path::FactPath;
pub use schedule::ScheduledEventResolver;

/// 事实解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 解析器不认识该路径
    Unhandled,
    /// 路径已认领但上下文中没有对应值
    Missing,
    Value(Value),
}

impl Resolution {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Unhandled)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Resolution {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i64> for Resolution {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for Resolution {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

/// 事实解析器
pub trait FactResolver: Send + Sync {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError>;
}

impl<F> FactResolver for F
where
    F: Fn(&EvalContext, &FactPath<'_>) -> Result<Resolution, FactError> + Send + Sync,
{
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        self(ctx, path)
    }
}

/// 读取顶层实体（忽略大小写）
pub(crate) fn entity<'a>(ctx: &'a EvalContext, name: &str) -> Option<&'a Value> {
    path::get_key(&ctx.data, name)
}

/// 读取实体字段（忽略大小写）
pub(crate) fn field<'a>(entity: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    match entity? {
        Value::Object(map) => path::get_key(map, name),
        _ => None,
    }
}

/// 判断标识列表中是否包含给定 id
///
/// 列表元素可以是标量，或携带 `CompetencyID` / `ID` 字段的对象。
pub(crate) fn ids_contain(list: Option<&Value>, id: &str) -> bool {
    let Some(Value::Array(items)) = list else {
        return false;
    };
    items.iter().any(|item| match item {
        Value::Object(map) => path::get_key(map, "CompetencyID")
            .or_else(|| path::get_key(map, "ID"))
            .is_some_and(|v| id_equals(v, id)),
        other => id_equals(other, id),
    })
}

fn id_equals(value: &Value, id: &str) -> bool {
    let id = id.trim();
    if let (Some(a), Ok(b)) = (coerce::to_f64(value), id.parse::<f64>()) {
        return (a - b).abs() < f64::EPSILON;
    }
    coerce::scalar_text(value).is_some_and(|text| text.trim() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_contain_scalars_and_objects() {
        let list = json!([12, "15", {"CompetencyID": 20}, {"ID": 30.0}]);
        assert!(ids_contain(Some(&list), "12"));
        assert!(ids_contain(Some(&list), "15"));
        assert!(ids_contain(Some(&list), "20"));
        assert!(ids_contain(Some(&list), "30"));
        assert!(!ids_contain(Some(&list), "99"));
        assert!(!ids_contain(None, "12"));
        assert!(!ids_contain(Some(&json!("12")), "12"));
    }

    #[test]
    fn test_ids_contain_text_ids() {
        let list = json!(["FORK-1", "CPR"]);
        assert!(ids_contain(Some(&list), "CPR"));
        assert!(!ids_contain(Some(&list), "cpr"));
    }

    fn fixed_resolver(_: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if path.root() == "fixed" {
            Ok(Resolution::from(7_i64))
        } else {
            Ok(Resolution::Unhandled)
        }
    }

    #[test]
    fn test_function_resolver() {
        let resolver = fixed_resolver;
        let ctx = EvalContext::default();
        let hit = resolver
            .resolve(&ctx, &FactPath::parse("fixed.value").unwrap())
            .unwrap();
        assert_eq!(hit, Resolution::Value(json!(7)));

        let miss = resolver
            .resolve(&ctx, &FactPath::parse("other").unwrap())
            .unwrap();
        assert!(!miss.is_handled());
    }
}
