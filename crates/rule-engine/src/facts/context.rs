//! 通用上下文事实解析
//!
//! 兜底解析器，应最后注册：处理 `event.*` 与 `now` 派生事实，
//! 其余路径直接在上下文数据中按点号路径查找。

use serde_json::Value;

use super::path::{get_key, lookup_path, walk};
use super::{FactPath, FactResolver, Resolution};
use crate::error::FactError;
use crate::models::EvalContext;

pub struct ContextResolver;

impl ContextResolver {
    fn trigger_field(ctx: &EvalContext, name: &str) -> Resolution {
        match lookup_path(&ctx.data, "trigger").and_then(|t| walk(t, [name])) {
            Some(value) => Resolution::Value(value.clone()),
            None => Resolution::Missing,
        }
    }

    fn derived(ctx: &EvalContext, path: &FactPath<'_>) -> Option<Resolution> {
        if path.segments().len() == 1 && path.root().eq_ignore_ascii_case("now") {
            return Some(Resolution::Value(Value::String(ctx.now.to_rfc3339())));
        }
        if path.segments().len() == 2 && path.root().eq_ignore_ascii_case("event") {
            let field = match path.leaf().to_ascii_lowercase().as_str() {
                "operation" => "operation",
                "entitytype" => "entityType",
                "type" => "type",
                _ => return None,
            };
            return Some(Self::trigger_field(ctx, field));
        }
        None
    }
}

impl FactResolver for ContextResolver {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if let Some(resolution) = Self::derived(ctx, path) {
            return Ok(resolution);
        }

        // 通用路径不接受方括号参数
        if path.argument().is_some() {
            return Ok(Resolution::Missing);
        }

        let segments = path.segments();
        let found = get_key(&ctx.data, segments[0])
            .and_then(|head| walk(head, segments[1..].iter().copied()));

        Ok(match found {
            Some(value) => Resolution::Value(value.clone()),
            None => Resolution::Missing,
        })
    }
}
