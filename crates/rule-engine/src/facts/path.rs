//! 点号路径遍历与事实路径语法
//!
//! 所有按名称读取上下文数据的地方（通用事实解析、模板渲染）都经由这里，
//! 键匹配优先精确匹配，其次忽略 ASCII 大小写。

use serde_json::{Map, Value};

use crate::error::FactError;

/// 在对象中查找键：精确匹配优先，否则忽略大小写
pub fn get_key<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// 沿路径段逐级下钻；数字段用于数组下标
pub fn walk<'a, 'p>(
    mut current: &'a Value,
    segments: impl IntoIterator<Item = &'p str>,
) -> Option<&'a Value> {
    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => get_key(map, segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// 从顶层数据按 `a.b.c` 读取
pub fn lookup_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut segments = path.split('.');
    let head = segments.next()?;
    if head.is_empty() {
        return None;
    }
    let first = get_key(root, head)?;
    walk(first, segments)
}

/// 解析后的事实路径
///
/// 形如 `employee.HasCompetency[12]`：末段可携带一个方括号参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactPath<'a> {
    raw: &'a str,
    segments: Vec<&'a str>,
    argument: Option<&'a str>,
}

impl<'a> FactPath<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, FactError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FactError::malformed(raw, "路径为空"));
        }

        let (body, argument) = match trimmed.find('[') {
            None => {
                if trimmed.contains(']') {
                    return Err(FactError::malformed(raw, "存在多余的 ']'"));
                }
                (trimmed, None)
            }
            Some(open) => {
                let rest = &trimmed[open + 1..];
                let close = rest
                    .find(']')
                    .ok_or_else(|| FactError::malformed(raw, "方括号未闭合"))?;
                if close + 1 != rest.len() {
                    return Err(FactError::malformed(raw, "']' 之后不能再有内容"));
                }
                let arg = rest[..close].trim();
                if arg.is_empty() {
                    return Err(FactError::malformed(raw, "方括号参数为空"));
                }
                if arg.contains('[') {
                    return Err(FactError::malformed(raw, "不支持嵌套方括号"));
                }
                (&trimmed[..open], Some(arg))
            }
        };

        let segments: Vec<&str> = body.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(FactError::malformed(raw, "存在空的路径段"));
        }

        Ok(Self {
            raw,
            segments,
            argument,
        })
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// 首段（通常是实体名）
    pub fn root(&self) -> &'a str {
        self.segments[0]
    }

    /// 末段名称（不含参数）
    pub fn leaf(&self) -> &'a str {
        self.segments[self.segments.len() - 1]
    }

    pub fn argument(&self) -> Option<&'a str> {
        self.argument
    }

    /// 首段与末段是否分别匹配（忽略大小写），且路径恰为两段
    pub fn is(&self, root: &str, leaf: &str) -> bool {
        self.segments.len() == 2
            && self.root().eq_ignore_ascii_case(root)
            && self.leaf().eq_ignore_ascii_case(leaf)
    }

    /// 读取必需的参数
    pub fn require_argument(&self) -> Result<&'a str, FactError> {
        self.argument.ok_or_else(|| {
            FactError::malformed(self.raw, format!("{} 需要方括号参数", self.leaf()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Map<String, Value> {
        json!({
            "employee": {
                "EmployeeStatus": "Active",
                "status": "lower",
                "Competencies": [12, {"CompetencyID": 15}]
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let data = data();
        assert_eq!(lookup_path(&data, "EMPLOYEE.employeestatus"), Some(&json!("Active")));
    }

    #[test]
    fn test_exact_match_preferred() {
        let mut map = Map::new();
        map.insert("Status".to_string(), json!("upper"));
        map.insert("status".to_string(), json!("lower"));
        assert_eq!(get_key(&map, "status"), Some(&json!("lower")));
        assert_eq!(get_key(&map, "Status"), Some(&json!("upper")));
    }

    #[test]
    fn test_array_index() {
        let data = data();
        assert_eq!(lookup_path(&data, "employee.Competencies.0"), Some(&json!(12)));
        assert_eq!(
            lookup_path(&data, "employee.Competencies.1.competencyid"),
            Some(&json!(15))
        );
        assert_eq!(lookup_path(&data, "employee.Competencies.5"), None);
        assert_eq!(lookup_path(&data, "employee.Competencies.x"), None);
    }

    #[test]
    fn test_broken_links() {
        let data = data();
        assert_eq!(lookup_path(&data, "employee.EmployeeStatus.Inner"), None);
        assert_eq!(lookup_path(&data, "employee..status"), None);
        assert_eq!(lookup_path(&data, ""), None);
        assert_eq!(lookup_path(&data, "nobody.Name"), None);
    }

    #[test]
    fn test_parse_plain() {
        let path = FactPath::parse("employee.Active").unwrap();
        assert_eq!(path.segments(), &["employee", "Active"]);
        assert_eq!(path.argument(), None);
        assert!(path.is("Employee", "active"));
    }

    #[test]
    fn test_parse_argument() {
        let path = FactPath::parse("employee.HasCompetency[ 12 ]").unwrap();
        assert_eq!(path.leaf(), "HasCompetency");
        assert_eq!(path.argument(), Some("12"));
        assert_eq!(path.require_argument().unwrap(), "12");
    }

    #[test]
    fn test_parse_malformed() {
        for raw in [
            "",
            "employee.HasCompetency[]",
            "employee.HasCompetency[12",
            "employee.HasCompetency[12]x",
            "employee.HasCompetency]",
            "employee..Active",
            "employee.Has[[1]]",
        ] {
            assert!(
                matches!(FactPath::parse(raw), Err(FactError::Malformed { .. })),
                "expected malformed: {raw:?}"
            );
        }
    }

    #[test]
    fn test_require_argument_missing() {
        let path = FactPath::parse("employee.HasCompetency").unwrap();
        assert!(path.require_argument().is_err());
    }
}
