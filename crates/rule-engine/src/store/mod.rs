//! 规则存储
//!
//! 规则以文档形式持久化：`triggerType` 总是由规则自身的触发器类型派生，
//! 作为分发时的查询键。分发器只依赖 [`RuleStore::list_by_trigger`]。

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Rule;

pub use memory::MemoryRuleStore;
pub use postgres::PgRuleStore;

/// 持久化的规则文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    pub id: String,
    pub name: String,
    pub trigger_type: String,
    pub spec: Rule,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleDocument {
    /// 新建文档，默认启用
    pub fn new(rule: &Rule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: rule.name.clone(),
            trigger_type: rule.trigger_type().to_string(),
            spec: rule.clone(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// 替换规则内容，保留 id、启用状态与创建时间
    pub fn replace(&mut self, rule: &Rule) {
        self.name = rule.name.clone();
        self.trigger_type = rule.trigger_type().to_string();
        self.spec = rule.clone();
        self.updated_at = Utc::now();
    }
}

/// 规则存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 指定触发器类型下全部已启用的规则
    async fn list_by_trigger(&self, trigger_type: &str) -> Result<Vec<RuleDocument>, StoreError>;
    async fn create(&self, rule: &Rule) -> Result<RuleDocument, StoreError>;
    async fn get(&self, id: &str) -> Result<RuleDocument, StoreError>;
    async fn update(&self, id: &str, rule: &Rule) -> Result<RuleDocument, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<RuleDocument, StoreError>;
    async fn list_all(&self) -> Result<Vec<RuleDocument>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerSpec;
    use serde_json::json;

    #[test]
    fn test_document_shape() {
        let rule = Rule::new("expiry", TriggerSpec::new("competency"));
        let doc = RuleDocument::new(&rule);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["triggerType"], "competency");
        assert_eq!(json["enabled"], true);
        assert_eq!(json["spec"]["trigger"], json!({ "type": "competency", "parameters": {} }));
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_replace_rederives_trigger_type() {
        let mut doc = RuleDocument::new(&Rule::new("a", TriggerSpec::new("employee")));
        let created = doc.created_at;
        doc.enabled = false;

        doc.replace(&Rule::new("b", TriggerSpec::new("schedule")));

        assert_eq!(doc.name, "b");
        assert_eq!(doc.trigger_type, "schedule");
        assert!(!doc.enabled);
        assert_eq!(doc.created_at, created);
        assert!(doc.updated_at >= created);
    }
}
