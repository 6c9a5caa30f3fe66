//! 内存规则存储

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, instrument};

use super::{RuleDocument, RuleStore};
use crate::error::StoreError;
use crate::models::Rule;

/// 基于 DashMap 的规则存储，用于开发环境与测试
#[derive(Clone, Default)]
pub struct MemoryRuleStore {
    rules: Arc<DashMap<String, RuleDocument>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn sorted(mut docs: Vec<RuleDocument>) -> Vec<RuleDocument> {
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        docs
    }

    fn modify<F>(&self, id: &str, f: F) -> Result<RuleDocument, StoreError>
    where
        F: FnOnce(&mut RuleDocument),
    {
        let mut entry = self
            .rules
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_by_trigger(&self, trigger_type: &str) -> Result<Vec<RuleDocument>, StoreError> {
        let docs = self
            .rules
            .iter()
            .filter(|entry| entry.enabled && entry.trigger_type == trigger_type)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(docs))
    }

    #[instrument(skip(self, rule), fields(rule = %rule.name))]
    async fn create(&self, rule: &Rule) -> Result<RuleDocument, StoreError> {
        let doc = RuleDocument::new(rule);
        self.rules.insert(doc.id.clone(), doc.clone());
        info!(rule_id = %doc.id, "规则已创建");
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<RuleDocument, StoreError> {
        self.rules
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    #[instrument(skip(self, rule), fields(rule = %rule.name))]
    async fn update(&self, id: &str, rule: &Rule) -> Result<RuleDocument, StoreError> {
        let doc = self.modify(id, |doc| doc.replace(rule))?;
        info!(rule_id = %id, "规则已更新");
        Ok(doc)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.rules
            .remove(id)
            .map(|_| info!(rule_id = %id, "规则已删除"))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<RuleDocument, StoreError> {
        self.modify(id, |doc| {
            doc.enabled = enabled;
            doc.updated_at = Utc::now();
        })
    }

    async fn list_all(&self) -> Result<Vec<RuleDocument>, StoreError> {
        let docs = self.rules.iter().map(|entry| entry.value().clone()).collect();
        Ok(Self::sorted(docs))
    }
}
