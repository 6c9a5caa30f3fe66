//! PostgreSQL 规则存储
//!
//! 规则体以 JSONB 保存在 `automation_rules.spec`，
//! `trigger_type` 与 `enabled` 上建有联合索引供分发查询使用。
//! 表结构由 `migrations/` 下的迁移维护，经 [`Database::migrate`] 执行。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_shared::database::Database;
use roster_shared::error::RosterError;
use sqlx::migrate::Migrator;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};

use super::{RuleDocument, RuleStore};
use crate::error::StoreError;
use crate::models::Rule;

/// 规则存储的迁移集
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct PgRuleStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct RuleRow {
    id: String,
    name: String,
    trigger_type: String,
    spec: Json<Rule>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for RuleDocument {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            trigger_type: row.trigger_type,
            spec: row.spec.0,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 执行迁移后基于该连接池构建存储
    pub async fn migrated(db: &Database) -> Result<Self, RosterError> {
        db.migrate(&MIGRATOR).await?;
        Ok(Self::new(db.pool().clone()))
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn list_by_trigger(&self, trigger_type: &str) -> Result<Vec<RuleDocument>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, trigger_type, spec, enabled, created_at, updated_at
            FROM automation_rules
            WHERE trigger_type = $1 AND enabled = TRUE
            ORDER BY created_at, id
            "#,
        )
        .bind(trigger_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RuleDocument::from).collect())
    }

    #[instrument(skip(self, rule), fields(rule = %rule.name))]
    async fn create(&self, rule: &Rule) -> Result<RuleDocument, StoreError> {
        let doc = RuleDocument::new(rule);

        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            INSERT INTO automation_rules (id, name, trigger_type, spec, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, trigger_type, spec, enabled, created_at, updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(&doc.trigger_type)
        .bind(Json(&doc.spec))
        .bind(doc.enabled)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .fetch_one(&self.pool)
        .await?;

        info!(rule_id = %row.id, "规则已创建");
        Ok(row.into())
    }

    async fn get(&self, id: &str) -> Result<RuleDocument, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, trigger_type, spec, enabled, created_at, updated_at
            FROM automation_rules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RuleDocument::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    #[instrument(skip(self, rule), fields(rule = %rule.name))]
    async fn update(&self, id: &str, rule: &Rule) -> Result<RuleDocument, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            UPDATE automation_rules
            SET name = $2, trigger_type = $3, spec = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, trigger_type, spec, enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&rule.name)
        .bind(rule.trigger_type())
        .bind(Json(rule))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        info!(rule_id = %id, "规则已更新");
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(rule_id = %id, "规则已删除");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<RuleDocument, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            UPDATE automation_rules
            SET enabled = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, trigger_type, spec, enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Ok(row.into())
    }

    async fn list_all(&self) -> Result<Vec<RuleDocument>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, trigger_type, spec, enabled, created_at, updated_at
            FROM automation_rules
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RuleDocument::from).collect())
    }
}
