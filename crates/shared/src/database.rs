//! PostgreSQL 连接与迁移
//!
//! 服务启动时建立连接池并执行各自嵌入的迁移集，
//! 迁移文件由使用方通过 `sqlx::migrate!` 在编译期打包后传入。

use std::time::{Duration, Instant};

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{Result, RosterError};

/// 连接池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
}

/// 数据库句柄，克隆后共享同一个连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 按配置建立连接池
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("PostgreSQL 连接池已建立");
        Ok(Self { pool })
    }

    /// 建立连接池并执行迁移
    pub async fn connect_and_migrate(
        config: &DatabaseConfig,
        migrator: &Migrator,
    ) -> Result<Self> {
        let db = Self::connect(config).await?;
        db.migrate(migrator).await?;
        Ok(db)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行尚未应用的迁移，已应用的版本会被跳过
    #[instrument(skip(self, migrator))]
    pub async fn migrate(&self, migrator: &Migrator) -> Result<()> {
        let versions: Vec<i64> = migrator.iter().map(|m| m.version).collect();
        migrator.run(&self.pool).await?;
        info!(?versions, "数据库迁移完成");
        Ok(())
    }

    /// 执行 `SELECT 1`，返回往返耗时
    pub async fn health_check(&self) -> Result<Duration> {
        let started = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RosterError::from)?;
        Ok(started.elapsed())
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL 连接池已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_database() -> Database {
        let pool = PgPoolOptions::new()
            .connect_lazy(&crate::test_utils::test_database_config().url)
            .unwrap();
        Database::from_pool(pool)
    }

    #[tokio::test]
    async fn test_lazy_pool_starts_empty() {
        let db = lazy_database();
        assert_eq!(db.status(), PoolStatus { size: 0, idle: 0 });
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL"]
    async fn test_connect_and_migrate() {
        let config = crate::test_utils::test_database_config();
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../rule-engine/migrations");
        let migrator = Migrator::new(dir).await.unwrap();

        let db = Database::connect_and_migrate(&config, &migrator).await.unwrap();
        // 重复执行不应报错
        db.migrate(&migrator).await.unwrap();
        assert!(db.health_check().await.unwrap() < Duration::from_secs(5));
        db.close().await;
    }
}
