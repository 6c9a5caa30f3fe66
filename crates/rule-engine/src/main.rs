//! 规则引擎服务
//!
//! 提供规则管理 REST API、事件分发入口与定时规则调度。

use std::sync::Arc;
use std::time::Duration;

use roster_shared::{
    config::{AppConfig, RuleEngineConfig, StoreBackend},
    database::Database,
    observability,
};
use rule_engine::{
    api::{self, AppState},
    builtin::{BuiltinDeps, default_registry},
    engine::{Engine, EngineOptions},
    scheduler::ScheduleRunner,
    store::{MemoryRuleStore, PgRuleStore, RuleStore},
    template::MissingKeyPolicy,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const SERVICE_NAME: &str = "rule-engine";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_default();
    let _guard = observability::init(SERVICE_NAME, &config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let store: Arc<dyn RuleStore> = match config.rule_engine.store {
        StoreBackend::Memory => {
            info!("Using in-memory rule store");
            Arc::new(MemoryRuleStore::new())
        }
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            let store = PgRuleStore::migrated(&db).await?;
            info!(pool = ?db.status(), "Using PostgreSQL rule store");
            Arc::new(store)
        }
    };

    let registry = Arc::new(default_registry(BuiltinDeps::local()));
    let engine = Arc::new(Engine::with_options(registry, engine_options(&config.rule_engine)));

    let runner = ScheduleRunner::new(
        engine.clone(),
        store.clone(),
        Duration::from_secs(config.rule_engine.schedule_poll_seconds.max(1)),
    );
    tokio::spawn(async move {
        runner.run().await;
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = api::app(AppState::new(engine, store)).layer(cors);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn engine_options(config: &RuleEngineConfig) -> EngineOptions {
    EngineOptions {
        stop_on_condition_error: config.stop_on_condition_error,
        continue_on_action_error: config.continue_on_action_error,
        missing_key: if config.strict_templates {
            MissingKeyPolicy::Error
        } else {
            MissingKeyPolicy::Empty
        },
    }
}

/// 监听 SIGTERM 与 Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
