//! 可插拔的条件/动作规则引擎
//!
//! 提供：
//! - 按名称注册的触发器、事实解析器、操作符与动作
//! - 条件短路评估与动作参数模板渲染
//! - 外部事件分发与定时规则调度
//! - 元数据驱动的规则校验
//! - 规则存储（内存 / PostgreSQL）与 REST 接口

pub mod actions;
pub mod api;
pub mod builtin;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod facts;
pub mod metadata;
pub mod models;
pub mod operators;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod template;
pub mod triggers;
pub mod validation;

pub use dispatch::{dispatch_event, dispatch_event_with_report};
pub use engine::{Engine, EngineOptions, RunReport};
pub use error::{EngineError, MultiError, Result};
pub use models::{ActionSpec, Condition, EvalContext, Parameters, Rule, TriggerSpec};
pub use registry::Registry;
pub use store::{MemoryRuleStore, PgRuleStore, RuleDocument, RuleStore};
pub use validation::{FieldError, FieldErrorKind, RuleValidator, ValidationResult};
