//! 路由共享状态

use std::sync::Arc;

use crate::engine::Engine;
use crate::models::Rule;
use crate::registry::Registry;
use crate::store::RuleStore;
use crate::validation::{RuleValidator, ValidationResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn RuleStore>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, store: Arc<dyn RuleStore>) -> Self {
        Self { engine, store }
    }

    pub fn registry(&self) -> &Registry {
        self.engine.registry()
    }

    pub fn validate(&self, rule: &Rule) -> ValidationResult {
        RuleValidator::new(self.registry()).validate(rule)
    }
}
