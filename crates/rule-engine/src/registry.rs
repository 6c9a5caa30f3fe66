//! 能力注册表
//!
//! 按名称保存触发器、事实解析器、操作符与动作处理器。
//! 构建完成后只读，通过 `Arc` 在引擎与 HTTP 层之间共享。

use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::ActionHandler;
use crate::error::{EngineError, Result};
use crate::facts::FactResolver;
use crate::operators::{self, OperatorFn};
use crate::triggers::TriggerHandler;

#[derive(Clone)]
pub struct Registry {
    triggers: HashMap<String, Arc<dyn TriggerHandler>>,
    facts: Vec<Arc<dyn FactResolver>>,
    operators: HashMap<String, OperatorFn>,
    actions: HashMap<String, Arc<dyn ActionHandler>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// 预置全部内置操作符的注册表
    pub fn new() -> Self {
        Self::empty().use_operators(operators::builtin_operators())
    }

    /// 不含任何能力的注册表
    pub fn empty() -> Self {
        Self {
            triggers: HashMap::new(),
            facts: Vec::new(),
            operators: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    pub fn use_trigger(
        mut self,
        name: impl Into<String>,
        handler: impl TriggerHandler + 'static,
    ) -> Self {
        self.triggers.insert(name.into(), Arc::new(handler));
        self
    }

    /// 追加事实解析器；解析时按注册顺序询问
    pub fn use_fact_resolver(mut self, resolver: impl FactResolver + 'static) -> Self {
        self.facts.push(Arc::new(resolver));
        self
    }

    pub fn use_action(
        mut self,
        name: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    /// 注册或覆盖操作符
    pub fn use_operator(mut self, name: impl Into<String>, op: OperatorFn) -> Self {
        self.operators.insert(name.into(), op);
        self
    }

    pub fn use_operators(mut self, ops: impl IntoIterator<Item = (String, OperatorFn)>) -> Self {
        self.operators.extend(ops);
        self
    }

    pub fn trigger(&self, name: &str) -> Result<Arc<dyn TriggerHandler>> {
        self.triggers
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTrigger(name.to_string()))
    }

    pub fn operator(&self, name: &str) -> Result<OperatorFn> {
        self.operators
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOperator(name.to_string()))
    }

    pub fn action(&self, name: &str) -> Result<Arc<dyn ActionHandler>> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAction(name.to_string()))
    }

    pub fn fact_resolvers(&self) -> &[Arc<dyn FactResolver>] {
        &self.facts
    }

    pub fn has_trigger(&self, name: &str) -> bool {
        self.triggers.contains_key(name)
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn trigger_names(&self) -> Vec<&str> {
        sorted_keys(&self.triggers)
    }

    pub fn operator_names(&self) -> Vec<&str> {
        sorted_keys(&self.operators)
    }

    pub fn action_names(&self) -> Vec<&str> {
        sorted_keys(&self.actions)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}
