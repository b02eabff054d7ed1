//! Agent 事实记忆：每个 Agent 实例各一份，只追加
//!
//! 只用于观察与测试，决策逻辑从不回读。

use std::sync::{Arc, RwLock};

use serde_json::Value;

#[derive(Clone, Default, Debug)]
pub struct FactMemory {
    knowledge: Arc<RwLock<Vec<Value>>>,
}

impl FactMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fact(&self, fact: Value) {
        let mut store = self.knowledge.write().unwrap_or_else(|e| e.into_inner());
        store.push(fact);
    }

    pub fn facts(&self) -> Vec<Value> {
        self.knowledge
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.knowledge.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
