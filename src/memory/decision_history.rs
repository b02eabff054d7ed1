//! Decision Agent 的有界决策历史
//!
//! 只保留最近 N 条（默认 10），超出时静默丢弃最旧的；追加与截断在同一把锁内完成。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Success,
    Error,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Success => "success",
            DecisionStatus::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub action: Option<String>,
    pub status: DecisionStatus,
    pub message: String,
    pub incident_id: Option<String>,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug)]
pub struct DecisionHistory {
    entries: Mutex<VecDeque<DecisionRecord>>,
    capacity: usize,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// 持锁线程 panic 后仍读写同一份数据
    fn lock(&self) -> MutexGuard<'_, VecDeque<DecisionRecord>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, record: DecisionRecord) {
        let mut entries = self.lock();
        entries.push_back(record);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// 按到达顺序（最旧在前）返回快照
    pub fn snapshot(&self) -> Vec<DecisionRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
