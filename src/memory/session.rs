//! 会话：会话 ID + 有序的 (输入, 输出) 轮次，只追加

use serde::{Deserialize, Serialize};

/// 单轮记录：Agent 收到的输入与给出的输出
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub input: String,
    pub output: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    history: Vec<Turn>,
}

impl Session {
    /// 未给出 ID 时生成 UUID v4
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            session_id: session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            history: Vec::new(),
        }
    }

    pub fn add_turn(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.history.push(Turn {
            input: input.into(),
            output: output.into(),
        });
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}
