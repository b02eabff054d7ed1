//! 记忆层：会话轮次、Agent 事实记忆、有界决策历史

pub mod decision_history;
pub mod facts;
pub mod session;

pub use decision_history::{DecisionHistory, DecisionRecord, DecisionStatus, DEFAULT_HISTORY_CAPACITY};
pub use facts::FactMemory;
pub use session::{Session, Turn};
