//! 运行时状态：事件存储与会话存储
//!
//! 两者由 `Pipeline::submit_incident` / `Pipeline::decide` 读写，编排器本身不碰它们。

pub mod incidents;
pub mod sessions;

pub use incidents::{IncidentMetrics, IncidentStore, InMemoryIncidentStore};
pub use sessions::{InMemorySessionStore, SessionStore};
