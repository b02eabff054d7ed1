//! 会话存储抽象层

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::memory::Session;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 按 ID 取会话；ID 缺失或不存在时新建（未给出 ID 时生成 UUID v4）
    async fn get_or_create(&self, session_id: Option<&str>) -> Session;

    /// 写回会话（覆盖同 ID 的旧值）
    async fn save(&self, session: Session);

    async fn get(&self, session_id: &str) -> Option<Session>;

    async fn count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: Option<&str>) -> Session {
        if let Some(id) = session_id {
            if let Some(existing) = self.sessions.read().await.get(id) {
                return existing.clone();
            }
        }
        let session = Session::new(session_id.map(String::from));
        self.sessions
            .write()
            .await
            .entry(session.session_id.clone())
            .or_insert_with(|| session.clone())
            .clone()
    }

    async fn save(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
