//! Agent 接口
//!
//! 每个 Agent 读取 content 中的特定键、写入自己的键、追加恰好一条以自身命名的 trace，并返回同一个信封。
//! 编排器只持有 `Arc<dyn Agent>`，不关心具体类型。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::envelope::{Content, Envelope};
use crate::memory::Session;

#[async_trait]
pub trait Agent: Send + Sync {
    /// 写入 trace 与 receiver 的名字
    fn name(&self) -> &str;

    async fn handle_envelope(&self, envelope: Envelope, session: Option<&mut Session>) -> Envelope;

    /// 单独调用：用裸事件构造一次性信封，返回处理后的 content
    async fn handle_incident(&self, incident: Content, session: Option<&mut Session>) -> Content {
        let mut content = Content::new();
        content.insert("incident".to_string(), Value::Object(incident));
        let envelope = Envelope::new(content).with_sender(self.name());
        self.handle_envelope(envelope, session).await.content
    }
}

/// 信封中的事件；缺失时把整个 content 当作事件（Agent 位于流水线首位时）
pub fn incident_of(envelope: &Envelope) -> Content {
    envelope
        .content_object("incident")
        .cloned()
        .unwrap_or_else(|| envelope.content.clone())
}
