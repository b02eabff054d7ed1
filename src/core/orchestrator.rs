//! 编排器：按固定顺序把信封依次交给每个 Agent
//!
//! 每一跳之前 `sender = 上一跳的 receiver`、`receiver = 当前 Agent 名`，然后用 Agent 返回的信封替换工作信封。
//! 编排器自身不重试、不设超时、没有状态机；容错全部在 Agent 内部完成，因此一次运行总能产出完整信封。

use std::sync::Arc;

use serde_json::Value;

use crate::agents::Agent;
use crate::core::envelope::{field_str, Content, Envelope};
use crate::memory::Session;

/// 信封初始发送方
pub const USER_SENDER: &str = "user";

pub struct Orchestrator {
    agents: Vec<Arc<dyn Agent>>,
}

impl Orchestrator {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self { agents }
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// 按顺序运行全部 Agent，返回最终信封
    pub async fn orchestrate(&self, mut envelope: Envelope, mut session: Option<&mut Session>) -> Envelope {
        for agent in &self.agents {
            envelope.sender = envelope.receiver.take();
            envelope.receiver = Some(agent.name().to_string());
            tracing::debug!(agent = agent.name(), "handing envelope to agent");
            envelope = agent.handle_envelope(envelope, session.as_deref_mut()).await;
        }
        envelope
    }

    /// 以裸事件启动一次完整运行：content 为 {incident, urgency}，发送方为 user
    pub async fn run_incident(&self, incident: Content, session: Option<&mut Session>) -> Envelope {
        let urgency = field_str(&incident, "urgency")
            .map(|s| s.into_owned())
            .unwrap_or_else(|| "CRITICAL".to_string());

        let mut content = Content::new();
        content.insert("incident".to_string(), Value::Object(incident));
        content.insert("urgency".to_string(), Value::String(urgency));

        let envelope = Envelope::new(content).with_sender(USER_SENDER);
        self.orchestrate(envelope, session).await
    }
}
