//! Resource Agent：推荐出动资源列表 + 资源摘要
//!
//! 资源列表为空、带失败哨兵、或摘要为空时整体替换为离线规划的排序结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::parse::{parse_structured, schema_hint, ResourceReply};
use crate::agents::traits::{incident_of, Agent};
use crate::core::envelope::{Content, Envelope};
use crate::core::recovery::{FallbackReason, Provenance};
use crate::llm::{ModelChain, ResilientInvoker};
use crate::memory::{FactMemory, Session};
use crate::observability::log_event;
use crate::planner::FallbackPlanner;

pub const RESOURCE_AGENT_NAME: &str = "Resource-Agent";

pub struct ResourceAgent {
    name: String,
    invoker: Arc<ResilientInvoker>,
    chain: ModelChain,
    planner: Arc<FallbackPlanner>,
    memory: FactMemory,
}

impl ResourceAgent {
    pub fn new(
        name: impl Into<String>,
        invoker: Arc<ResilientInvoker>,
        chain: ModelChain,
        planner: Arc<FallbackPlanner>,
    ) -> Self {
        Self {
            name: name.into(),
            invoker,
            chain,
            planner,
            memory: FactMemory::new(),
        }
    }

    pub fn memory(&self) -> &FactMemory {
        &self.memory
    }

    fn prompt(incident: &Content) -> String {
        format!(
            "You are a resource allocation agent. Given this incident: {}, \
             list the best resources or units to send. \
             Respond with only a JSON object with a 'resources' list and a 'summary' string, \
             matching this JSON Schema: {}",
            Value::Object(incident.clone()),
            schema_hint::<ResourceReply>()
        )
    }

    fn usable(reply: &ResourceReply) -> bool {
        !reply.resources.is_empty()
            && reply
                .resources
                .iter()
                .all(|r| !r.trim().is_empty() && !r.starts_with("[LLM"))
            && !reply.summary.trim().is_empty()
    }

    /// 返回 (resources, resource_summary, 来源)
    pub async fn allocate(&self, incident: &Content) -> (Vec<String>, String, Provenance) {
        let invocation = self.invoker.invoke(&Self::prompt(incident), &self.chain).await;

        let reason = match FallbackReason::from_outcome(&invocation.outcome) {
            Some(reason) => reason,
            None => {
                let text = invocation.outcome.text().unwrap_or_default();
                match parse_structured::<ResourceReply>(text) {
                    Some(reply) if Self::usable(&reply) => {
                        let summary = reply.summary.trim().to_string();
                        return (reply.resources, summary, Provenance::Llm);
                    }
                    Some(_) => FallbackReason::Incomplete,
                    None => FallbackReason::Malformed,
                }
            }
        };

        tracing::info!(
            agent = %self.name,
            reason = %reason,
            detail = %invocation.outcome.sentinel(),
            "resource allocation falling back to planner"
        );
        let plan = self.planner.plan(incident);
        (plan.resources, plan.resource_summary, Provenance::Planner(reason))
    }
}

#[async_trait]
impl Agent for ResourceAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_envelope(&self, mut envelope: Envelope, session: Option<&mut Session>) -> Envelope {
        let incident = incident_of(&envelope);
        let (resources, resource_summary, provenance) = self.allocate(&incident).await;

        let incident_value = Value::Object(incident);
        log_event(
            "resource_allocation",
            &json!({"incident": incident_value, "resources": resources}),
        );
        self.memory
            .add_fact(json!({"incident": incident_value, "resources": resources}));
        if let Some(session) = session {
            session.add_turn(incident_value.to_string(), resource_summary.clone());
        }

        envelope.insert("resources", json!(resources));
        envelope.insert("resource_summary", resource_summary.clone());
        envelope.add_trace(
            self.name.clone(),
            provenance.annotate(json!({
                "resources": resources,
                "resource_summary": resource_summary,
            })),
        );
        envelope
    }
}
