//! Dispatch Agent：事件摘要 + 推荐单位
//!
//! LLM 输出只在结构完整时作为优化使用；解析失败或任一字段为空时以离线规划结果为准。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::parse::{parse_structured, schema_hint, DispatchReply};
use crate::agents::traits::{incident_of, Agent};
use crate::core::envelope::{Content, Envelope};
use crate::core::recovery::{FallbackReason, Provenance};
use crate::llm::{ModelChain, ResilientInvoker};
use crate::memory::{FactMemory, Session};
use crate::observability::log_event;
use crate::planner::FallbackPlanner;

pub const DISPATCH_AGENT_NAME: &str = "ResQ-Agent";

pub struct DispatchAgent {
    name: String,
    invoker: Arc<ResilientInvoker>,
    chain: ModelChain,
    planner: Arc<FallbackPlanner>,
    memory: FactMemory,
}

impl DispatchAgent {
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
            "You are a dispatch agent. Given this incident: {}, \
             summarize the situation and recommend the best unit to deploy. \
             Respond with only a JSON object with 'summary' and 'recommendation', \
             matching this JSON Schema: {}",
            Value::Object(incident.clone()),
            schema_hint::<DispatchReply>()
        )
    }

    /// 返回 (summary, recommendation, 来源)
    pub async fn plan_dispatch(&self, incident: &Content) -> (String, String, Provenance) {
        let invocation = self.invoker.invoke(&Self::prompt(incident), &self.chain).await;

        let reason = match FallbackReason::from_outcome(&invocation.outcome) {
            Some(reason) => reason,
            None => {
                let text = invocation.outcome.text().unwrap_or_default();
                match parse_structured::<DispatchReply>(text) {
                    Some(reply)
                        if !reply.summary.trim().is_empty()
                            && !reply.recommendation.trim().is_empty() =>
                    {
                        return (
                            reply.summary.trim().to_string(),
                            reply.recommendation.trim().to_string(),
                            Provenance::Llm,
                        );
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
            "dispatch falling back to planner"
        );
        let plan = self.planner.plan(incident);
        (plan.summary, plan.recommendation, Provenance::Planner(reason))
    }
}

#[async_trait]
impl Agent for DispatchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_envelope(&self, mut envelope: Envelope, session: Option<&mut Session>) -> Envelope {
        let incident = incident_of(&envelope);
        let (summary, recommendation, provenance) = self.plan_dispatch(&incident).await;

        let incident_value = Value::Object(incident);
        log_event(
            "handle_incident",
            &json!({
                "incident": incident_value,
                "summary": summary,
                "recommendation": recommendation,
            }),
        );
        self.memory
            .add_fact(json!({"incident": incident_value, "summary": summary}));
        if let Some(session) = session {
            session.add_turn(incident_value.to_string(), recommendation.clone());
        }

        envelope.insert("incident", incident_value);
        envelope.insert("summary", summary.clone());
        envelope.insert("recommendation", recommendation.clone());
        envelope.add_trace(
            self.name.clone(),
            provenance.annotate(json!({"summary": summary, "recommendation": recommendation})),
        );
        envelope
    }
}
