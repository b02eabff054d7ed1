//! Summary Agent：为小尺寸调度终端生成 ≤60 字符的告警文本

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::traits::Agent;
use crate::core::envelope::{Content, Envelope};
use crate::core::recovery::{FallbackReason, Provenance};
use crate::llm::{ModelChain, ResilientInvoker};
use crate::memory::Session;
use crate::planner::{clamp_display, format_display_alert};

pub const SUMMARY_AGENT_NAME: &str = "Summary-Agent";

pub struct SummaryAgent {
    name: String,
    invoker: Arc<ResilientInvoker>,
    chain: ModelChain,
}

impl SummaryAgent {
    pub fn new(name: impl Into<String>, invoker: Arc<ResilientInvoker>, chain: ModelChain) -> Self {
        Self {
            name: name.into(),
            invoker,
            chain,
        }
    }

    /// LLM 回复超长时按显示上限截断；调用失败时用确定性公式
    pub async fn summarize_for_display(
        &self,
        summary: &str,
        recommendation: &str,
        urgency: &str,
        incident: &Content,
    ) -> (String, Provenance) {
        let prompt = format!(
            "You are a UI assistant for a tiny dispatch terminal. \
             Given this summary: {summary}\n\
             and this recommendation: {recommendation}\n\
             and this urgency: {urgency}\n\
             Generate a concise, plain-language alert (max 60 chars) for a small screen. \
             Do not include JSON, just the message."
        );
        let invocation = self.invoker.invoke(&prompt, &self.chain).await;

        match FallbackReason::from_outcome(&invocation.outcome) {
            None => {
                let text = invocation.outcome.text().unwrap_or_default();
                (clamp_display(text.trim()), Provenance::Llm)
            }
            Some(reason) => {
                tracing::info!(
                    agent = %self.name,
                    reason = %reason,
                    detail = %invocation.outcome.sentinel(),
                    "display summary using template"
                );
                (
                    format_display_alert(summary, recommendation, incident, Some(urgency)),
                    Provenance::Planner(reason),
                )
            }
        }
    }
}

#[async_trait]
impl Agent for SummaryAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_envelope(&self, mut envelope: Envelope, _session: Option<&mut Session>) -> Envelope {
        let summary = envelope.content_str("summary").unwrap_or_default().to_string();
        let recommendation = envelope
            .content_str("recommendation")
            .unwrap_or_default()
            .to_string();
        let urgency = envelope
            .content_str("urgency")
            .unwrap_or("CRITICAL")
            .to_string();
        let incident = envelope.content_object("incident").cloned().unwrap_or_default();

        let (display_summary, provenance) = self
            .summarize_for_display(&summary, &recommendation, &urgency, &incident)
            .await;

        envelope.insert("display_summary", display_summary.clone());
        envelope.add_trace(
            self.name.clone(),
            provenance.annotate(json!({"display_summary": display_summary})),
        );
        envelope
    }
}
