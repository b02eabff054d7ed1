//! Decision Agent：校验操作员动作并记入有界历史
//!
//! 合法动作只有 SEND 与 HOLD。配置了单位存储时，SEND 会把信封中 `resources` 列出的单位标记为已出动。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::agents::traits::Agent;
use crate::core::envelope::{field_str, Content, Envelope};
use crate::memory::{DecisionHistory, DecisionRecord, DecisionStatus, Session};
use crate::observability::log_event;
use crate::planner::UnitStore;

pub const DECISION_AGENT_NAME: &str = "Decision-Agent";

const VALID_ACTIONS: [&str; 2] = ["SEND", "HOLD"];

pub struct DecisionAgent {
    name: String,
    history: DecisionHistory,
    units: Option<Arc<dyn UnitStore>>,
}

impl DecisionAgent {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            history: DecisionHistory::new(capacity),
            units: None,
        }
    }

    pub fn with_units(mut self, units: Arc<dyn UnitStore>) -> Self {
        self.units = Some(units);
        self
    }

    /// 最近的决策，最旧在前
    pub fn history(&self) -> Vec<DecisionRecord> {
        self.history.snapshot()
    }

    pub fn handle_decision(&self, action: Option<&str>, incident_id: Option<&str>) -> DecisionRecord {
        let (status, message) = match action {
            Some(a) if VALID_ACTIONS.contains(&a) => {
                (DecisionStatus::Success, format!("Action {} processed", a))
            }
            Some(a) => (DecisionStatus::Error, format!("Unknown action: {}", a)),
            None => (DecisionStatus::Error, "Unknown action: <missing>".to_string()),
        };

        let record = DecisionRecord {
            action: action.map(String::from),
            status,
            message,
            incident_id: incident_id.map(String::from),
            timestamp: Utc::now().to_rfc3339(),
        };
        self.history.push(record.clone());

        if status == DecisionStatus::Error {
            tracing::warn!(action = ?action, "rejected operator decision");
        }
        record
    }

    /// 逐个通知出动；被其他事件占用或未知的单位跳过
    fn dispatch_units(&self, units: &dyn UnitStore, resources: &[String], incident: &Content) -> Vec<String> {
        resources
            .iter()
            .filter_map(|unit_id| match units.notify_dispatch(unit_id, incident) {
                Ok(record) => {
                    log_event("dispatch", &json!(record));
                    Some(record.unit_id)
                }
                Err(e) => {
                    tracing::warn!(unit = %unit_id, error = %e, "unit not dispatched");
                    None
                }
            })
            .collect()
    }
}

impl Default for DecisionAgent {
    fn default() -> Self {
        Self::new(DECISION_AGENT_NAME, crate::memory::DEFAULT_HISTORY_CAPACITY)
    }
}

#[async_trait]
impl Agent for DecisionAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_envelope(&self, mut envelope: Envelope, _session: Option<&mut Session>) -> Envelope {
        let mut incident = envelope.content_object("incident").cloned().unwrap_or_default();
        let action = field_str(&envelope.content, "action").map(|s| s.into_owned());
        let incident_id = field_str(&envelope.content, "incident_id")
            .or_else(|| field_str(&incident, "id"))
            .map(|s| s.into_owned());

        let record = self.handle_decision(action.as_deref(), incident_id.as_deref());

        envelope.insert("decision_status", record.status.as_str());
        envelope.insert("decision_message", record.message.clone());

        if record.status == DecisionStatus::Success && record.action.as_deref() == Some("SEND") {
            if let Some(units) = &self.units {
                let resources: Vec<String> = envelope
                    .content
                    .get("resources")
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                if let Some(id) = &incident_id {
                    incident.insert("id".to_string(), Value::String(id.clone()));
                }
                let dispatched = self.dispatch_units(units.as_ref(), &resources, &incident);
                envelope.insert("dispatched_units", json!(dispatched));
            }
        }

        envelope.add_trace(self.name.clone(), json!(record));
        envelope
    }
}
