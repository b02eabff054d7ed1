//! 流水线构建器：统一的初始化逻辑
//!
//! 按配置创建 LLM 客户端、共享的弹性调用器、单位存储与兜底规划器，再按 `pipeline.agents` 的顺序组装 Agent。
//! CLI 与集成测试共用同一套构建路径。

use std::path::PathBuf;
use std::sync::Arc;

use crate::agents::{
    Agent, DecisionAgent, DispatchAgent, ResourceAgent, SummaryAgent, DECISION_AGENT_NAME,
    DISPATCH_AGENT_NAME, RESOURCE_AGENT_NAME, SUMMARY_AGENT_NAME,
};
use serde_json::Value;

use crate::config::AppConfig;
use crate::core::envelope::{field_str, Content, Envelope};
use crate::core::{AgentError, Orchestrator, USER_SENDER};
use crate::llm::{Clock, LlmClient, MockLlmClient, OpenAiClient, ResilientInvoker};
use crate::memory::Session;
use crate::planner::{FallbackPlanner, InMemoryUnitStore, UnitStore};
use crate::state::{InMemoryIncidentStore, InMemorySessionStore, IncidentStore, SessionStore};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match cfg.llm.resolved_api_key() {
        Some(key) => {
            tracing::info!(base_url = %cfg.llm.base_url, "Using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::new(Some(&cfg.llm.base_url), &key))
        }
        None => {
            tracing::warn!("No API key set, LLM disabled; agents will use the offline planner");
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 组装完成的流水线及其共享组件
pub struct Pipeline {
    pub orchestrator: Orchestrator,
    pub invoker: Arc<ResilientInvoker>,
    pub planner: Arc<FallbackPlanner>,
    pub units: Arc<dyn UnitStore>,
    /// 同一个实例也在 orchestrator 中（若配置包含 decision），用于查询决策历史
    pub decision: Arc<DecisionAgent>,
    pub incidents: Arc<dyn IncidentStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Pipeline {
    /// 登记事件、跑完整条流水线，并把会话写回会话存储
    pub async fn submit_incident(&self, incident: Content, session_id: Option<&str>) -> (Envelope, Session) {
        let record = self.incidents.add(incident).await;
        let mut session = self.sessions.get_or_create(session_id).await;
        let envelope = self.orchestrator.run_incident(record, Some(&mut session)).await;
        self.sessions.save(session.clone()).await;
        (envelope, session)
    }

    /// 操作员决策：未给出事件 ID 时取最近登记的事件
    pub async fn decide(&self, action: &str, incident_id: Option<&str>, session_id: Option<&str>) -> Envelope {
        let incident = match incident_id {
            Some(id) => self
                .incidents
                .list()
                .await
                .into_iter()
                .find(|i| field_str(i, "id").as_deref() == Some(id)),
            None => self.incidents.latest().await,
        };
        let incident_id = incident_id
            .map(String::from)
            .or_else(|| incident.as_ref().and_then(|i| field_str(i, "id")).map(|s| s.into_owned()));

        let mut content = Content::new();
        content.insert("action".to_string(), Value::String(action.to_string()));
        if let Some(id) = incident_id {
            content.insert("incident_id".to_string(), Value::String(id));
        }
        if let Some(incident) = incident {
            content.insert("incident".to_string(), Value::Object(incident));
        }

        let mut session = self.sessions.get_or_create(session_id).await;
        let envelope = Envelope::new(content).with_sender(USER_SENDER);
        let envelope = self.decision.handle_envelope(envelope, Some(&mut session)).await;
        self.sessions.save(session).await;
        self.incidents.record_decision().await;
        envelope
    }
}

pub struct PipelineBuilder {
    config: AppConfig,
    client: Option<Arc<dyn LlmClient>>,
    clock: Option<Arc<dyn Clock>>,
    units: Option<Arc<dyn UnitStore>>,
    incidents: Option<Arc<dyn IncidentStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: None,
            clock: None,
            units: None,
            incidents: None,
            sessions: None,
        }
    }

    /// 注入客户端（测试或自定义后端）；注入的客户端视为自带凭据
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_units(mut self, units: Arc<dyn UnitStore>) -> Self {
        self.units = Some(units);
        self
    }

    pub fn with_incidents(mut self, incidents: Arc<dyn IncidentStore>) -> Self {
        self.incidents = Some(incidents);
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build(self) -> Result<Pipeline, AgentError> {
        let cfg = &self.config;

        let mut invoker_config = cfg.llm.invoker_config();
        let client = match self.client {
            Some(client) => {
                invoker_config.has_credential = true;
                client
            }
            None => create_llm_from_config(cfg),
        };
        let mut invoker = ResilientInvoker::new(client, invoker_config);
        if let Some(clock) = self.clock {
            invoker = invoker.with_clock(clock);
        }
        let invoker = Arc::new(invoker);

        let units: Arc<dyn UnitStore> = self
            .units
            .unwrap_or_else(|| Arc::new(InMemoryUnitStore::default()));
        let planner = Arc::new(FallbackPlanner::new(units.clone(), cfg.planner.options()));
        let decision = Arc::new(
            DecisionAgent::new(DECISION_AGENT_NAME, cfg.pipeline.decision_history)
                .with_units(units.clone()),
        );

        let mut agents: Vec<Arc<dyn Agent>> = Vec::with_capacity(cfg.pipeline.agents.len());
        for name in &cfg.pipeline.agents {
            let agent: Arc<dyn Agent> = match name.trim().to_lowercase().as_str() {
                "dispatch" => Arc::new(DispatchAgent::new(
                    DISPATCH_AGENT_NAME,
                    invoker.clone(),
                    cfg.llm.chains.dispatch_chain()?,
                    planner.clone(),
                )),
                "resource" => Arc::new(ResourceAgent::new(
                    RESOURCE_AGENT_NAME,
                    invoker.clone(),
                    cfg.llm.chains.resource_chain()?,
                    planner.clone(),
                )),
                "summary" => Arc::new(SummaryAgent::new(
                    SUMMARY_AGENT_NAME,
                    invoker.clone(),
                    cfg.llm.chains.summary_chain()?,
                )),
                "decision" => decision.clone(),
                _ => return Err(AgentError::UnknownAgent(name.clone())),
            };
            agents.push(agent);
        }

        let orchestrator = Orchestrator::new(agents);
        tracing::info!(agents = ?orchestrator.agent_names(), "pipeline assembled");

        Ok(Pipeline {
            orchestrator,
            invoker,
            planner,
            units,
            decision,
            incidents: self
                .incidents
                .unwrap_or_else(|| Arc::new(InMemoryIncidentStore::new())),
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
        })
    }
}

/// 便捷函数：从默认路径加载配置并创建构建器；加载失败时使用默认配置
pub fn create_pipeline_builder(config_path: Option<PathBuf>) -> PipelineBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    PipelineBuilder::new(config)
}
