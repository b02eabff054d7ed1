//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RESQ__*` 覆盖（双下划线表示嵌套，如 `RESQ__LLM__BACKOFF_SECS=10`）。
//! 模型链与流水线顺序也接受逗号分隔的环境变量值（`RESQ__LLM__CHAINS__DISPATCH=a,b`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::{InvokerConfig, ModelChain};
use crate::planner::PlannerOptions;

/// Gemini 的 OpenAI 兼容端点
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub pipeline: PipelineSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
}

fn default_app_name() -> String {
    "resq".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

/// [llm] 段：开关、凭据、端点、退避窗口与单次请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 未设置时依次读取环境变量 API_KEY、OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 遇到限流后整体停用 LLM 的秒数
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub chains: ChainsSection,
}

fn default_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_backoff_secs() -> u64 {
    45
}

fn default_request_timeout_secs() -> u64 {
    20
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: None,
            base_url: default_base_url(),
            backoff_secs: default_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            chains: ChainsSection::default(),
        }
    }
}

impl LlmSection {
    /// 配置值优先，其次环境变量；空字符串视为未设置
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            enabled: self.enabled,
            has_credential: self.resolved_api_key().is_some(),
            backoff: Duration::from_secs(self.backoff_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// [llm.chains] 段：各角色的有序模型列表
#[derive(Debug, Clone, Deserialize)]
pub struct ChainsSection {
    #[serde(default = "default_dispatch_chain")]
    pub dispatch: Vec<String>,
    #[serde(default = "default_resource_chain")]
    pub resource: Vec<String>,
    #[serde(default = "default_summary_chain")]
    pub summary: Vec<String>,
}

fn default_dispatch_chain() -> Vec<String> {
    vec![
        "gemini-2.5-flash".into(),
        "gemini-1.5-flash".into(),
        "gemini-lite".into(),
    ]
}

fn default_resource_chain() -> Vec<String> {
    vec![
        "gemini-2.5-pro".into(),
        "gemini-1.5-pro".into(),
        "gemini-1.5-flash".into(),
    ]
}

fn default_summary_chain() -> Vec<String> {
    default_dispatch_chain()
}

impl Default for ChainsSection {
    fn default() -> Self {
        Self {
            dispatch: default_dispatch_chain(),
            resource: default_resource_chain(),
            summary: default_summary_chain(),
        }
    }
}

impl ChainsSection {
    pub fn dispatch_chain(&self) -> Result<ModelChain, AgentError> {
        ModelChain::new("dispatch", self.dispatch.clone())
    }

    pub fn resource_chain(&self) -> Result<ModelChain, AgentError> {
        ModelChain::new("resource", self.resource.clone())
    }

    pub fn summary_chain(&self) -> Result<ModelChain, AgentError> {
        ModelChain::new("summary", self.summary.clone())
    }
}

/// [planner] 段：兜底规划参数
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// 固定种子后规划结果可复现
    pub seed: Option<u64>,
}

fn default_top_n() -> usize {
    2
}

fn default_jitter() -> bool {
    true
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            jitter: default_jitter(),
            seed: None,
        }
    }
}

impl PlannerSection {
    pub fn options(&self) -> PlannerOptions {
        PlannerOptions {
            top_n: self.top_n.max(1),
            jitter: self.jitter,
            seed: self.seed,
        }
    }
}

/// [pipeline] 段：Agent 顺序与决策历史容量
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_agents")]
    pub agents: Vec<String>,
    #[serde(default = "default_decision_history")]
    pub decision_history: usize,
}

fn default_agents() -> Vec<String> {
    vec![
        "dispatch".into(),
        "resource".into(),
        "summary".into(),
        "decision".into(),
    ]
}

fn default_decision_history() -> usize {
    crate::memory::DEFAULT_HISTORY_CAPACITY
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            decision_history: default_decision_history(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 RESQ__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RESQ__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(env_source());

    let c = builder.build()?;
    c.try_deserialize()
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("RESQ")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("llm.chains.dispatch")
        .with_list_parse_key("llm.chains.resource")
        .with_list_parse_key("llm.chains.summary")
        .with_list_parse_key("pipeline.agents")
}
