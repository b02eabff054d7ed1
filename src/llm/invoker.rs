//! 弹性调用器：按模型链顺序降级 + 全局限流退避
//!
//! - 可用性闸门：无凭据、被禁用、或处于退避窗口内时直接返回 Disabled，不发任何网络请求
//! - 按链顺序每个模型只试一次（带超时），首个非空文本即返回
//! - 任一错误被归类为限流时，武装进程级退避：backoff_until = now + window（所有 Agent、所有链共享）

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::AgentError;
use crate::llm::{Clock, LlmClient, LlmError, SystemClock};

/// 配置的退避窗口超出 Instant 可表示范围时改用的上限
pub const MAX_BACKOFF_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// 模型链：有序、非空的模型名列表，每个 Agent 角色各自一条
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    role: String,
    models: Vec<String>,
}

impl ModelChain {
    pub fn new(role: impl Into<String>, models: Vec<String>) -> Result<Self, AgentError> {
        let role = role.into();
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(AgentError::EmptyModelChain(role));
        }
        Ok(Self { role, models })
    }

    /// 解析逗号分隔的模型列表（"a, b,c"）
    pub fn parse(role: impl Into<String>, value: &str) -> Result<Self, AgentError> {
        Self::new(role, value.split(',').map(String::from).collect())
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// 管理开关；false 时永远返回 Disabled
    pub enabled: bool,
    /// 是否配置了 API 凭据
    pub has_credential: bool,
    /// 限流后的退避窗口
    pub backoff: Duration,
    /// 单个模型单次请求的超时
    pub request_timeout: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            has_credential: false,
            backoff: Duration::from_secs(45),
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// 单次调用结果：下游按标签分支，而不是按字符串前缀匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Text(String),
    /// 链上至少一次失败被归类为限流，detail 为最后一个错误
    RateLimited(String),
    TransientError(String),
    Disabled,
}

impl InvokeOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            InvokeOutcome::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// 用于日志与 trace 的文本形式；失败时带 "[LLM" 前缀
    pub fn sentinel(&self) -> String {
        match self {
            InvokeOutcome::Text(t) => t.clone(),
            InvokeOutcome::Disabled => "[LLM disabled]".to_string(),
            InvokeOutcome::RateLimited(detail) | InvokeOutcome::TransientError(detail) => {
                format!("[LLM error: {}]", detail)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub outcome: InvokeOutcome,
    /// 给出文本的模型
    pub model: Option<String>,
    /// 本次调用中最后一次失败的错误信息（即使最终成功也保留）
    pub last_error: Option<String>,
    /// 实际发出的后端请求数
    pub attempts: usize,
}

impl Invocation {
    fn disabled() -> Self {
        Self {
            outcome: InvokeOutcome::Disabled,
            model: None,
            last_error: None,
            attempts: 0,
        }
    }
}

pub struct ResilientInvoker {
    client: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    config: InvokerConfig,
    backoff_until: Mutex<Option<Instant>>,
}

impl ResilientInvoker {
    pub fn new(client: Arc<dyn LlmClient>, config: InvokerConfig) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            config,
            backoff_until: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// 退避窗口剩余时间；不在退避中返回 None
    pub fn backoff_remaining(&self) -> Option<Duration> {
        let until = (*self.backoff_until.lock().unwrap_or_else(|e| e.into_inner()))?;
        let now = self.clock.now();
        (now < until).then(|| until - now)
    }

    pub fn is_available(&self) -> bool {
        self.config.has_credential && self.config.enabled && self.backoff_remaining().is_none()
    }

    /// 限流类错误武装退避；其他错误无副作用
    fn trip_backoff(&self, err: &LlmError) -> bool {
        if !err.is_rate_limited() {
            return false;
        }
        let now = self.clock.now();
        let until = now
            .checked_add(self.config.backoff)
            .or_else(|| now.checked_add(MAX_BACKOFF_WINDOW))
            .unwrap_or(now);
        *self.backoff_until.lock().unwrap_or_else(|e| e.into_inner()) = Some(until);
        tracing::warn!(
            backoff_secs = (until - now).as_secs(),
            error = %err,
            "LLM backoff engaged"
        );
        true
    }

    pub async fn invoke(&self, prompt: &str, chain: &ModelChain) -> Invocation {
        if !self.is_available() {
            tracing::debug!(chain = chain.role(), "LLM unavailable, skipping call");
            return Invocation::disabled();
        }

        let mut last_error: Option<String> = None;
        let mut rate_limited = false;
        let mut attempts = 0;

        for model in chain.models() {
            attempts += 1;
            let result = tokio::time::timeout(
                self.config.request_timeout,
                self.client.generate(model, prompt),
            )
            .await
            .unwrap_or_else(|_| {
                Err(LlmError::Timeout {
                    model: model.clone(),
                    secs: self.config.request_timeout.as_secs(),
                })
            });

            let err = match result {
                Ok(text) if !text.trim().is_empty() => {
                    return Invocation {
                        outcome: InvokeOutcome::Text(text.trim().to_string()),
                        model: Some(model.clone()),
                        last_error,
                        attempts,
                    };
                }
                Ok(_) => LlmError::EmptyResponse(model.clone()),
                Err(e) => e,
            };

            tracing::error!(chain = chain.role(), model = %model, error = %err, "LLM call failed");
            rate_limited |= self.trip_backoff(&err);
            last_error = Some(err.to_string());
        }

        let detail = last_error.clone().unwrap_or_else(|| "unavailable".to_string());
        let outcome = if rate_limited {
            InvokeOutcome::RateLimited(detail)
        } else {
            InvokeOutcome::TransientError(detail)
        };
        Invocation {
            outcome,
            model: None,
            last_error,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ManualClock, MockLlmClient};

    fn chain(models: &[&str]) -> ModelChain {
        ModelChain::new("test", models.iter().map(|m| m.to_string()).collect()).unwrap()
    }

    fn config() -> InvokerConfig {
        InvokerConfig {
            has_credential: true,
            ..InvokerConfig::default()
        }
    }

    #[test]
    fn test_model_chain_rejects_empty() {
        assert!(ModelChain::new("dispatch", vec![]).is_err());
        assert!(ModelChain::parse("dispatch", " , ,").is_err());
        let parsed = ModelChain::parse("dispatch", "a, b,c").unwrap();
        assert_eq!(parsed.models(), &["a", "b", "c"]);
        assert_eq!(parsed.role(), "dispatch");
    }

    #[tokio::test]
    async fn test_no_credential_makes_no_calls() {
        let mock = Arc::new(MockLlmClient::replying("hello"));
        let invoker = ResilientInvoker::new(mock.clone(), InvokerConfig::default());
        let inv = invoker.invoke("p", &chain(&["a"])).await;
        assert_eq!(inv.outcome, InvokeOutcome::Disabled);
        assert_eq!(inv.attempts, 0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_flag_makes_no_calls() {
        let mock = Arc::new(MockLlmClient::replying("hello"));
        let cfg = InvokerConfig {
            enabled: false,
            ..config()
        };
        let invoker = ResilientInvoker::new(mock.clone(), cfg);
        let inv = invoker.invoke("p", &chain(&["a"])).await;
        assert_eq!(inv.outcome.sentinel(), "[LLM disabled]");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_first_success_is_trimmed_and_stops() {
        let mock = Arc::new(MockLlmClient::replying("  answer \n"));
        let invoker = ResilientInvoker::new(mock.clone(), config());
        let inv = invoker.invoke("p", &chain(&["a", "b"])).await;
        assert_eq!(inv.outcome, InvokeOutcome::Text("answer".into()));
        assert_eq!(inv.model.as_deref(), Some("a"));
        assert_eq!(mock.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_later_model() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_model("A", Err(LlmError::Api("A exploded".into())))
                .with_model("B", Err(LlmError::Api("B exploded".into())))
                .with_model("C", Ok("from C".into())),
        );
        let invoker = ResilientInvoker::new(mock.clone(), config());
        let inv = invoker.invoke("p", &chain(&["A", "B", "C"])).await;
        assert_eq!(inv.outcome.text(), Some("from C"));
        assert_eq!(inv.last_error.as_deref(), Some("B exploded"));
        assert_eq!(inv.attempts, 3);
        assert_eq!(mock.calls(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_all_fail_encodes_last_error() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_model("A", Err(LlmError::Api("first".into())))
                .with_model("B", Err(LlmError::Api("second".into()))),
        );
        let invoker = ResilientInvoker::new(mock, config());
        let inv = invoker.invoke("p", &chain(&["A", "B"])).await;
        assert_eq!(inv.outcome, InvokeOutcome::TransientError("second".into()));
        assert!(inv.outcome.sentinel().starts_with("[LLM error: second"));
    }

    #[tokio::test]
    async fn test_empty_text_moves_to_next_model() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_model("A", Ok("   ".into()))
                .with_model("B", Ok("ok".into())),
        );
        let invoker = ResilientInvoker::new(mock, config());
        let inv = invoker.invoke("p", &chain(&["A", "B"])).await;
        assert_eq!(inv.outcome.text(), Some("ok"));
        assert_eq!(inv.last_error.as_deref(), Some("empty response from A"));
    }

    #[tokio::test]
    async fn test_rate_limit_arms_backoff_until_window_elapses() {
        let clock = Arc::new(ManualClock::new());
        let mock = Arc::new(MockLlmClient::failing(LlmError::classify(
            "429 Resource has been exhausted (check quota)",
        )));
        let cfg = InvokerConfig {
            backoff: Duration::from_secs(45),
            ..config()
        };
        let invoker = ResilientInvoker::new(mock.clone(), cfg).with_clock(clock.clone());

        let first = invoker.invoke("p", &chain(&["A"])).await;
        assert!(matches!(first.outcome, InvokeOutcome::RateLimited(_)));
        assert_eq!(mock.call_count(), 1);

        clock.advance(Duration::from_secs(44));
        let second = invoker.invoke("p", &chain(&["A", "B"])).await;
        assert_eq!(second.outcome, InvokeOutcome::Disabled);
        assert_eq!(mock.call_count(), 1);

        clock.advance(Duration::from_secs(2));
        assert!(invoker.is_available());
        let _third = invoker.invoke("p", &chain(&["A"])).await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_huge_backoff_is_capped_instead_of_overflowing() {
        let mock = Arc::new(MockLlmClient::failing(LlmError::RateLimited("429".into())));
        let cfg = InvokerConfig {
            backoff: Duration::from_secs(u64::MAX),
            ..config()
        };
        let invoker = ResilientInvoker::new(mock, cfg).with_clock(Arc::new(ManualClock::new()));

        let inv = invoker.invoke("p", &chain(&["A"])).await;
        assert!(matches!(inv.outcome, InvokeOutcome::RateLimited(_)));
        assert!(!invoker.is_available());
        assert_eq!(invoker.backoff_remaining(), Some(MAX_BACKOFF_WINDOW));
    }

    #[tokio::test]
    async fn test_plain_error_does_not_arm_backoff() {
        let mock = Arc::new(MockLlmClient::failing(LlmError::Api("bad gateway".into())));
        let invoker = ResilientInvoker::new(mock, config());
        invoker.invoke("p", &chain(&["A"])).await;
        assert!(invoker.backoff_remaining().is_none());
    }

    #[tokio::test]
    async fn test_slow_model_times_out_and_falls_through() {
        let slow = Arc::new(MockLlmClient::replying("late").with_delay(Duration::from_millis(300)));
        let cfg = InvokerConfig {
            request_timeout: Duration::from_millis(20),
            ..config()
        };
        let invoker = ResilientInvoker::new(slow.clone(), cfg);
        let inv = invoker.invoke("p", &chain(&["A", "B"])).await;
        assert!(matches!(inv.outcome, InvokeOutcome::TransientError(_)));
        assert!(inv.last_error.unwrap().contains("timed out"));
        assert_eq!(slow.call_count(), 2);
    }
}
