//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按模型名预设回复（成功文本或错误），并记录每次调用的模型名，便于断言降级顺序与调用次数。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

/// Mock 客户端：未预设的模型返回 default 回复
#[derive(Debug)]
pub struct MockLlmClient {
    replies: HashMap<String, Result<String, LlmError>>,
    default_reply: Result<String, LlmError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            default_reply: Err(LlmError::Api("mock backend: no scripted reply".to_string())),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 所有模型都返回同一段文本
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new().with_default(Ok(text.into()))
    }

    /// 所有模型都返回同一个错误
    pub fn failing(err: LlmError) -> Self {
        Self::new().with_default(Err(err))
    }

    pub fn with_default(mut self, reply: Result<String, LlmError>) -> Self {
        self.default_reply = reply;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, reply: Result<String, LlmError>) -> Self {
        self.replies.insert(model.into(), reply);
        self
    }

    /// 每次调用前先等待，用于触发调用方超时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 按调用顺序返回被请求的模型名
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .get(model)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}
