//! 文本生成后端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：按模型名发起一次生成请求。

use async_trait::async_trait;
use thiserror::Error;

/// 单次后端调用的错误；RateLimited 会触发全局退避
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("{0}")]
    RateLimited(String),

    #[error("request to {model} timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    #[error("{0}")]
    Api(String),

    #[error("empty response from {0}")]
    EmptyResponse(String),
}

/// 错误信息中出现这些片段即视为限流 / 配额耗尽
const RATE_LIMIT_MARKERS: [&str; 4] = ["429", "quota", "rate limit", "too many requests"];

impl LlmError {
    /// 只拿得到错误文本的客户端用它归类
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_rate_limit_message(&message) {
            LlmError::RateLimited(message)
        } else {
            LlmError::Api(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimited(_) => true,
            LlmError::Api(msg) => is_rate_limit_message(msg),
            _ => false,
        }
    }
}

pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// LLM 客户端 trait：对指定模型发一次生成请求，返回原始文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    /// 累计 token 使用：(prompt_tokens, completion_tokens, total_tokens)，默认 (0, 0, 0)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
