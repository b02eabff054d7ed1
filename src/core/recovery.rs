//! 兜底原因：把一次 LLM 调用（及其解析）映射为是否需要走离线规划、以及为什么
//!
//! 三类情况（后端禁用 / 后端出错 / 返回了语义上为空的数据）都降级到同一条确定性路径，
//! 只是在 trace 与日志里区分原因。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::InvokeOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// 无凭据、被禁用或处于退避窗口
    Disabled,
    RateLimited,
    BackendError,
    /// 返回了文本但不是期望的结构
    Malformed,
    /// 结构正确但字段为空
    Incomplete,
}

impl FallbackReason {
    /// 调用本身失败时的原因；拿到文本时返回 None（是否可用由解析决定）
    pub fn from_outcome(outcome: &InvokeOutcome) -> Option<Self> {
        match outcome {
            InvokeOutcome::Text(_) => None,
            InvokeOutcome::Disabled => Some(FallbackReason::Disabled),
            InvokeOutcome::RateLimited(_) => Some(FallbackReason::RateLimited),
            InvokeOutcome::TransientError(_) => Some(FallbackReason::BackendError),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::RateLimited => "rate_limited",
            FallbackReason::BackendError => "backend_error",
            FallbackReason::Malformed => "malformed",
            FallbackReason::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结果来源：LLM 或离线规划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Llm,
    Planner(FallbackReason),
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Planner(_))
    }

    /// 合并进 trace message 的字段：{"source": ..., "fallback_reason": ...}
    pub fn annotate(&self, mut message: Value) -> Value {
        if let Value::Object(map) = &mut message {
            match self {
                Provenance::Llm => {
                    map.insert("source".into(), json!("llm"));
                }
                Provenance::Planner(reason) => {
                    map.insert("source".into(), json!("planner"));
                    map.insert("fallback_reason".into(), json!(reason.as_str()));
                }
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_outcome() {
        assert_eq!(
            FallbackReason::from_outcome(&InvokeOutcome::Disabled),
            Some(FallbackReason::Disabled)
        );
        assert_eq!(
            FallbackReason::from_outcome(&InvokeOutcome::RateLimited("429".into())),
            Some(FallbackReason::RateLimited)
        );
        assert_eq!(
            FallbackReason::from_outcome(&InvokeOutcome::TransientError("x".into())),
            Some(FallbackReason::BackendError)
        );
        assert_eq!(FallbackReason::from_outcome(&InvokeOutcome::Text("t".into())), None);
    }

    #[test]
    fn test_annotate() {
        let msg = Provenance::Planner(FallbackReason::Malformed).annotate(json!({"summary": "s"}));
        assert_eq!(msg["source"], "planner");
        assert_eq!(msg["fallback_reason"], "malformed");
        assert_eq!(msg["summary"], "s");

        let msg = Provenance::Llm.annotate(json!({}));
        assert_eq!(msg["source"], "llm");
        assert!(msg.get("fallback_reason").is_none());
    }
}
