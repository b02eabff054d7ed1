//! LLM 结构化输出解析
//!
//! 模型常把 JSON 包在 ```json 代码块里或夹在说明文字中，先抽出 JSON 片段再反序列化；
//! 期望的结构用 schemars 生成 JSON Schema 附在 prompt 里。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Dispatch Agent 期望的回复
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DispatchReply {
    /// 一句话事件摘要
    #[serde(default)]
    pub summary: String,
    /// 推荐出动的单位与去向
    #[serde(default)]
    pub recommendation: String,
}

/// Resource Agent 期望的回复
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ResourceReply {
    /// 推荐单位 ID，最优在前
    #[serde(default)]
    pub resources: Vec<String>,
    /// 资源分配说明
    #[serde(default)]
    pub summary: String,
}

/// 抽出 JSON 片段：```json ... ``` 代码块优先，其次首个 '{' 到最后一个 '}'
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 解析为目标结构；找不到 JSON 或字段类型不符时返回 None
pub fn parse_structured<T: DeserializeOwned>(output: &str) -> Option<T> {
    let json = extract_json(output)?;
    match serde_json::from_str(json) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "structured LLM output rejected");
            None
        }
    }
}

/// 目标结构的 JSON Schema（紧凑形式），拼入 prompt
pub fn schema_hint<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string(&schema).unwrap_or_else(|_| "{}".to_string())
}
