//! 消息信封：流水线中传递的唯一状态单元
//!
//! content 为开放的 JSON 映射（只增不删，下游不假设任何键预先存在），
//! sender/receiver 由编排器在每一跳之前改写，trace 只追加、不截断、不重排。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 信封内容：字符串键到任意 JSON 值
pub type Content = Map<String, Value>;

/// 单条溯源记录：哪个 Agent 贡献了什么
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub agent: String,
    pub message: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub content: Content,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub trace: Vec<TraceEntry>,
    /// 辅助上下文，编排器不读取
    pub context: Content,
}

impl Envelope {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceEntry>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_context(mut self, context: Content) -> Self {
        self.context = context;
        self
    }

    pub fn add_trace(&mut self, agent: impl Into<String>, message: Value) {
        self.trace.push(TraceEntry {
            agent: agent.into(),
            message,
        });
    }

    /// 序列化快照：恰好 content / sender / receiver / trace / context 五个字段
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// 读取字符串字段；键缺失或非字符串时返回 None
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// 读取对象字段；键缺失或非对象时返回 None
    pub fn content_object(&self, key: &str) -> Option<&Content> {
        self.content.get(key).and_then(Value::as_object)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.content.insert(key.into(), value.into());
    }
}

/// 从事件映射中读取字符串字段（数字等标量也转成字符串）
pub fn field_str<'a>(map: &'a Content, key: &str) -> Option<std::borrow::Cow<'a, str>> {
    match map.get(key)? {
        Value::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
        Value::Null => None,
        Value::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(std::borrow::Cow::Owned(b.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_empty() {
        let env = Envelope::default();
        assert!(env.content.is_empty());
        assert!(env.sender.is_none());
        assert!(env.receiver.is_none());
        assert!(env.trace.is_empty());
        assert!(env.context.is_empty());
    }

    #[test]
    fn test_add_trace_appends_in_order() {
        let mut env = Envelope::default();
        env.add_trace("a", json!({"x": 1}));
        env.add_trace("b", json!("done"));
        assert_eq!(env.trace.len(), 2);
        assert_eq!(env.trace[0].agent, "a");
        assert_eq!(env.trace[1].message, json!("done"));
    }

    #[test]
    fn test_to_value_has_exactly_five_fields() {
        let mut content = Content::new();
        content.insert("incident".into(), json!({"type": "Fire"}));
        let env = Envelope::new(content).with_sender("user");
        let value = env.to_value();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["content", "context", "receiver", "sender", "trace"]);
        assert_eq!(obj["sender"], json!("user"));
        assert_eq!(obj["receiver"], Value::Null);
    }

    #[test]
    fn test_field_str_tolerates_scalars() {
        let map = json!({"id": 42, "type": "fire", "nested": {}}).as_object().cloned().unwrap();
        assert_eq!(field_str(&map, "id").as_deref(), Some("42"));
        assert_eq!(field_str(&map, "type").as_deref(), Some("fire"));
        assert!(field_str(&map, "nested").is_none());
        assert!(field_str(&map, "missing").is_none());
    }
}
