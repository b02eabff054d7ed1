//! 活动事件表与计数
//!
//! add 时补全 `id`（UUID v4）与 `timestamp`（RFC 3339），已有值保持不变。

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::envelope::{field_str, Content};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncidentMetrics {
    pub incidents: u64,
    pub decisions: u64,
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// 登记事件并返回补全后的记录
    async fn add(&self, incident: Content) -> Content;

    /// 移除（解决）事件；返回是否确有移除
    async fn remove(&self, incident_id: &str) -> bool;

    /// 到达顺序
    async fn list(&self) -> Vec<Content>;

    async fn latest(&self) -> Option<Content>;

    async fn record_decision(&self);

    async fn metrics(&self) -> IncidentMetrics;
}

#[derive(Default)]
struct Inner {
    active: Vec<Content>,
    metrics: IncidentMetrics,
}

#[derive(Default)]
pub struct InMemoryIncidentStore {
    inner: RwLock<Inner>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn add(&self, mut incident: Content) -> Content {
        if field_str(&incident, "id").is_none() {
            incident.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        if !incident.contains_key("timestamp") {
            incident.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        let mut inner = self.inner.write().await;
        inner.active.push(incident.clone());
        inner.metrics.incidents += 1;
        incident
    }

    async fn remove(&self, incident_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.active.len();
        inner
            .active
            .retain(|i| field_str(i, "id").as_deref() != Some(incident_id));
        inner.active.len() != before
    }

    async fn list(&self) -> Vec<Content> {
        self.inner.read().await.active.clone()
    }

    async fn latest(&self) -> Option<Content> {
        self.inner.read().await.active.last().cloned()
    }

    async fn record_decision(&self) {
        self.inner.write().await.metrics.decisions += 1;
    }

    async fn metrics(&self) -> IncidentMetrics {
        self.inner.read().await.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incident(v: Value) -> Content {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_add_fills_id_and_timestamp() {
        let store = InMemoryIncidentStore::new();
        let record = store.add(incident(json!({"type": "fire"}))).await;
        let id = record["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        let ts = record["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());

        let kept = store.add(incident(json!({"id": "inc-9", "timestamp": "t0"}))).await;
        assert_eq!(kept["id"], "inc-9");
        assert_eq!(kept["timestamp"], "t0");
        assert_eq!(store.latest().await.unwrap()["id"], "inc-9");
    }

    #[tokio::test]
    async fn test_remove_and_metrics() {
        let store = InMemoryIncidentStore::new();
        store.add(incident(json!({"id": "a"}))).await;
        store.add(incident(json!({"id": "b"}))).await;
        assert!(store.remove("a").await);
        assert!(!store.remove("a").await);
        store.record_decision().await;

        assert_eq!(store.list().await.len(), 1);
        assert_eq!(
            store.metrics().await,
            IncidentMetrics {
                incidents: 2,
                decisions: 1
            }
        );
    }
}
