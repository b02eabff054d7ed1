//! 单位登记表：固定的响应单位目录 + 可变的单位状态
//!
//! 不变量：一个单位同一时刻最多分配给一个事件，只有显式 release 才会释放。
//! 状态表由一把锁保护，notify_dispatch 在锁内做「检查并设置」，同一单位的并发分配不会重复成功。

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::envelope::{field_str, Content};
use crate::core::AgentError;

/// 目录中的单位（只读）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub capabilities: BTreeSet<String>,
    /// 基础到达时间（分钟）
    pub base_eta: i64,
}

impl Unit {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        location: impl Into<String>,
        capabilities: &[&str],
        base_eta: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            location: location.into(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            base_eta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Assigned,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub status: Availability,
    pub incident_id: Option<String>,
    /// RFC 3339
    pub last_updated: String,
}

impl UnitStatus {
    pub fn available() -> Self {
        Self {
            status: Availability::Available,
            incident_id: None,
            last_updated: Utc::now().to_rfc3339(),
        }
    }

    pub fn assigned(incident_id: Option<String>) -> Self {
        Self {
            status: Availability::Assigned,
            incident_id,
            last_updated: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == Availability::Available
    }
}

/// 调度通知记录（供日志与下游系统使用）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub unit_id: String,
    pub incident_id: Option<String>,
    pub location: Option<String>,
    pub timestamp: String,
    pub status: String,
}

/// 单位存储接口：兜底规划读快照，Decision Agent 在 SEND 时写入分配
pub trait UnitStore: Send + Sync {
    /// 目录顺序的全部单位
    fn units(&self) -> Vec<Unit>;

    fn status(&self, unit_id: &str) -> Option<UnitStatus>;

    fn set_status(&self, unit_id: &str, status: UnitStatus) -> Result<(), AgentError>;

    /// 把单位分配给事件；单位已被其他事件占用时返回 UnitAlreadyAssigned
    fn notify_dispatch(&self, unit_id: &str, incident: &Content) -> Result<DispatchRecord, AgentError>;

    fn release_unit(&self, unit_id: &str) -> Result<(), AgentError>;

    /// (单位, 状态) 快照，目录顺序
    fn snapshot(&self) -> Vec<(Unit, UnitStatus)> {
        self.units()
            .into_iter()
            .filter_map(|u| {
                let status = self.status(&u.id)?;
                Some((u, status))
            })
            .collect()
    }
}

/// 默认目录
pub fn default_catalog() -> Vec<Unit> {
    vec![
        Unit::new("Fire-1", "fire", "Station Alpha", &["structure", "industrial"], 5),
        Unit::new("Fire-2", "fire", "Station Bravo", &["wildfire", "structure"], 7),
        Unit::new("Ambulance-2", "ems", "Medic Hub", &["medical", "triage"], 6),
        Unit::new("Rescue-3", "rescue", "Urban SAR", &["collapse", "water"], 8),
    ]
}

pub struct InMemoryUnitStore {
    catalog: Vec<Unit>,
    status: Mutex<HashMap<String, UnitStatus>>,
}

impl InMemoryUnitStore {
    /// 所有单位初始为 available
    pub fn new(catalog: Vec<Unit>) -> Self {
        let status = catalog
            .iter()
            .map(|u| (u.id.clone(), UnitStatus::available()))
            .collect();
        Self {
            catalog,
            status: Mutex::new(status),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UnitStatus>> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryUnitStore {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl UnitStore for InMemoryUnitStore {
    fn units(&self) -> Vec<Unit> {
        self.catalog.clone()
    }

    fn status(&self, unit_id: &str) -> Option<UnitStatus> {
        self.lock().get(unit_id).cloned()
    }

    fn set_status(&self, unit_id: &str, status: UnitStatus) -> Result<(), AgentError> {
        let mut table = self.lock();
        let slot = table
            .get_mut(unit_id)
            .ok_or_else(|| AgentError::UnknownUnit(unit_id.to_string()))?;
        *slot = status;
        Ok(())
    }

    fn notify_dispatch(&self, unit_id: &str, incident: &Content) -> Result<DispatchRecord, AgentError> {
        let incident_id = field_str(incident, "id").map(|s| s.into_owned());
        let location = field_str(incident, "location").map(|s| s.into_owned());

        {
            let mut table = self.lock();
            let slot = table
                .get_mut(unit_id)
                .ok_or_else(|| AgentError::UnknownUnit(unit_id.to_string()))?;
            let same_incident = slot.incident_id.is_some() && slot.incident_id == incident_id;
            if slot.status == Availability::Assigned && !same_incident {
                return Err(AgentError::UnitAlreadyAssigned {
                    unit_id: unit_id.to_string(),
                    incident_id: slot.incident_id.clone().unwrap_or_else(|| "unknown".to_string()),
                });
            }
            *slot = UnitStatus::assigned(incident_id.clone());
        }

        tracing::info!(
            unit = unit_id,
            location = location.as_deref().unwrap_or("unknown"),
            incident = incident_id.as_deref().unwrap_or("none"),
            "Dispatching unit"
        );

        Ok(DispatchRecord {
            unit_id: unit_id.to_string(),
            incident_id,
            location,
            timestamp: Utc::now().to_rfc3339(),
            status: "queued".to_string(),
        })
    }

    fn release_unit(&self, unit_id: &str) -> Result<(), AgentError> {
        self.set_status(unit_id, UnitStatus::available())?;
        tracing::info!(unit = unit_id, "Unit released");
        Ok(())
    }
}
