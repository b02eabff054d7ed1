//! 离线兜底规划：不依赖任何外部调用，给出摘要 / 推荐 / 资源列表 / 资源摘要
//!
//! 1. 可用性过滤：状态为 available 的单位，可按类型子串过滤
//! 2. ETA：max(3, base_eta + sector_modifier / 2 + jitter)，jitter ∈ {-1, 0, 1}；按 ETA 升序稳定排序
//! 3. 打分：能力集合含事件类型 +4，单位类型含事件类型 +3，紧急度 critical/high +2；≤0 剔除，按分数降序稳定排序取前 N
//! 4. 文本合成
//!
//! 给定种子与状态快照时结果确定；不会失败，不做 I/O。

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::envelope::{field_str, Content};
use crate::planner::registry::{Unit, UnitStore};

/// 显示屏告警最大字符数
pub const DISPLAY_LIMIT: usize = 60;

/// 未知地点的区域修正
const DEFAULT_SECTOR_MODIFIER: i64 = 6;
const MIN_ETA_MINUTES: i64 = 3;

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// 推荐单位数
    pub top_n: usize,
    pub jitter: bool,
    /// 抖动随机数种子；None 时取系统熵
    pub seed: Option<u64>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            top_n: 2,
            jitter: true,
            seed: None,
        }
    }
}

/// 带 ETA 估计的候选单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUnit {
    #[serde(flatten)]
    pub unit: Unit,
    pub eta_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliefPlan {
    pub summary: String,
    pub recommendation: String,
    pub resources: Vec<String>,
    pub resource_summary: String,
}

pub struct FallbackPlanner {
    units: Arc<dyn UnitStore>,
    rng: Mutex<StdRng>,
    options: PlannerOptions,
}

impl FallbackPlanner {
    pub fn new(units: Arc<dyn UnitStore>, options: PlannerOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            units,
            rng: Mutex::new(rng),
            options,
        }
    }

    pub fn units(&self) -> &Arc<dyn UnitStore> {
        &self.units
    }

    fn jitter(&self) -> i64 {
        if !self.options.jitter {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(-1..=1)
    }

    /// ETA 估计；destination 缺省时按单位驻地估算
    pub fn estimate_arrival_minutes(&self, unit: &Unit, destination: Option<&str>) -> i64 {
        let modifier = sector_modifier(destination.unwrap_or(&unit.location));
        (unit.base_eta + modifier / 2 + self.jitter()).max(MIN_ETA_MINUTES)
    }

    /// 可用单位，按 ETA 升序（即全局统一的「最优在前」顺序）
    pub fn available_units(
        &self,
        unit_type: Option<&str>,
        destination: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<CandidateUnit> {
        let wanted = unit_type.map(|t| normalize(Some(t)));
        let mut candidates: Vec<CandidateUnit> = self
            .units
            .snapshot()
            .into_iter()
            .filter(|(_, status)| status.is_available())
            .filter(|(unit, _)| match &wanted {
                Some(t) => unit.kind.to_lowercase().contains(t.as_str()),
                None => true,
            })
            .map(|(unit, _)| {
                let eta_minutes = self.estimate_arrival_minutes(&unit, destination);
                CandidateUnit { unit, eta_minutes }
            })
            .collect();

        candidates.sort_by_key(|c| c.eta_minutes);
        if let Some(limit) = limit.filter(|l| *l > 0) {
            candidates.truncate(limit);
        }
        candidates
    }

    /// 为事件打分排序并取前 limit 个；同分保持 ETA 顺序。ETA 按单位驻地估算
    pub fn recommend_units(&self, incident: &Content, limit: usize) -> Vec<CandidateUnit> {
        let mut ranked: Vec<(i32, CandidateUnit)> = self
            .available_units(None, None, None)
            .into_iter()
            .map(|c| (score_unit(&c.unit, incident), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().take(limit).map(|(_, c)| c).collect()
    }

    pub fn plan(&self, incident: &Content) -> ReliefPlan {
        let summary = incident_brief(incident);
        let ranked = self.recommend_units(incident, self.options.top_n);
        let location = field_str(incident, "location")
            .map(|s| s.into_owned())
            .unwrap_or_else(|| "the scene".to_string());

        match ranked.first() {
            Some(top) => {
                let desc = ranked
                    .iter()
                    .map(|c| format!("{} ({}, ETA {}m)", c.unit.id, c.unit.kind, c.eta_minutes))
                    .collect::<Vec<_>>()
                    .join(", ");
                ReliefPlan {
                    summary,
                    recommendation: format!("Dispatch {} to {}.", top.unit.id, location),
                    resources: ranked.iter().map(|c| c.unit.id.clone()).collect(),
                    resource_summary: format!("Primary assignments: {}", desc),
                }
            }
            None => ReliefPlan {
                summary,
                recommendation: "Hold and escalate to manual supervisor; no units free.".to_string(),
                resources: Vec::new(),
                resource_summary: "All units busy; advise manual review.".to_string(),
            },
        }
    }
}

/// 小写去空白；缺失时为 "unknown"
pub fn normalize(value: Option<&str>) -> String {
    value.unwrap_or("unknown").trim().to_lowercase()
}

pub fn sector_modifier(location: &str) -> i64 {
    match normalize(Some(location)).as_str() {
        "sector 1" => 3,
        "sector 2" => 4,
        "sector 3" => 5,
        "sector 4" => 6,
        "sector 5" => 7,
        "sector 6" => 8,
        "sector 7" => 4,
        "sector 8" => 5,
        _ => DEFAULT_SECTOR_MODIFIER,
    }
}

pub fn score_unit(unit: &Unit, incident: &Content) -> i32 {
    let incident_type = normalize(field_str(incident, "type").as_deref());
    let urgency = normalize(field_str(incident, "urgency").as_deref());
    let mut score = 0;

    if !incident_type.is_empty() {
        if unit.capabilities.contains(&incident_type) {
            score += 4;
        }
        if unit.kind.to_lowercase().contains(&incident_type) {
            score += 3;
        }
    }
    if urgency == "critical" || urgency == "high" {
        score += 2;
    }
    score
}

/// "{type} at {location} - urgency {urgency}. Details: {details}"，无详情时省略 Details 段
pub fn incident_brief(incident: &Content) -> String {
    let kind = field_str(incident, "type").unwrap_or("Incident".into());
    let location = field_str(incident, "location").unwrap_or("unknown area".into());
    let urgency = field_str(incident, "urgency").unwrap_or("CRITICAL".into());
    let details = field_str(incident, "details")
        .filter(|d| !d.is_empty())
        .or_else(|| field_str(incident, "description"))
        .unwrap_or_default();

    let extra = if details.is_empty() {
        String::new()
    } else {
        format!(" Details: {}", details)
    };
    format!("{} at {} - urgency {}.{}", kind, location, urgency, extra)
        .trim()
        .to_string()
}

/// 生成 ≤60 字符的显示屏告警：超长时截到 57 字符并追加 "..."
pub fn format_display_alert(
    summary: &str,
    recommendation: &str,
    incident: &Content,
    urgency: Option<&str>,
) -> String {
    let urgency = urgency
        .map(String::from)
        .or_else(|| field_str(incident, "urgency").map(|s| s.into_owned()))
        .unwrap_or_else(|| "CRITICAL".to_string());
    let location = field_str(incident, "location").unwrap_or_default();
    let kind = field_str(incident, "type").unwrap_or_default();

    let base = format!("{} {} {}", urgency, kind, location);
    let tail = if recommendation.is_empty() {
        summary
    } else {
        recommendation
    };
    let message = format!("{}: {}", base.trim(), tail).trim().to_string();
    clamp_display(&message)
}

/// 按字符（非字节）截断到显示上限
pub fn clamp_display(message: &str) -> String {
    if message.chars().count() > DISPLAY_LIMIT {
        let head: String = message.chars().take(DISPLAY_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}
