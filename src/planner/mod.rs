//! 兜底规划层：单位登记表与离线规划

pub mod registry;
pub mod relief;

pub use registry::{
    default_catalog, Availability, DispatchRecord, InMemoryUnitStore, Unit, UnitStatus, UnitStore,
};
pub use relief::{
    clamp_display, format_display_alert, incident_brief, CandidateUnit, FallbackPlanner,
    PlannerOptions, ReliefPlan, DISPLAY_LIMIT,
};
