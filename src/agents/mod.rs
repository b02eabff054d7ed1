//! Agent 层：统一接口 + 四个流水线 Agent

pub mod decision;
pub mod dispatch;
pub mod parse;
pub mod resource;
pub mod summary;
pub mod traits;

pub use decision::{DecisionAgent, DECISION_AGENT_NAME};
pub use dispatch::{DispatchAgent, DISPATCH_AGENT_NAME};
pub use parse::{DispatchReply, ResourceReply};
pub use resource::{ResourceAgent, RESOURCE_AGENT_NAME};
pub use summary::{SummaryAgent, SUMMARY_AGENT_NAME};
pub use traits::{incident_of, Agent};
