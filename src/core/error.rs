//! 错误类型
//!
//! 流水线本身从不向调用方抛错（后端故障、解析失败都在 Agent 内降级为兜底规划）；
//! AgentError 只覆盖流水线之外可失败的操作：配置、模型链校验、单位调度冲突、流水线组装。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// 模型链必须非空
    #[error("Model chain for '{0}' is empty")]
    EmptyModelChain(String),

    #[error("Unknown agent in pipeline: {0}")]
    UnknownAgent(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// 同一单位同一时刻只能分配给一个事件
    #[error("Unit {unit_id} is already assigned to incident {incident_id}")]
    UnitAlreadyAssigned { unit_id: String, incident_id: String },

    #[error("Invalid incident payload: {0}")]
    InvalidIncident(String),
}
