//! ResQ - 事件调度智能体流水线
//!
//! 模块划分：
//! - **agents**: Agent 接口与 Dispatch / Resource / Summary / Decision 四个 Agent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 信封协议、错误、降级来源、编排器与流水线构建
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、时钟、弹性调用器
//! - **memory**: 会话轮次、事实记忆、有界决策历史
//! - **observability**: 日志初始化与结构化事件
//! - **planner**: 单位登记表与离线兜底规划
//! - **state**: 事件存储与会话存储

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;
pub mod state;

pub use crate::core::{Envelope, Orchestrator, Pipeline, PipelineBuilder};
