//! 核心层：信封协议、错误、降级来源、编排器与流水线构建

pub mod builder;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod recovery;

pub use builder::{create_llm_from_config, create_pipeline_builder, Pipeline, PipelineBuilder};
pub use envelope::{Content, Envelope, TraceEntry};
pub use error::AgentError;
pub use orchestrator::{Orchestrator, USER_SENDER};
pub use recovery::{FallbackReason, Provenance};
