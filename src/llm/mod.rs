//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）、时钟、弹性调用器

pub mod clock;
pub mod invoker;
pub mod mock;
pub mod openai;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use invoker::{InvokeOutcome, Invocation, InvokerConfig, ModelChain, ResilientInvoker};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{is_rate_limit_message, LlmClient, LlmError};
