//! 可观测性：tracing 初始化与结构化事件日志

use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化全局订阅者；未设置 RUST_LOG 时默认 info。重复调用无副作用。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 记录一条结构化事件，数据以 JSON 文本附在 `data` 字段上
pub fn log_event(event: &str, data: &Value) {
    tracing::info!(event, data = %data, "EVENT");
}
