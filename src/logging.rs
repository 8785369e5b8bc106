//! 日志初始化
//!
//! 基于 tracing-subscriber，日志级别通过 RUST_LOG 环境变量控制

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅者，默认级别 info
///
/// 可重复调用，后续调用不会生效（方便在测试中使用）
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
