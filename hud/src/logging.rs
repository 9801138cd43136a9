//! # Logging 模块
//!
//! tracing 订阅器初始化。库代码只发出事件，由可执行程序调用这里安装订阅器。

use tracing_subscriber::filter::EnvFilter;

/// 安装输出到 stderr 的 fmt 订阅器
///
/// 过滤规则取自 `RUST_LOG`，未设置时使用 `default_directive`（如 `"info"`）。
/// 重复调用时保留第一次安装的订阅器。
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
