//! # Error 模块
//!
//! HUD 层的错误类型。只有构造期（读取配置、创建引擎）会返回错误，
//! 运行期的事件处理与调度一律以日志代替错误。

use fx_runtime::{ConfigError, FxError};
use thiserror::Error;

/// HUD 错误
#[derive(Error, Debug)]
pub enum HudError {
    /// 配置文件读写失败
    #[error("配置文件 IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件格式错误
    #[error("配置文件解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 控件的引擎配置无效
    #[error("控件 {widget} 的配置无效: {source}")]
    InvalidConfig {
        widget: &'static str,
        #[source]
        source: ConfigError,
    },

    /// 控件的持续时间无效
    #[error("控件 {widget} 的持续时间无效: {value}")]
    InvalidDuration { widget: &'static str, value: f64 },

    /// 引擎构造失败
    #[error("引擎构造失败: {0}")]
    Engine(#[from] FxError),
}
