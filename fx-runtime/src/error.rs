//! # Error 模块
//!
//! 定义 fx-runtime 中使用的错误类型。
//!
//! 调度器运行期的边界情况（池耗尽、重复释放、dispose 之后的调用）**不是错误**，
//! 统一以 `Option` / `bool` 哨兵返回并记录日志。只有构造期配置校验和事件解析
//! 会产生这里的错误。

use thiserror::Error;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 数值超出允许范围
    #[error("配置项 '{field}' 的值无效：{message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },

    /// 配置项之间互相矛盾
    #[error("配置项 '{field}' 与 '{other}' 冲突：{message}")]
    Inconsistent {
        field: &'static str,
        other: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            message: message.into(),
        }
    }
}

/// 事件载荷错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    /// 缺少必需的数值字段
    #[error("事件 {category} 缺少必需字段 '{field}'")]
    MissingField {
        category: &'static str,
        field: &'static str,
    },

    /// 数值字段不是有限数
    #[error("事件 {category} 的字段 '{field}' 不是有限数：{value}")]
    NonFinite {
        category: &'static str,
        field: &'static str,
        value: f32,
    },

    /// 数值字段为负
    #[error("事件 {category} 的字段 '{field}' 不能为负：{value}")]
    Negative {
        category: &'static str,
        field: &'static str,
        value: f32,
    },
}

/// fx-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FxError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 事件错误
    #[error("事件错误: {0}")]
    Event(#[from] EventError),
}

/// Result 类型别名
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::out_of_range("max_size", "必须大于 0");
        assert_eq!(err.to_string(), "配置项 'max_size' 的值无效：必须大于 0");

        let wrapped: FxError = err.into();
        assert!(wrapped.to_string().starts_with("配置错误: "));
    }

    #[test]
    fn test_event_error_conversion() {
        let err = EventError::MissingField {
            category: "damage_taken",
            field: "magnitude",
        };
        let wrapped: FxError = err.clone().into();
        assert_eq!(wrapped, FxError::Event(err));
    }
}
