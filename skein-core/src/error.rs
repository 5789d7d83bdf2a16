//! 错误类型
//!
//! 可恢复的脚本/转换错误走 Result；宿主 API 的前置条件违规
//! （恢复已结束的脉络、主脉络上请求挂起等）是 bug，直接 panic。

use thiserror::Error;

use crate::host::value::TypeTag;

/// 错误类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostErrorCode {
    /// 脚本执行期错误（类型错误、调用不可调用的值等）
    Runtime,
    /// 资源上限（栈、调用深度、注册表）
    Memory,
    /// 原生处理函数返回的错误
    Handler,
}

impl std::fmt::Display for HostErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HostErrorCode::Runtime => "runtime",
            HostErrorCode::Memory => "memory",
            HostErrorCode::Handler => "handler",
        })
    }
}

/// 宿主执行错误
#[derive(Debug, Clone, Error)]
#[error("{code} error: {message}")]
pub struct HostError {
    pub code: HostErrorCode,
    pub message: String,
}

impl HostError {
    pub fn runtime(message: impl Into<String>) -> HostError {
        HostError { code: HostErrorCode::Runtime, message: message.into() }
    }

    pub fn memory(message: impl Into<String>) -> HostError {
        HostError { code: HostErrorCode::Memory, message: message.into() }
    }

    pub fn handler(message: impl Into<String>) -> HostError {
        HostError { code: HostErrorCode::Handler, message: message.into() }
    }
}

/// 值转换错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: &'static str, actual: TypeTag },

    /// 联合类型的各分支标签都不接受实际值
    #[error("no union variant accepts a {actual} value")]
    NoVariantMatched { actual: TypeTag },
}

impl From<ConvertError> for HostError {
    fn from(err: ConvertError) -> HostError {
        HostError::runtime(err.to_string())
    }
}
