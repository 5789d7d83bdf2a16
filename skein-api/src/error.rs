//! API 错误类型
//!
//! 提供统一的错误类型，把宿主与转换错误汇总到一个出口。

use thiserror::Error;

pub use skein_core::{ConvertError, HostError, HostErrorCode};

/// Skein 错误类型
#[derive(Error, Debug, Clone)]
pub enum SkeinError {
    /// 宿主执行错误
    #[error("{0}")]
    Host(#[from] HostError),

    /// 类型转换错误
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
}

impl SkeinError {
    /// 错误是否由资源上限引起
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            SkeinError::Host(HostError {
                code: HostErrorCode::Memory,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_converts() {
        let err: SkeinError = HostError::runtime("boom").into();
        assert_eq!(err.to_string(), "runtime error: boom");
        assert!(!err.is_limit());
    }

    #[test]
    fn test_limit_detection() {
        let err: SkeinError = HostError::memory("registry is full").into();
        assert!(err.is_limit());
    }
}
