//! 日志宏实现
//!
//! 每个宏都有两种形态：默认以 `module_path!()` 为 target，
//! 或者 `target: ...` 显式指定（各执行阶段用统一的阶段 target）。

/// 记录 Trace 级别日志
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $logger:expr, $($arg:tt)*) => {
        $crate::log!(target: $target, $logger, $crate::Level::Trace, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Trace, $($arg)*)
    };
}

/// 记录 Debug 级别日志
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $logger:expr, $($arg:tt)*) => {
        $crate::log!(target: $target, $logger, $crate::Level::Debug, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Debug, $($arg)*)
    };
}

/// 记录 Info 级别日志
#[macro_export]
macro_rules! info {
    (target: $target:expr, $logger:expr, $($arg:tt)*) => {
        $crate::log!(target: $target, $logger, $crate::Level::Info, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Info, $($arg)*)
    };
}

/// 记录 Warn 级别日志
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $logger:expr, $($arg:tt)*) => {
        $crate::log!(target: $target, $logger, $crate::Level::Warn, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Warn, $($arg)*)
    };
}

/// 记录 Error 级别日志
#[macro_export]
macro_rules! error {
    (target: $target:expr, $logger:expr, $($arg:tt)*) => {
        $crate::log!(target: $target, $logger, $crate::Level::Error, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Error, $($arg)*)
    };
}

/// 内部使用的通用日志宏
#[macro_export]
macro_rules! log {
    (target: $target:expr, $logger:expr, $level:expr, $($arg:tt)*) => {{
        // 惰性求值：先检查级别，只有启用时才格式化消息
        if $logger.is_enabled($level) {
            let message = format!($($arg)*);
            $logger.log($level, $target, message);
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)*) => {
        $crate::log!(target: module_path!(), $logger, $level, $($arg)*)
    };
}
