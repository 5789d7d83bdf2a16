//! skein-log - 结构化日志系统
//!
//! 为 Skein 宿主和绑定层设计的结构化日志系统，特点：
//! - **显式传递**：无全局 logger，`Arc<Logger>` 通过配置传入
//! - **非阻塞**：日志不卡宿主执行，环形缓冲区满了覆盖旧数据
//! - **崩溃恢复**：`LogRingBuffer` 保留最后 N 条日志供转储
//!
//! # 快速开始
//!
//! ```
//! use skein_log::{Level, Logger, StdoutSink, debug};
//!
//! let logger = Logger::new(Level::Debug).with_sink(StdoutSink);
//! debug!(logger, "engine started, id={}", 1);
//! ```

mod logger;
mod macros;
mod record;
mod ring_buffer;

pub use logger::{LogSink, Logger, StderrSink, StdoutSink};
pub use record::{Level, Record};
pub use ring_buffer::{LogRingBuffer, RingBufferStats};
