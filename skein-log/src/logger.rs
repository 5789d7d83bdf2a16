//! 日志器实现

use crate::record::{Level, Record};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// 日志输出目标 trait
pub trait LogSink: Send + Sync {
    /// 写入日志记录
    fn write(&self, record: &Record);
}

/// 日志器配置和状态
pub struct Logger {
    /// 当前日志级别（原子存储）
    level: AtomicU8,
    /// 输出目标列表
    sinks: Mutex<Vec<Box<dyn LogSink>>>,
}

impl Logger {
    /// 创建新的日志器
    pub fn new(level: Level) -> Arc<Self> {
        Arc::new(Logger {
            level: AtomicU8::new(level as u8),
            sinks: Mutex::new(Vec::new()),
        })
    }

    /// 创建一个丢弃所有日志的日志器（库代码的默认值）
    pub fn noop() -> Arc<Self> {
        Arc::new(Logger {
            level: AtomicU8::new(Level::Error as u8 + 1),
            sinks: Mutex::new(Vec::new()),
        })
    }

    /// 添加输出目标
    pub fn with_sink<S: LogSink + 'static>(self: Arc<Self>, sink: S) -> Arc<Self> {
        {
            let mut sinks = self.sinks.lock().expect("logger sink lock poisoned");
            sinks.push(Box::new(sink));
        }
        self
    }

    /// 动态设置日志级别
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// 获取当前日志级别
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    /// 指定级别是否启用
    pub fn is_enabled(&self, level: Level) -> bool {
        level as u8 >= self.level.load(Ordering::Relaxed)
    }

    /// 写入一条日志（宏的落点，调用方负责级别检查）
    pub fn log(&self, level: Level, target: &'static str, message: String) {
        let record = Record::new(level, target, message);
        let sinks = self.sinks.lock().expect("logger sink lock poisoned");
        for sink in sinks.iter() {
            sink.write(&record);
        }
    }
}

/// 标准输出目标
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, record: &Record) {
        println!("{}", record.format());
    }
}

/// 标准错误目标
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, record: &Record) {
        eprintln!("{}", record.format());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::LogRingBuffer;

    #[test]
    fn test_level_gate() {
        let logger = Logger::new(Level::Warn);
        assert!(!logger.is_enabled(Level::Debug));
        assert!(logger.is_enabled(Level::Warn));
        assert!(logger.is_enabled(Level::Error));
    }

    #[test]
    fn test_noop_discards_everything() {
        let logger = Logger::noop();
        assert!(!logger.is_enabled(Level::Error));
    }

    #[test]
    fn test_set_level_at_runtime() {
        let logger = Logger::new(Level::Error);
        assert!(!logger.is_enabled(Level::Info));
        logger.set_level(Level::Trace);
        assert!(logger.is_enabled(Level::Info));
    }

    #[test]
    fn test_sink_receives_records() {
        let ring = LogRingBuffer::new(8);
        let logger = Logger::new(Level::Info).with_sink(ring.clone());
        logger.log(Level::Info, "skein::test", "hello".to_string());
        let records = ring.dump_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "hello");
    }
}
