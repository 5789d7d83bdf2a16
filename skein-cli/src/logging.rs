//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。引擎内部走
//! `skein-log`，记录带阶段 target；[`TracingSink`] 把它们转发进
//! tracing，分阶段过滤由同一套 `Targets` 完成。

use skein_config::Phase;
use std::io;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::config::LogConfig;

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> LogFormat {
        match s {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// 使用指定格式和日志配置初始化日志系统
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let targets = Targets::new()
        .with_default(log_config.global)
        .with_target(Phase::Host.target(), log_config.level_for(Phase::Host))
        .with_target(Phase::Bridge.target(), log_config.level_for(Phase::Bridge))
        .with_target(Phase::Reactor.target(), log_config.level_for(Phase::Reactor))
        .with_target("skein::cli", log_config.global);

    let stdout_layer = create_format_layer(format, io::stdout).with_filter(targets);
    tracing_subscriber::registry().with(stdout_layer).init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(
    format: LogFormat,
    make_writer: F,
) -> impl Layer<tracing_subscriber::Registry>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

/// 把引擎侧的 `skein-log` 记录转发进 tracing
///
/// tracing 事件的 target 必须是编译期常量，按阶段逐个展开；
/// 未带阶段 target 的记录归入宿主阶段。
pub struct TracingSink;

impl skein_log::LogSink for TracingSink {
    fn write(&self, record: &skein_log::Record) {
        macro_rules! forward {
            ($target:literal) => {
                match record.level {
                    skein_log::Level::Trace => tracing::trace!(target: $target, "{}", record.message),
                    skein_log::Level::Debug => tracing::debug!(target: $target, "{}", record.message),
                    skein_log::Level::Info => tracing::info!(target: $target, "{}", record.message),
                    skein_log::Level::Warn => tracing::warn!(target: $target, "{}", record.message),
                    skein_log::Level::Error => tracing::error!(target: $target, "{}", record.message),
                }
            };
        }
        match record.target {
            "skein::bridge" => forward!("skein::bridge"),
            "skein::reactor" => forward!("skein::reactor"),
            _ => forward!("skein::host"),
        }
    }
}

/// 引擎日志器的级别：各阶段里最详细的一档
///
/// 粗过滤放行所有可能要的记录，细粒度的分阶段过滤交给
/// tracing 的 `Targets`。
pub fn engine_level(log_config: &LogConfig) -> skein_log::Level {
    let most_verbose = [
        Some(log_config.global),
        log_config.host,
        log_config.bridge,
        log_config.reactor,
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(log_config.global);
    match most_verbose {
        tracing::Level::TRACE => skein_log::Level::Trace,
        tracing::Level::DEBUG => skein_log::Level::Debug,
        tracing::Level::INFO => skein_log::Level::Info,
        tracing::Level::WARN => skein_log::Level::Warn,
        _ => skein_log::Level::Error,
    }
}
