//! Skein CLI - Command line demo runner
//!
//! Project-based execution - all configuration from package.json

use clap::Parser;
use std::path::Path;
use std::path::PathBuf;
use std::process;

mod config;
mod logging;

use crate::config::{parse_level, LogConfig};
use crate::logging::{LogFormat, TracingSink};
use skein_api::{boot, init_config, LimitConfig, RunConfig};
use skein_log::Logger;

/// package.json 结构
#[derive(Debug, serde::Deserialize)]
struct PackageJson {
    /// 演示要走的定时器时刻数
    ticks: Option<u32>,
    /// 资源上限
    limits: Option<LimitsJson>,
    /// 日志配置
    log: Option<LogJson>,
}

#[derive(Debug, serde::Deserialize)]
struct LimitsJson {
    max_stack_height: Option<usize>,
    max_call_depth: Option<usize>,
    max_registry_entries: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct LogJson {
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    level: Option<String>,
    /// 日志格式: "pretty", "compact", "json"
    format: Option<String>,
    host: Option<String>,
    bridge: Option<String>,
    reactor: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "skein",
    about = "Skein embedded scripting host - demo runner",
    version = "0.1.0"
)]
struct Cli {
    /// Configuration file path (default: ./package.json)
    #[arg(value_name = "CONFIG", default_value = "package.json")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let package = match read_package_json(&cli.config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // CLI 自身的日志直接走 tracing；引擎内部日志走 skein-log，
    // 记录带阶段 target，经 TracingSink 汇入同一个订阅器
    let log_config = build_log_config(&package);
    let format = package
        .log
        .as_ref()
        .and_then(|l| l.format.as_deref())
        .map(LogFormat::parse)
        .unwrap_or(LogFormat::Compact);
    logging::init(&log_config, format);

    let run_config = build_run_config(&package, &log_config);
    init_config(run_config.clone());

    let ticks = package.ticks.unwrap_or(5);
    tracing::info!(target: "skein::cli", ticks, "starting ticker session");

    let session = boot(&run_config);
    match session.run_ticker(ticks) {
        Ok(output) => {
            tracing::info!(
                target: "skein::cli",
                ticks = output.ticks,
                "session finished"
            );
            match output.value {
                Some(value) => println!("=> {:?}", value),
                None => println!("=> (no value)"),
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Read and parse package.json; a missing default file falls back to defaults
fn read_package_json(path: &Path) -> Result<PackageJson, String> {
    if !path.exists() {
        return Err(format!(
            "未找到 '{}'\n\n提示: 创建 '{}' 并指定 'ticks' 字段",
            path.display(),
            path.display()
        ));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid '{}': {}", path.display(), e))
}

fn build_log_config(package: &PackageJson) -> LogConfig {
    let mut cfg = LogConfig::default();
    if let Some(log) = &package.log {
        if let Some(level) = &log.level {
            cfg.global = parse_level(level, cfg.global);
        }
        cfg.host = log.host.as_deref().map(|s| parse_level(s, cfg.global));
        cfg.bridge = log.bridge.as_deref().map(|s| parse_level(s, cfg.global));
        cfg.reactor = log.reactor.as_deref().map(|s| parse_level(s, cfg.global));
    }
    cfg
}

fn build_run_config(package: &PackageJson, log_config: &LogConfig) -> RunConfig {
    let mut limits = LimitConfig::default();
    if let Some(l) = &package.limits {
        if let Some(v) = l.max_stack_height {
            limits.max_stack_height = v;
        }
        if let Some(v) = l.max_call_depth {
            limits.max_call_depth = v;
        }
        if let Some(v) = l.max_registry_entries {
            limits.max_registry_entries = v;
        }
    }

    // 引擎侧只做粗过滤，分阶段级别由 tracing 的 Targets 执行
    RunConfig {
        limits,
        logger: Logger::new(logging::engine_level(log_config)).with_sink(TracingSink),
    }
}
