//! CLI 配置
//!
//! 包含 CLI 特有的配置：分阶段日志级别

use skein_config::Phase;
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub host: Option<Level>,
    pub bridge: Option<Level>,
    pub reactor: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::INFO,
            host: None,
            bridge: None,
            reactor: None,
        }
    }
}

impl LogConfig {
    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> Level {
        match phase {
            Phase::Host => self.host.unwrap_or(self.global),
            Phase::Bridge => self.bridge.unwrap_or(self.global),
            Phase::Reactor => self.reactor.unwrap_or(self.global),
        }
    }
}

/// Parse a level string; unknown strings map to the provided default
pub fn parse_level(s: &str, default: Level) -> Level {
    match s {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_falls_back_to_global() {
        let cfg = LogConfig {
            global: Level::WARN,
            host: Some(Level::TRACE),
            ..LogConfig::default()
        };
        assert_eq!(cfg.level_for(Phase::Host), Level::TRACE);
        assert_eq!(cfg.level_for(Phase::Bridge), Level::WARN);
        assert_eq!(cfg.level_for(Phase::Reactor), Level::WARN);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug", Level::INFO), Level::DEBUG);
        assert_eq!(parse_level("nonsense", Level::INFO), Level::INFO);
    }
}
