//! Skein Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Skein crates.

/// Configuration for execution limits
#[derive(Debug, Clone, Copy)]
pub struct LimitConfig {
    /// Maximum evaluation stack height per strand
    pub max_stack_height: usize,
    /// Maximum call frame depth per strand
    pub max_call_depth: usize,
    /// Maximum number of live registry entries
    pub max_registry_entries: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_height: 1024,
            max_call_depth: 256,
            max_registry_entries: 65536,
        }
    }
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Host,
    Bridge,
    Reactor,
}

impl Phase {
    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Host => "host",
            Phase::Bridge => "bridge",
            Phase::Reactor => "reactor",
        }
    }

    /// Get the log target name for this phase
    ///
    /// Static so it can feed both the engine-side log macros and the
    /// CLI-side tracing target filter.
    pub const fn target(&self) -> &'static str {
        match self {
            Phase::Host => "skein::host",
            Phase::Bridge => "skein::bridge",
            Phase::Reactor => "skein::reactor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit_config() {
        let cfg = LimitConfig::default();
        assert_eq!(cfg.max_stack_height, 1024);
        assert_eq!(cfg.max_call_depth, 256);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(Phase::Host.as_str(), "host");
        assert_eq!(Phase::Bridge.target(), "skein::bridge");
    }
}
