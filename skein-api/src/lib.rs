//! Skein API - Embedding orchestration layer
//!
//! Provides the unified embedding interface, including:
//! - Session assembly (engine + reactor)
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (SkeinError)
//!
//! For CLI convenience, this crate provides a global singleton config.
//! For library use, prefer the explicit `boot(&config)` API.

use skein_log::{info, Logger};
use std::sync::Arc;

use skein_core::bind::{register_async_fn, Coroutine};
use skein_core::host::{Chunk, Function, Op, StrandState};
use skein_core::HostError;

// Re-export config
pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

// Re-export config types from skein_config
pub use skein_config::{LimitConfig, Phase};

// Re-export error and types
pub mod error;
pub mod reactor;
pub mod types;
pub use error::SkeinError;
pub use reactor::{ManualSource, Reactor, TimerSource};
pub use types::ExecuteOutput;

// Re-export core types
pub use skein_config;
pub use skein_core::host::{Engine, Value};

/// 一次嵌入会话：引擎加反应器
pub struct Session {
    engine: Engine,
    reactor: Reactor,
    logger: Arc<Logger>,
}

/// Assemble a session with explicit configuration
///
/// This is the recommended API for library users.
pub fn boot(config: &RunConfig) -> Session {
    let engine = Engine::new(config.limits, config.logger.clone());
    let reactor = Reactor::new(config.logger.clone());
    info!(config.logger, "session booted");
    Session {
        engine,
        reactor,
        logger: config.logger.clone(),
    }
}

/// Assemble a session from the global singleton config
pub fn boot_global() -> Session {
    boot(get_config())
}

impl Session {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// 演示流程：一条脉络逐个等待定时器元素，返回最后一个时刻
    ///
    /// 每次等待都走完整的 挂起 -> 定时器到期 -> 以元素恢复 闭环。
    pub fn run_ticker(&self, ticks: u32) -> Result<ExecuteOutput, SkeinError> {
        let timer = self.reactor.timer(1);
        register_async_fn(&self.engine, "next_tick", move |_ctx| Ok(timer.clone()));

        let mut chunk = Chunk::new("ticker", 0);
        chunk.reserve_locals(1);
        let globals = chunk.add_constant(Value::Table(self.engine.globals().clone()));
        let name = chunk.add_constant(Value::Str("next_tick".into()));
        for _ in 0..ticks {
            chunk.write_op(Op::LoadConst(globals));
            chunk.write_op(Op::LoadConst(name));
            chunk.write_op(Op::IndexGet);
            chunk.write_op(Op::Call(0));
            chunk.write_op(Op::StoreLocal(0));
        }
        chunk.write_op(Op::LoadLocal(0));
        chunk.write_op(Op::ReturnValue);

        info!(self.logger, "ticker started for {} tick(s)", ticks);
        let coro = Coroutine::spawn(&self.engine, Function::from_chunk(chunk.finish()))?;
        coro.resume(vec![])?;
        let elapsed = self.reactor.run_until_idle(u64::from(ticks) * 2 + 4)?;
        if coro.state() != StrandState::Finished {
            return Err(HostError::runtime("ticker strand did not finish").into());
        }
        let value = Some(self.engine.pop_value(coro.strand()));
        info!(self.logger, "ticker finished after {} tick(s)", elapsed);
        Ok(ExecuteOutput {
            value,
            ticks: elapsed,
        })
    }
}
