//! 协程桥
//!
//! 原生侧对一条可挂起脉络的句柄。句柄存活期间脉络被注册表
//! 锚定，脚本侧收不回去。挂起由原生函数通过调用上下文请求
//! （[`CallCtx::request_suspend`]），恢复走这里。

use std::rc::{Rc, Weak};

use skein_config::Phase;
use skein_log::debug;

use crate::bind::reference::RegRef;
use crate::error::HostError;
use crate::host::engine::{CallCtx, Engine, EngineInner, StepResult};
use crate::host::registry::RegSlot;
use crate::host::strand::{Strand, StrandState};
use crate::host::value::{Function, Value};

/// 一条脉络的原生句柄
pub struct Coroutine {
    engine: Weak<EngineInner>,
    strand: Rc<Strand>,
    /// 注册表锚：句柄活着，脉络就活着
    life: RegRef,
}

impl Coroutine {
    /// 以入口函数派生一条新脉络并锚定
    pub fn spawn(engine: &Engine, entry: Rc<Function>) -> Result<Coroutine, HostError> {
        let strand = engine.spawn(entry);
        let life = RegRef::register(engine, Value::Strand(strand.clone()))?;
        debug!(target: Phase::Bridge.target(), engine.logger(), "anchored strand {} behind a native handle", strand.id());
        Ok(Coroutine {
            engine: engine.downgrade(),
            strand,
            life,
        })
    }

    /// 锚定正在执行当前原生调用的脉络
    ///
    /// # Panics
    ///
    /// 主脉络不可挂起，锚定它没有意义，直接 panic。
    pub fn pin_current(ctx: &CallCtx<'_>) -> Result<Coroutine, HostError> {
        let strand = ctx.strand();
        assert!(!strand.is_main(), "cannot pin the main strand");
        let life = RegRef::register(ctx.engine(), Value::Strand(strand.clone()))?;
        debug!(target: Phase::Bridge.target(), ctx.engine().logger(), "pinned strand {}", strand.id());
        Ok(Coroutine {
            engine: ctx.engine().downgrade(),
            strand: strand.clone(),
            life,
        })
    }

    pub fn strand(&self) -> &Rc<Strand> {
        &self.strand
    }

    pub fn state(&self) -> StrandState {
        self.strand.state()
    }

    /// 注册表锚所在的槽位
    pub fn life_slot(&self) -> RegSlot {
        self.life.slot()
    }

    fn engine(&self) -> Result<Engine, HostError> {
        self.engine
            .upgrade()
            .map(Engine::from_inner)
            .ok_or_else(|| HostError::runtime("engine has been dropped"))
    }

    /// 恢复脉络执行
    ///
    /// Fresh 脉络把 args 作为入口实参，Suspended 脉络把 args 作为
    /// 让出点的值。对 Running、Finished、Errored 的脉络恢复会 panic。
    pub fn resume(&self, args: Vec<Value>) -> Result<StepResult, HostError> {
        let engine = self.engine()?;
        engine.resume(&self.strand, args)
    }

    /// 以单个值恢复
    pub fn resume_with(&self, value: Value) -> Result<StepResult, HostError> {
        self.resume(vec![value])
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coroutine")
            .field("strand", &self.strand.id())
            .field("state", &self.state())
            .finish()
    }
}
