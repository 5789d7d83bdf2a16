//! 引擎：运行循环与脉络调度
//!
//! 单线程所有权模型：引擎与它的所有脉络、注册表都在同一线程上，
//! 内部用 Rc/RefCell 共享。借用纪律：进入原生蹦床前必须释放
//! 所有栈借用，蹦床内可以自由反调宿主。

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use skein_config::{LimitConfig, Phase};
use skein_log::{debug, trace, Logger};

use crate::error::HostError;
use crate::host::chunk::Op;
use crate::host::registry::{RegSlot, Registry};
use crate::host::strand::{Frame, Strand, StrandState};
use crate::host::value::{Function, FunctionKind, RawNative, Table, TableKey, Value};

/// 一次恢复的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// 入口函数已返回，栈顶有 n 个结果值
    Finished(usize),
    /// 脉络在让出点挂起
    Suspended,
}

/// 进入一个函数的结果
pub(crate) enum Entered {
    /// 原生函数已同步返回 n 个结果
    Returned(usize),
    /// 原生函数请求了挂起
    Suspended,
    /// 压入了一个字节码帧，交给运行循环
    Descended,
}

pub(crate) struct EngineInner {
    limits: LimitConfig,
    logger: Arc<Logger>,
    registry: RefCell<Registry>,
    globals: Rc<Table>,
    main: Rc<Strand>,
    next_strand_id: Cell<u64>,
}

/// 脚本引擎句柄（廉价克隆，按身份比较）
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl PartialEq for Engine {
    fn eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Engine {
    pub fn new(limits: LimitConfig, logger: Arc<Logger>) -> Engine {
        let main = Strand::new(0, true);
        Engine {
            inner: Rc::new(EngineInner {
                limits,
                logger,
                registry: RefCell::new(Registry::new(limits.max_registry_entries)),
                globals: Table::new(),
                main,
                next_strand_id: Cell::new(1),
            }),
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.inner.logger
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.inner.limits
    }

    /// 主脉络（引擎生命周期内始终存活，不可挂起）
    pub fn main_strand(&self) -> &Rc<Strand> {
        &self.inner.main
    }

    /// 全局表
    pub fn globals(&self) -> &Rc<Table> {
        &self.inner.globals
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.inner.globals.set(TableKey::Str(Rc::from(name)), value);
    }

    pub fn global(&self, name: &str) -> Value {
        self.inner.globals.get(&TableKey::Str(Rc::from(name)))
    }

    /// 派生一条新脉络，入口函数压在其栈底
    pub fn spawn(&self, entry: Rc<Function>) -> Rc<Strand> {
        let id = self.inner.next_strand_id.get();
        self.inner.next_strand_id.set(id + 1);
        let strand = Strand::new(id, false);
        strand.push(Value::Function(entry));
        debug!(target: Phase::Host.target(), self.inner.logger, "spawned strand {}", id);
        strand
    }

    pub(crate) fn downgrade(&self) -> Weak<EngineInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<EngineInner>) -> Engine {
        Engine { inner }
    }

    // ---- 注册表 ----

    /// 注册表持有一个值，防止脚本侧回收
    pub fn register_value(&self, value: Value) -> Result<RegSlot, HostError> {
        self.inner
            .registry
            .borrow_mut()
            .register(value)
            .ok_or_else(|| HostError::memory("registry is full"))
    }

    pub fn registered_value(&self, slot: RegSlot) -> Value {
        self.inner.registry.borrow().get(slot)
    }

    pub fn unregister_value(&self, slot: RegSlot) {
        // 先把值取出来，再在注册表借用之外析构（终结器可能反调引擎）
        let value = self.inner.registry.borrow_mut().unregister(slot);
        drop(value);
    }

    pub fn registry_live_count(&self) -> usize {
        self.inner.registry.borrow().live_count()
    }

    // ---- 栈值搬运（宿主侧取结果 / 喂恢复参数用）----

    pub fn pop_value(&self, strand: &Rc<Strand>) -> Value {
        strand.pop()
    }

    pub fn push_value(&self, strand: &Rc<Strand>, value: Value) {
        strand.push(value);
    }

    // ---- 执行 ----

    /// 恢复一条脉络
    ///
    /// Fresh 脉络从入口函数开始执行，args 作为实参；
    /// Suspended 脉络从让出点继续，args 作为让出表达式的值。
    ///
    /// # Panics
    ///
    /// 对 Running、Finished 或 Errored 的脉络调用会 panic，
    /// 这属于宿主侧的使用错误而非可恢复错误。
    pub fn resume(&self, strand: &Rc<Strand>, args: Vec<Value>) -> Result<StepResult, HostError> {
        match strand.state() {
            StrandState::Running => panic!("resume called on a running strand"),
            StrandState::Finished => panic!("resume called on a finished strand"),
            StrandState::Errored => panic!("resume called on an errored strand"),
            StrandState::Fresh => {
                let entry = match strand.get(0) {
                    Value::Function(f) => f,
                    other => panic!("fresh strand without an entry function: {other:?}"),
                };
                strand.set_state(StrandState::Running);
                let argc = args.len();
                for arg in args {
                    strand.push(arg);
                }
                trace!(target: Phase::Host.target(), self.inner.logger, "resume fresh strand {}", strand.id());
                let entered = match self.enter_function(strand, entry, 0, 1, argc) {
                    Ok(e) => e,
                    Err(err) => return Err(self.mark_errored(strand, err)),
                };
                match entered {
                    Entered::Returned(n) => {
                        strand.set_state(StrandState::Finished);
                        Ok(StepResult::Finished(n))
                    }
                    Entered::Suspended => {
                        strand.set_state(StrandState::Suspended);
                        Ok(StepResult::Suspended)
                    }
                    Entered::Descended => self.run_to_completion(strand),
                }
            }
            StrandState::Suspended => {
                strand.set_state(StrandState::Running);
                let argc = args.len();
                for arg in args {
                    strand.push(arg);
                }
                trace!(target: Phase::Host.target(), self.inner.logger, "resume suspended strand {}", strand.id());
                if strand.frames.borrow().is_empty() {
                    // 入口原生函数在自身体内挂起过：恢复值就是它的返回值
                    strand.set_state(StrandState::Finished);
                    return Ok(StepResult::Finished(argc));
                }
                self.run_to_completion(strand)
            }
        }
    }

    fn run_to_completion(&self, strand: &Rc<Strand>) -> Result<StepResult, HostError> {
        match self.execute(strand, 0) {
            Ok(StepResult::Finished(n)) => {
                strand.set_state(StrandState::Finished);
                Ok(StepResult::Finished(n))
            }
            Ok(StepResult::Suspended) => {
                strand.set_state(StrandState::Suspended);
                Ok(StepResult::Suspended)
            }
            Err(err) => Err(self.mark_errored(strand, err)),
        }
    }

    fn mark_errored(&self, strand: &Rc<Strand>, err: HostError) -> HostError {
        debug!(target: Phase::Host.target(), self.inner.logger, "strand {} errored: {}", strand.id(), err);
        strand.set_state(StrandState::Errored);
        // 帧和栈上的值在两个借用都释放后析构
        let frames: Vec<Frame> = std::mem::take(&mut *strand.frames.borrow_mut());
        drop(frames);
        strand.truncate(0);
        err
    }

    /// 受保护调用：在指定脉络上同步调用一个函数并取回单个结果
    ///
    /// 调用期间的错误不会把脉络标记为 Errored，栈和帧恢复原状。
    /// 被调链路里出现让出是错误（让出不能穿过受保护调用边界）。
    pub fn call(
        &self,
        strand: &Rc<Strand>,
        func: Rc<Function>,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        let floor = strand.height();
        let base_frames = strand.frames.borrow().len();
        let argc = args.len();
        strand.push(Value::Function(func.clone()));
        for arg in args {
            strand.push(arg);
        }

        let unwind = || {
            let frames: Vec<Frame> = {
                let mut frames = strand.frames.borrow_mut();
                frames.split_off(base_frames)
            };
            drop(frames);
            strand.truncate(floor);
        };

        let entered = match self.enter_function(strand, func, floor, floor + 1, argc) {
            Ok(e) => e,
            Err(err) => {
                unwind();
                return Err(err);
            }
        };
        let outcome = match entered {
            Entered::Returned(n) => Ok(StepResult::Finished(n)),
            Entered::Suspended => Ok(StepResult::Suspended),
            Entered::Descended => self.execute(strand, base_frames),
        };
        match outcome {
            Ok(StepResult::Finished(_)) => {
                let result = if strand.height() > floor {
                    strand.get(floor)
                } else {
                    Value::Nil
                };
                strand.truncate(floor);
                Ok(result)
            }
            Ok(StepResult::Suspended) => {
                unwind();
                Err(HostError::runtime("attempt to yield across a protected call"))
            }
            Err(err) => {
                unwind();
                Err(err)
            }
        }
    }

    /// 进入一个函数
    ///
    /// 栈布局约定：ret_floor 指向调用占位（普通调用是被调者本身，
    /// 方法调用是接收者），实参从 args_start 开始共 argc 个。
    /// 返回时 [ret_floor, 结果) 区间被清理。
    pub(crate) fn enter_function(
        &self,
        strand: &Rc<Strand>,
        func: Rc<Function>,
        ret_floor: usize,
        args_start: usize,
        argc: usize,
    ) -> Result<Entered, HostError> {
        match &func.kind {
            FunctionKind::Chunk(chunk) => {
                if strand.frames.borrow().len() >= self.inner.limits.max_call_depth {
                    return Err(HostError::memory("call depth limit exceeded"));
                }
                if strand.height() + chunk.local_count() as usize
                    > self.inner.limits.max_stack_height
                {
                    return Err(HostError::memory("stack height limit exceeded"));
                }
                let chunk = chunk.clone();
                let arity = chunk.arity() as usize;
                let mut locals: Vec<Value> = Vec::with_capacity(chunk.local_count() as usize);
                let removed: Vec<Value> = {
                    let mut stack = strand.stack.borrow_mut();
                    // 多余实参丢弃，不足的补 nil
                    let taken = argc.min(arity);
                    locals.extend(stack.drain(args_start..args_start + taken));
                    stack.split_off(ret_floor)
                };
                drop(removed);
                locals.resize(chunk.local_count() as usize, Value::Nil);
                strand.frames.borrow_mut().push(Frame {
                    chunk,
                    pc: 0,
                    locals,
                    ret_floor,
                });
                Ok(Entered::Descended)
            }
            FunctionKind::Native(native) => {
                let trampoline: RawNative = native.trampoline;
                // ctx 借用 func 内的上值，调用期间 func 由这里的 Rc 保活
                let mut ctx = CallCtx {
                    engine: self,
                    strand,
                    base: args_start,
                    argc,
                    upvalues: &native.upvalues,
                };
                let nres = trampoline(&mut ctx)?;
                let height = strand.height();
                assert!(
                    height >= ret_floor + nres,
                    "native reported more results than it pushed"
                );
                if strand.suspend_requested.replace(false) {
                    assert!(nres == 0, "suspending native must not return results");
                    // 挂起点也要清场：恢复值将落在 ret_floor 上充当调用结果
                    strand.truncate(ret_floor);
                    return Ok(Entered::Suspended);
                }
                // 清掉占位与实参，只留结果
                let removed: Vec<Value> = {
                    let mut stack = strand.stack.borrow_mut();
                    stack.drain(ret_floor..height - nres).collect()
                };
                drop(removed);
                Ok(Entered::Returned(nres))
            }
        }
    }

    /// 运行循环：执行到帧栈回落至 base_frames 或发生让出
    fn execute(&self, strand: &Rc<Strand>, base_frames: usize) -> Result<StepResult, HostError> {
        loop {
            let (chunk, pc) = {
                let frames = strand.frames.borrow();
                let frame = frames.last().ok_or_else(|| {
                    HostError::runtime("execution without an active frame")
                })?;
                (frame.chunk.clone(), frame.pc)
            };
            let op = match chunk.op(pc) {
                Some(op) => *op,
                // 代码走到末尾视同无值返回
                None => Op::Return,
            };
            {
                let mut frames = strand.frames.borrow_mut();
                if let Some(frame) = frames.last_mut() {
                    frame.pc = pc + 1;
                }
            }

            match op {
                Op::LoadConst(k) => strand.push(chunk.constant(k)),
                Op::LoadNil => strand.push(Value::Nil),
                Op::LoadTrue => strand.push(Value::Boolean(true)),
                Op::LoadFalse => strand.push(Value::Boolean(false)),
                Op::LoadLocal(n) => {
                    let value = {
                        let frames = strand.frames.borrow();
                        let frame = frames.last().ok_or_else(|| {
                            HostError::runtime("execution without an active frame")
                        })?;
                        frame.locals.get(n as usize).cloned().unwrap_or(Value::Nil)
                    };
                    strand.push(value);
                }
                Op::StoreLocal(n) => {
                    let value = strand.pop();
                    let mut frames = strand.frames.borrow_mut();
                    if let Some(frame) = frames.last_mut() {
                        if let Some(slot) = frame.locals.get_mut(n as usize) {
                            *slot = value;
                        }
                    }
                }
                Op::Pop => {
                    let value = strand.pop();
                    drop(value);
                }
                Op::Call(argc) => {
                    let argc = argc as usize;
                    let height = strand.height();
                    if height < argc + 1 {
                        return Err(HostError::runtime("call with a short stack"));
                    }
                    let callee_index = height - argc - 1;
                    let callee = match strand.get(callee_index) {
                        Value::Function(f) => f,
                        other => {
                            return Err(HostError::runtime(format!(
                                "attempt to call a {} value",
                                other.tag()
                            )))
                        }
                    };
                    match self.enter_function(
                        strand,
                        callee,
                        callee_index,
                        callee_index + 1,
                        argc,
                    )? {
                        Entered::Returned(_) | Entered::Descended => {}
                        Entered::Suspended => return Ok(StepResult::Suspended),
                    }
                }
                Op::MethodCall { name, argc } => {
                    let argc = argc as usize;
                    let method_name = match chunk.constant(name) {
                        Value::Str(s) => s,
                        other => {
                            return Err(HostError::runtime(format!(
                                "method name constant is a {} value",
                                other.tag()
                            )))
                        }
                    };
                    let height = strand.height();
                    if height < argc + 1 {
                        return Err(HostError::runtime("method call with a short stack"));
                    }
                    let receiver_index = height - argc - 1;
                    let method = self.resolve_method(strand.get(receiver_index), &method_name)?;
                    // 接收者留在栈上充当第一个实参
                    match self.enter_function(
                        strand,
                        method,
                        receiver_index,
                        receiver_index,
                        argc + 1,
                    )? {
                        Entered::Returned(_) | Entered::Descended => {}
                        Entered::Suspended => return Ok(StepResult::Suspended),
                    }
                }
                Op::IndexGet => {
                    let key = strand.pop();
                    let container = strand.pop();
                    let result = match &container {
                        Value::Table(table) => match key.as_table_key() {
                            Some(table_key) => table.get(&table_key),
                            None => {
                                return Err(HostError::runtime(format!(
                                    "a {} value cannot index a table",
                                    key.tag()
                                )))
                            }
                        },
                        other => {
                            return Err(HostError::runtime(format!(
                                "attempt to index a {} value",
                                other.tag()
                            )))
                        }
                    };
                    strand.push(result);
                }
                Op::Yield => {
                    if strand.is_main() {
                        return Err(HostError::runtime(
                            "attempt to yield from the main strand",
                        ));
                    }
                    // 让出值留在栈顶，由恢复方取走
                    return Ok(StepResult::Suspended);
                }
                Op::Return | Op::ReturnValue => {
                    let result = if matches!(op, Op::ReturnValue) {
                        Some(strand.pop())
                    } else {
                        None
                    };
                    let frame = strand
                        .frames
                        .borrow_mut()
                        .pop()
                        .ok_or_else(|| HostError::runtime("return without an active frame"))?;
                    strand.truncate(frame.ret_floor);
                    let nres = match result {
                        Some(value) => {
                            strand.push(value);
                            1
                        }
                        None => 0,
                    };
                    if strand.frames.borrow().len() == base_frames {
                        return Ok(StepResult::Finished(nres));
                    }
                }
            }
        }
    }

    /// 解析某个值上的方法（userdata 查能力表，table 查字段）
    pub fn method_of(&self, receiver: &Value, name: &str) -> Result<Rc<Function>, HostError> {
        self.resolve_method(receiver.clone(), name)
    }

    fn resolve_method(&self, receiver: Value, name: &str) -> Result<Rc<Function>, HostError> {
        match &receiver {
            Value::UserData(userdata) => {
                userdata.caps().method(name).cloned().ok_or_else(|| {
                    HostError::runtime(format!(
                        "{} has no method '{}'",
                        userdata.caps().type_name(),
                        name
                    ))
                })
            }
            Value::Table(table) => {
                match table.get(&crate::host::value::TableKey::Str(Rc::from(name))) {
                    Value::Function(f) => Ok(f),
                    Value::Nil => Err(HostError::runtime(format!(
                        "table has no method '{name}'"
                    ))),
                    other => Err(HostError::runtime(format!(
                        "field '{}' is a {} value, not a method",
                        name,
                        other.tag()
                    ))),
                }
            }
            other => Err(HostError::runtime(format!(
                "attempt to invoke a method on a {} value",
                other.tag()
            ))),
        }
    }
}

/// 原生函数的调用上下文
///
/// 实参通过序号读取，结果压回脉络栈并在返回值里报数。
pub struct CallCtx<'a> {
    engine: &'a Engine,
    strand: &'a Rc<Strand>,
    base: usize,
    argc: usize,
    upvalues: &'a [Value],
}

impl<'a> CallCtx<'a> {
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn strand(&self) -> &Rc<Strand> {
        self.strand
    }

    pub fn argc(&self) -> usize {
        self.argc
    }

    /// 第 i 个实参（越界得到 Nil）
    pub fn arg(&self, i: usize) -> Value {
        if i < self.argc {
            self.strand.get(self.base + i)
        } else {
            Value::Nil
        }
    }

    pub fn upvalue(&self, i: usize) -> Value {
        self.upvalues.get(i).cloned().unwrap_or(Value::Nil)
    }

    /// 压入一个结果值（蹦床返回压入的总数）
    pub fn push(&self, value: Value) {
        self.strand.push(value);
    }

    /// 请求在本次原生调用返回后挂起当前脉络
    ///
    /// # Panics
    ///
    /// 在主脉络上请求挂起、或重复请求挂起，都是宿主侧 bug。
    pub fn request_suspend(&self) {
        assert!(
            !self.strand.is_main(),
            "cannot suspend the main strand"
        );
        assert!(
            !self.strand.suspend_requested.get(),
            "suspend already requested in this call"
        );
        self.strand.suspend_requested.set(true);
    }
}
