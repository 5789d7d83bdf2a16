//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数：静默引擎、可手动触发的序列源、
//! 常用字节码块的构造器。

use std::cell::RefCell;
use std::rc::Rc;

use skein_config::LimitConfig;
use skein_core::bind::{Observable, Observer};
use skein_core::host::{Chunk, Engine, Function, Op, Value};
use skein_core::HostError;
use skein_log::Logger;

/// 默认上限、静默日志的引擎
pub fn test_engine() -> Engine {
    Engine::new(LimitConfig::default(), Logger::noop())
}

/// 指定上限的引擎
#[allow(dead_code)]
pub fn test_engine_with(limits: LimitConfig) -> Engine {
    Engine::new(limits, Logger::noop())
}

/// 手动触发完成的序列源
pub struct ManualSource {
    pending: Option<Box<dyn Observer>>,
}

impl ManualSource {
    pub fn shared() -> Rc<RefCell<ManualSource>> {
        Rc::new(RefCell::new(ManualSource { pending: None }))
    }
}

impl Observable for ManualSource {
    fn async_get_one(&mut self, observer: Box<dyn Observer>) -> Result<(), HostError> {
        assert!(
            self.pending.is_none(),
            "a request is already outstanding on this observable"
        );
        self.pending = Some(observer);
        Ok(())
    }
}

#[allow(dead_code)]
pub fn has_pending(source: &Rc<RefCell<ManualSource>>) -> bool {
    source.borrow().pending.is_some()
}

/// 把下一个元素送给等待者
#[allow(dead_code)]
pub fn fire(source: &Rc<RefCell<ManualSource>>, value: Value) -> Result<(), HostError> {
    let observer = source
        .borrow_mut()
        .pending
        .take()
        .expect("no outstanding request");
    observer.got_element(value)
}

/// 宣告序列结束
#[allow(dead_code)]
pub fn finish(source: &Rc<RefCell<ManualSource>>) -> Result<(), HostError> {
    let observer = source
        .borrow_mut()
        .pending
        .take()
        .expect("no outstanding request");
    observer.ended()
}

/// 构造「调用全局函数并返回其结果」的入口块
#[allow(dead_code)]
pub fn call_global_entry(engine: &Engine, fn_name: &str, args: &[Value]) -> Rc<Function> {
    let mut chunk = Chunk::new("entry", 0);
    let globals = chunk.add_constant(Value::Table(engine.globals().clone()));
    let name = chunk.add_constant(Value::Str(fn_name.into()));
    chunk.write_op(Op::LoadConst(globals));
    chunk.write_op(Op::LoadConst(name));
    chunk.write_op(Op::IndexGet);
    for arg in args {
        let k = chunk.add_constant(arg.clone());
        chunk.write_op(Op::LoadConst(k));
    }
    chunk.write_op(Op::Call(args.len() as u8));
    chunk.write_op(Op::ReturnValue);
    Function::from_chunk(chunk.finish())
}
