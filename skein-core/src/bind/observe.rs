//! 可观测序列桥
//!
//! 三件事：
//! 1. 原生序列接到挂起的脉络上（register_async_fn）：脚本调用
//!    异步函数时脉络挂起，序列下一个元素到达时以它为值恢复，
//!    序列结束以 nil 恢复。
//! 2. 原生序列暴露给脚本（observable_into_script）：userdata 带
//!    async_get_one(callback) 方法，元素经注册表持有的回调送回。
//! 3. 脚本对象当原生序列用（ScriptObservable）：约定对象有
//!    async_get_one 方法。句柄析构即取消，晚到的回调静默忽略。
//!
//! 完成必须异步送达：请求发起方的原生调用还没返回时送完成是
//! 错误（宿主单线程，脉络此刻还在 Running）。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use skein_config::Phase;
use skein_log::trace;

use crate::bind::closure::{make_closure, register_closure};
use crate::bind::coroutine::Coroutine;
use crate::bind::reference::RegRef;
use crate::error::HostError;
use crate::host::engine::{CallCtx, Engine, EngineInner};
use crate::host::strand::StrandState;
use crate::host::value::{CapTable, Function, UserData, Value};

/// 一次性完成回调：元素或结束，恰好其一，恰好一次
pub trait Observer {
    fn got_element(self: Box<Self>, value: Value) -> Result<(), HostError>;
    fn ended(self: Box<Self>) -> Result<(), HostError>;
}

/// 按需产出元素的序列
///
/// 同一时刻至多一个未完成的请求，多发是调用方的 bug。
pub trait Observable {
    fn async_get_one(&mut self, observer: Box<dyn Observer>) -> Result<(), HostError>;
}

/// 共享的序列句柄
pub type SharedObservable = Rc<RefCell<dyn Observable>>;

/// 完成时恢复一条挂起脉络的观察者
struct ResumeObserver {
    coroutine: Coroutine,
}

impl ResumeObserver {
    fn deliver(self: Box<Self>, value: Value) -> Result<(), HostError> {
        if self.coroutine.state() == StrandState::Running {
            // 请求发起方还没走到挂起点
            return Err(HostError::handler(
                "completion delivered while the strand is still running",
            ));
        }
        self.coroutine.resume_with(value).map(|_| ())
    }
}

impl Observer for ResumeObserver {
    fn got_element(self: Box<Self>, value: Value) -> Result<(), HostError> {
        self.deliver(value)
    }

    fn ended(self: Box<Self>) -> Result<(), HostError> {
        // 序列结束：以 nil 恢复，脚本侧把 nil 当结束标记
        self.deliver(Value::Nil)
    }
}

/// 把一条挂起脉络接到序列的下一个元素上
///
/// 调用方负责随后让脉络真正挂起（[`CallCtx::request_suspend`]）。
pub fn await_next(coroutine: Coroutine, source: &SharedObservable) -> Result<(), HostError> {
    source
        .borrow_mut()
        .async_get_one(Box::new(ResumeObserver { coroutine }))
}

/// 注册一个异步脚本函数
///
/// 脚本在非主脉络上调用它时：select_source 挑出本次请求的序列，
/// 脉络挂起；元素到达时成为调用表达式的值。主脉络上调用会 panic
/// （主脉络不可挂起）。
pub fn register_async_fn<F>(engine: &Engine, name: &str, select_source: F) -> Rc<Function>
where
    F: Fn(&mut CallCtx<'_>) -> Result<SharedObservable, HostError> + 'static,
{
    register_closure(engine, name, move |ctx| {
        let source = select_source(ctx)?;
        let coroutine = Coroutine::pin_current(ctx)?;
        trace!(target: Phase::Bridge.target(), ctx.engine().logger(), "strand {} awaiting next element", ctx.strand().id());
        await_next(coroutine, &source)?;
        ctx.request_suspend();
        Ok(0)
    })
}

// ---- 原生序列暴露给脚本 ----

struct IntoScriptCell {
    source: SharedObservable,
}

/// 持有脚本回调的观察者：引擎先消亡时回调变成空操作
struct ScriptCallbackObserver {
    engine: Weak<EngineInner>,
    callback: RegRef,
}

impl ScriptCallbackObserver {
    fn deliver(self: Box<Self>, args: Vec<Value>) -> Result<(), HostError> {
        let engine = match self.engine.upgrade() {
            Some(inner) => Engine::from_inner(inner),
            None => return Ok(()),
        };
        let callback = match self.callback.get() {
            Value::Function(f) => f,
            // 引用已失效：陈旧完成，按空操作处理
            _ => return Ok(()),
        };
        engine
            .call(engine.main_strand(), callback, args)
            .map(|_| ())
    }
}

impl Observer for ScriptCallbackObserver {
    fn got_element(self: Box<Self>, value: Value) -> Result<(), HostError> {
        self.deliver(vec![value])
    }

    fn ended(self: Box<Self>) -> Result<(), HostError> {
        // 结束：无参调用，脚本侧收到 nil
        self.deliver(vec![])
    }
}

fn into_script_caps() -> Rc<CapTable> {
    let method = make_closure("async_get_one", |ctx: &mut CallCtx<'_>| {
        let receiver = match ctx.arg(0) {
            Value::UserData(u) => u,
            other => {
                return Err(HostError::runtime(format!(
                    "method receiver is a {} value",
                    other.tag()
                )))
            }
        };
        let callback = match ctx.arg(1) {
            Value::Function(f) => f,
            other => {
                return Err(HostError::runtime(format!(
                    "bad argument #2: expected function, got {}",
                    other.tag()
                )))
            }
        };
        let engine = ctx.engine().clone();
        let source = receiver
            .with_payload::<IntoScriptCell, _>(|cell| cell.source.clone())
            .ok_or_else(|| HostError::runtime("receiver is not an observable"))?;
        let observer = Box::new(ScriptCallbackObserver {
            engine: engine.downgrade(),
            callback: RegRef::register(&engine, Value::Function(callback))?,
        });
        source.borrow_mut().async_get_one(observer)?;
        Ok(0)
    });
    let mut methods = std::collections::HashMap::new();
    methods.insert("async_get_one".to_string(), method);
    Rc::new(CapTable {
        type_name: "observable",
        methods,
        finalizer: None,
    })
}

/// 把原生序列包装成脚本可见的 userdata
pub fn observable_into_script(source: SharedObservable) -> Rc<UserData> {
    UserData::new(Box::new(IntoScriptCell { source }), into_script_caps())
}

// ---- 脚本对象当原生序列用 ----

/// 包装一个带 async_get_one 方法的脚本对象
///
/// 析构即取消：未完成的请求被丢弃，之后脚本侧补发的回调
/// 找不到等待者，静默忽略。
pub struct ScriptObservable {
    engine: Weak<EngineInner>,
    object: RegRef,
    pending: Rc<RefCell<Option<Box<dyn Observer>>>>,
}

impl ScriptObservable {
    pub fn new(engine: &Engine, object: Value) -> Result<ScriptObservable, HostError> {
        Ok(ScriptObservable {
            engine: engine.downgrade(),
            object: RegRef::register(engine, object)?,
            pending: Rc::new(RefCell::new(None)),
        })
    }
}

impl Observable for ScriptObservable {
    fn async_get_one(&mut self, observer: Box<dyn Observer>) -> Result<(), HostError> {
        assert!(
            self.pending.borrow().is_none(),
            "a request is already outstanding on this observable"
        );
        let engine = self
            .engine
            .upgrade()
            .map(Engine::from_inner)
            .ok_or_else(|| HostError::runtime("engine has been dropped"))?;
        *self.pending.borrow_mut() = Some(observer);

        let waiting = Rc::downgrade(&self.pending);
        let callback = make_closure("observer_callback", move |ctx: &mut CallCtx<'_>| {
            let value = ctx.arg(0);
            let pending = match waiting.upgrade() {
                Some(p) => p,
                // 等待者已析构：陈旧回调
                None => return Ok(0),
            };
            let observer = match pending.borrow_mut().take() {
                Some(o) => o,
                // 重复回调
                None => return Ok(0),
            };
            if value.is_nil() {
                observer.ended()?;
            } else {
                observer.got_element(value)?;
            }
            Ok(0)
        });

        let object = self.object.get();
        let method = engine.method_of(&object, "async_get_one")?;
        engine
            .call(
                engine.main_strand(),
                method,
                vec![object, Value::Function(callback)],
            )
            .map(|_| ())
    }
}
