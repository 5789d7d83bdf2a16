//! 缓冲写入端桥
//!
//! 写入端只有一个动作：append 收下一个元素。两个方向：
//! 1. 脚本对象当原生写入端用（ScriptSink）：约定对象有 append
//!    方法，原生侧每收到一个元素就经受保护调用转发过去。
//! 2. 原生写入端暴露给脚本（sink_into_script）：userdata 带
//!    append(value) 方法，脚本逐个元素喂进来。
//!
//! 与序列桥不同，append 是同步调用：元素当场送达，没有挂起语义。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::bind::closure::make_closure;
use crate::bind::reference::RegRef;
use crate::error::HostError;
use crate::host::engine::{CallCtx, Engine, EngineInner};
use crate::host::value::{CapTable, UserData, Value};

/// 逐元素接收值的写入端
pub trait Sink {
    fn append(&mut self, value: Value) -> Result<(), HostError>;
}

/// 共享的写入端句柄
pub type SharedSink = Rc<RefCell<dyn Sink>>;

/// 持有 append 方法脚本对象的原生写入端
///
/// 对象由注册表引用锚定，句柄存活期间脚本侧收不回去。
pub struct ScriptSink {
    engine: Weak<EngineInner>,
    handler: RegRef,
}

impl ScriptSink {
    pub fn new(engine: &Engine, handler: Value) -> Result<ScriptSink, HostError> {
        Ok(ScriptSink {
            engine: engine.downgrade(),
            handler: RegRef::register(engine, handler)?,
        })
    }
}

impl Sink for ScriptSink {
    fn append(&mut self, value: Value) -> Result<(), HostError> {
        let engine = self
            .engine
            .upgrade()
            .map(Engine::from_inner)
            .ok_or_else(|| HostError::runtime("engine has been dropped"))?;
        let handler = self.handler.get();
        let method = engine.method_of(&handler, "append")?;
        // 接收者充当第一个实参
        engine
            .call(engine.main_strand(), method, vec![handler, value])
            .map(|_| ())
    }
}

// ---- 原生写入端暴露给脚本 ----

struct IntoScriptSinkCell {
    sink: SharedSink,
}

fn sink_caps() -> Rc<CapTable> {
    let method = make_closure("append", |ctx: &mut CallCtx<'_>| {
        let receiver = match ctx.arg(0) {
            Value::UserData(u) => u,
            other => {
                return Err(HostError::runtime(format!(
                    "method receiver is a {} value",
                    other.tag()
                )))
            }
        };
        let sink = receiver
            .with_payload::<IntoScriptSinkCell, _>(|cell| cell.sink.clone())
            .ok_or_else(|| HostError::runtime("receiver is not a sink"))?;
        sink.borrow_mut().append(ctx.arg(1))?;
        Ok(0)
    });
    let mut methods = std::collections::HashMap::new();
    methods.insert("append".to_string(), method);
    Rc::new(CapTable {
        type_name: "sink",
        methods,
        finalizer: None,
    })
}

/// 把原生写入端包装成脚本可见的 userdata
pub fn sink_into_script(sink: SharedSink) -> Rc<UserData> {
    UserData::new(Box::new(IntoScriptSinkCell { sink }), sink_caps())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::closure::register_closure;
    use crate::host::chunk::{Chunk, Op};
    use crate::host::value::{Function, Table, TableKey};
    use crate::test_support::test_engine;

    /// 测试用写入端：把元素收进向量
    struct VecSink {
        out: Rc<RefCell<Vec<Value>>>,
    }

    impl Sink for VecSink {
        fn append(&mut self, value: Value) -> Result<(), HostError> {
            self.out.borrow_mut().push(value);
            Ok(())
        }
    }

    fn vec_sink() -> (SharedSink, Rc<RefCell<Vec<Value>>>) {
        let out: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: SharedSink = Rc::new(RefCell::new(VecSink { out: out.clone() }));
        (sink, out)
    }

    #[test]
    fn test_script_sink_forwards_elements_to_handler() {
        let engine = test_engine();
        // 脚本侧写入端：append 把元素记进全局表
        let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        let record = seen.clone();
        register_closure(&engine, "record", move |ctx: &mut CallCtx<'_>| {
            // arg 0 是接收者本身
            record.borrow_mut().push(ctx.arg(1));
            Ok(0)
        });
        let handler = Table::new();
        handler.set(TableKey::Str("append".into()), engine.global("record"));

        let mut sink = ScriptSink::new(&engine, Value::Table(handler)).unwrap();
        sink.append(Value::Integer(1)).unwrap();
        sink.append(Value::Str("two".into())).unwrap();
        assert_eq!(
            seen.borrow().as_slice(),
            &[Value::Integer(1), Value::Str("two".into())]
        );
    }

    #[test]
    fn test_script_sink_anchors_handler_until_drop() {
        let engine = test_engine();
        let handler = Table::new();
        let sink = ScriptSink::new(&engine, Value::Table(handler)).unwrap();
        assert_eq!(engine.registry_live_count(), 1);
        drop(sink);
        assert_eq!(engine.registry_live_count(), 0);
    }

    #[test]
    fn test_script_sink_without_append_method_errors() {
        let engine = test_engine();
        let handler = Table::new();
        let mut sink = ScriptSink::new(&engine, Value::Table(handler)).unwrap();
        let err = sink.append(Value::Integer(1)).unwrap_err();
        assert!(err.message.contains("no method 'append'"), "{}", err.message);
    }

    #[test]
    fn test_into_script_collects_appended_values() {
        let engine = test_engine();
        let (sink, out) = vec_sink();
        let wrapped = sink_into_script(sink);

        let method = wrapped.caps().method("append").cloned().unwrap();
        for value in [Value::Integer(4), Value::Nil, Value::Str("end".into())] {
            engine
                .call(
                    engine.main_strand(),
                    method.clone(),
                    vec![Value::UserData(wrapped.clone()), value],
                )
                .unwrap();
        }
        assert_eq!(
            out.borrow().as_slice(),
            &[Value::Integer(4), Value::Nil, Value::Str("end".into())]
        );
    }

    #[test]
    fn test_into_script_append_via_method_call_op() {
        let engine = test_engine();
        let (sink, out) = vec_sink();
        let wrapped = sink_into_script(sink);

        // entry: sink:append(9); return
        let mut chunk = Chunk::new("entry", 0);
        let receiver = chunk.add_constant(Value::UserData(wrapped));
        let nine = chunk.add_constant(Value::Integer(9));
        let name = chunk.add_constant(Value::Str("append".into()));
        chunk.write_op(Op::LoadConst(receiver));
        chunk.write_op(Op::LoadConst(nine));
        chunk.write_op(Op::MethodCall { name, argc: 1 });
        chunk.write_op(Op::Return);
        engine
            .call(engine.main_strand(), Function::from_chunk(chunk.finish()), vec![])
            .unwrap();
        assert_eq!(out.borrow().as_slice(), &[Value::Integer(9)]);
    }

    #[test]
    fn test_into_script_wrong_receiver_errors() {
        let engine = test_engine();
        let (sink, _) = vec_sink();
        let wrapped = sink_into_script(sink);
        let method = wrapped.caps().method("append").cloned().unwrap();
        let err = engine
            .call(
                engine.main_strand(),
                method,
                vec![Value::Integer(0), Value::Integer(1)],
            )
            .unwrap_err();
        assert!(err.message.contains("method receiver"), "{}", err.message);
    }
}
