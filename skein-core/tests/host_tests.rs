//! 宿主执行测试
//!
//! 引擎运行循环、资源上限、错误传播与脉络状态机的端到端测试。

mod common;

use common::{test_engine, test_engine_with};
use skein_config::LimitConfig;
use skein_core::bind::{register_fn, Coroutine};
use skein_core::host::{Chunk, Function, Op, StepResult, StrandState, Table, TableKey, Value};
use skein_core::HostErrorCode;

#[test]
fn test_chunk_returns_constant() {
    let engine = test_engine();
    let mut chunk = Chunk::new("main", 0);
    let k = chunk.add_constant(Value::Integer(7));
    chunk.write_op(Op::LoadConst(k));
    chunk.write_op(Op::ReturnValue);
    let result = engine
        .call(engine.main_strand(), Function::from_chunk(chunk.finish()), vec![])
        .unwrap();
    assert_eq!(result, Value::Integer(7));
    assert_eq!(engine.main_strand().height(), 0);
}

#[test]
fn test_locals_and_arguments() {
    let engine = test_engine();
    // f(a, b): c = a; return c（b 故意不用）
    let mut chunk = Chunk::new("f", 2);
    chunk.reserve_locals(1);
    chunk.write_op(Op::LoadLocal(0));
    chunk.write_op(Op::StoreLocal(2));
    chunk.write_op(Op::LoadLocal(2));
    chunk.write_op(Op::ReturnValue);
    let result = engine
        .call(
            engine.main_strand(),
            Function::from_chunk(chunk.finish()),
            vec![Value::Str("left".into()), Value::Str("right".into())],
        )
        .unwrap();
    assert_eq!(result, Value::Str("left".into()));
}

#[test]
fn test_missing_arguments_become_nil() {
    let engine = test_engine();
    let mut chunk = Chunk::new("f", 2);
    chunk.write_op(Op::LoadLocal(1));
    chunk.write_op(Op::ReturnValue);
    let result = engine
        .call(
            engine.main_strand(),
            Function::from_chunk(chunk.finish()),
            vec![Value::Integer(1)],
        )
        .unwrap();
    assert_eq!(result, Value::Nil);
}

#[test]
fn test_nested_chunk_calls() {
    let engine = test_engine();
    // inner(x): return x
    let mut inner = Chunk::new("inner", 1);
    inner.write_op(Op::LoadLocal(0));
    inner.write_op(Op::ReturnValue);
    let inner = Function::from_chunk(inner.finish());

    // outer(): return inner(5)
    let mut outer = Chunk::new("outer", 0);
    let f = outer.add_constant(Value::Function(inner));
    let five = outer.add_constant(Value::Integer(5));
    outer.write_op(Op::LoadConst(f));
    outer.write_op(Op::LoadConst(five));
    outer.write_op(Op::Call(1));
    outer.write_op(Op::ReturnValue);

    let result = engine
        .call(engine.main_strand(), Function::from_chunk(outer.finish()), vec![])
        .unwrap();
    assert_eq!(result, Value::Integer(5));
}

#[test]
fn test_call_non_function_is_runtime_error() {
    let engine = test_engine();
    let mut chunk = Chunk::new("main", 0);
    let k = chunk.add_constant(Value::Integer(3));
    chunk.write_op(Op::LoadConst(k));
    chunk.write_op(Op::Call(0));
    chunk.write_op(Op::Return);
    let err = engine
        .call(engine.main_strand(), Function::from_chunk(chunk.finish()), vec![])
        .unwrap_err();
    assert_eq!(err.code, HostErrorCode::Runtime);
    assert!(err.message.contains("attempt to call"), "{}", err.message);
    // 受保护调用失败后主脉络栈保持平衡
    assert_eq!(engine.main_strand().height(), 0);
    assert_eq!(engine.main_strand().state(), StrandState::Running);
}

#[test]
fn test_index_get_on_table() {
    let engine = test_engine();
    let table = Table::new();
    table.set(TableKey::Integer(1), Value::Str("one".into()));

    let mut chunk = Chunk::new("main", 0);
    let t = chunk.add_constant(Value::Table(table));
    let k = chunk.add_constant(Value::Integer(1));
    chunk.write_op(Op::LoadConst(t));
    chunk.write_op(Op::LoadConst(k));
    chunk.write_op(Op::IndexGet);
    chunk.write_op(Op::ReturnValue);
    let result = engine
        .call(engine.main_strand(), Function::from_chunk(chunk.finish()), vec![])
        .unwrap();
    assert_eq!(result, Value::Str("one".into()));
}

#[test]
fn test_call_depth_limit() {
    let engine = test_engine_with(LimitConfig {
        max_call_depth: 8,
        ..LimitConfig::default()
    });
    // 原生函数递归调用自己直到超深
    let recurse = register_fn(&engine, "recurse", {
        let engine = engine.clone();
        move |n: i64| -> Result<i64, skein_core::HostError> {
            if n <= 0 {
                return Ok(0);
            }
            let f = match engine.global("recurse_chunk") {
                Value::Function(f) => f,
                other => panic!("chunk missing: {other:?}"),
            };
            let v = engine.call(engine.main_strand(), f, vec![Value::Integer(n - 1)])?;
            Ok(v.as_integer().unwrap_or(0))
        }
    });

    // chunk(n): return recurse(n)
    let mut chunk = Chunk::new("recurse_chunk", 1);
    let f = chunk.add_constant(Value::Function(recurse));
    chunk.write_op(Op::LoadConst(f));
    chunk.write_op(Op::LoadLocal(0));
    chunk.write_op(Op::Call(1));
    chunk.write_op(Op::ReturnValue);
    let chunk_fn = Function::from_chunk(chunk.finish());
    engine.set_global("recurse_chunk", Value::Function(chunk_fn.clone()));

    let err = engine
        .call(engine.main_strand(), chunk_fn, vec![Value::Integer(100)])
        .unwrap_err();
    assert_eq!(err.code, HostErrorCode::Memory);
    assert!(err.message.contains("call depth"), "{}", err.message);
    assert_eq!(engine.main_strand().height(), 0);
}

#[test]
fn test_registry_capacity_limit() {
    let engine = test_engine_with(LimitConfig {
        max_registry_entries: 2,
        ..LimitConfig::default()
    });
    let a = engine.register_value(Value::Integer(1)).unwrap();
    let b = engine.register_value(Value::Integer(2)).unwrap();
    let err = engine.register_value(Value::Integer(3)).unwrap_err();
    assert_eq!(err.code, HostErrorCode::Memory);
    engine.unregister_value(a);
    engine.unregister_value(b);
    assert_eq!(engine.registry_live_count(), 0);
}

#[test]
fn test_strand_error_state_is_terminal() {
    let engine = test_engine();
    let mut chunk = Chunk::new("entry", 0);
    let k = chunk.add_constant(Value::Integer(1));
    chunk.write_op(Op::LoadConst(k));
    chunk.write_op(Op::Call(0));
    chunk.write_op(Op::Return);
    let coro = Coroutine::spawn(&engine, Function::from_chunk(chunk.finish())).unwrap();
    let err = coro.resume(vec![]).unwrap_err();
    assert_eq!(err.code, HostErrorCode::Runtime);
    assert_eq!(coro.state(), StrandState::Errored);
    // 出错的脉络栈被清空
    assert_eq!(coro.strand().height(), 0);
}

#[test]
fn test_yield_on_main_strand_is_error() {
    let engine = test_engine();
    let mut chunk = Chunk::new("main", 0);
    let k = chunk.add_constant(Value::Integer(1));
    chunk.write_op(Op::LoadConst(k));
    chunk.write_op(Op::Yield);
    chunk.write_op(Op::Return);
    let err = engine
        .call(engine.main_strand(), Function::from_chunk(chunk.finish()), vec![])
        .unwrap_err();
    assert!(
        err.message.contains("yield from the main strand"),
        "{}",
        err.message
    );
}

#[test]
fn test_multiple_strands_interleave() {
    let engine = test_engine();
    let entry = || {
        let mut chunk = Chunk::new("entry", 1);
        let one = chunk.add_constant(Value::Integer(1));
        chunk.write_op(Op::LoadConst(one));
        chunk.write_op(Op::Yield);
        chunk.write_op(Op::ReturnValue);
        Function::from_chunk(chunk.finish())
    };
    let a = Coroutine::spawn(&engine, entry()).unwrap();
    let b = Coroutine::spawn(&engine, entry()).unwrap();

    assert_eq!(a.resume(vec![Value::Integer(10)]).unwrap(), StepResult::Suspended);
    assert_eq!(b.resume(vec![Value::Integer(20)]).unwrap(), StepResult::Suspended);
    assert_eq!(engine.pop_value(a.strand()), Value::Integer(1));
    assert_eq!(engine.pop_value(b.strand()), Value::Integer(1));

    assert_eq!(b.resume_with(Value::Integer(200)).unwrap(), StepResult::Finished(1));
    assert_eq!(a.resume_with(Value::Integer(100)).unwrap(), StepResult::Finished(1));
    assert_eq!(engine.pop_value(a.strand()), Value::Integer(100));
    assert_eq!(engine.pop_value(b.strand()), Value::Integer(200));
}

#[test]
fn test_engine_records_carry_phase_targets() {
    let ring = skein_log::LogRingBuffer::new(32);
    let logger = skein_log::Logger::new(skein_log::Level::Trace).with_sink(ring.clone());
    let engine = skein_core::host::Engine::new(LimitConfig::default(), logger);

    let mut chunk = Chunk::new("entry", 0);
    chunk.write_op(Op::Return);
    let coro = Coroutine::spawn(&engine, Function::from_chunk(chunk.finish())).unwrap();
    coro.resume(vec![]).unwrap();

    let records = ring.dump_records();
    assert!(records.iter().any(|r| r.target == "skein::host"));
    assert!(records.iter().any(|r| r.target == "skein::bridge"));
}
