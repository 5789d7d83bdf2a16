//! 闭包注册
//!
//! 任意 Rust 闭包封装成脚本可调用的函数对象。闭包本体放在一个
//! userdata 单元里充当上值 0，蹦床按闭包的具体类型单态化成普通
//! 函数指针，调用时从单元里取回闭包再转发。闭包的析构随 userdata
//! 的回收自动发生，不需要独立的终结器。

use std::rc::Rc;

use crate::error::HostError;
use crate::host::engine::{CallCtx, Engine};
use crate::host::value::{CapTable, Function, UserData, Value};

fn closure_trampoline<F>(ctx: &mut CallCtx<'_>) -> Result<usize, HostError>
where
    F: Fn(&mut CallCtx<'_>) -> Result<usize, HostError> + 'static,
{
    let cell = match ctx.upvalue(0) {
        Value::UserData(u) => u,
        other => {
            return Err(HostError::runtime(format!(
                "closure upvalue is a {} value",
                other.tag()
            )))
        }
    };
    // 取出 Rc 后立刻释放单元借用，允许闭包递归调用自己
    let callable: Rc<F> = cell
        .with_payload::<Rc<F>, _>(|f| f.clone())
        .ok_or_else(|| HostError::runtime("closure cell does not hold a callable"))?;
    callable.as_ref()(ctx)
}

/// 把一个 Rust 闭包包装成脚本函数对象
pub fn make_closure<F>(name: &str, f: F) -> Rc<Function>
where
    F: Fn(&mut CallCtx<'_>) -> Result<usize, HostError> + 'static,
{
    let cell = UserData::new(Box::new(Rc::new(f)), CapTable::plain("closure"));
    Function::native(
        Some(name.to_string()),
        closure_trampoline::<F>,
        vec![Value::UserData(cell)],
    )
}

/// 包装闭包并登记到引擎的全局表
pub fn register_closure<F>(engine: &Engine, name: &str, f: F) -> Rc<Function>
where
    F: Fn(&mut CallCtx<'_>) -> Result<usize, HostError> + 'static,
{
    let func = make_closure(name, f);
    engine.set_global(name, Value::Function(func.clone()));
    func
}
