//! 类型化函数注册
//!
//! 把任意签名的 Rust 函数/闭包注册成脚本函数：形参从调用上下文
//! 按槽位序号逐个取出转换（一个简单的递增计数循环），返回值经
//! CallReturn 压回栈。转换失败带上实参序号报错。

use std::rc::Rc;

use crate::bind::closure::make_closure;
use crate::bind::convert::{FromValue, OneOf2, OneOf3, ToValue};
use crate::bind::coroutine::Coroutine;
use crate::error::{ConvertError, HostError};
use crate::host::engine::{CallCtx, Engine};
use crate::host::strand::Strand;
use crate::host::value::{Function, Table, UserData, Value};

fn arg_error(slot: usize, err: ConvertError) -> HostError {
    HostError::runtime(format!("bad argument #{}: {}", slot + 1, err))
}

/// 从调用上下文的某个实参槽位取出一个原生值
///
/// CONSUMES 为 false 的形参不占实参槽位（句柄类形参从调用
/// 环境本身取得，后续形参的槽位序号不受影响）。
pub trait CallParam: Sized {
    const CONSUMES: bool = true;

    fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<Self, HostError>;
}

/// 把原生返回值压回脉络栈，报告结果个数
pub trait CallReturn {
    fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError>;
}

macro_rules! impl_call_via_convert {
    ($($ty:ty),* $(,)?) => {$(
        impl CallParam for $ty {
            fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<Self, HostError> {
                <$ty as FromValue>::from_value(ctx.arg(slot)).map_err(|e| arg_error(slot, e))
            }
        }

        impl CallReturn for $ty {
            fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError> {
                ctx.push(self.to_value());
                Ok(1)
            }
        }
    )*};
}

impl_call_via_convert!(
    bool, i8, i16, i32, i64, u8, u16, u32, usize, f32, f64, String,
    Rc<str>, Vec<u8>, *mut (), Rc<Table>, Rc<Function>, Rc<UserData>, Rc<Strand>, Value,
);

impl CallParam for () {
    fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<(), HostError> {
        <() as FromValue>::from_value(ctx.arg(slot)).map_err(|e| arg_error(slot, e))
    }
}

impl CallReturn for () {
    fn push_results(self, _ctx: &CallCtx<'_>) -> Result<usize, HostError> {
        Ok(0)
    }
}

impl<T: FromValue> CallParam for Option<T> {
    fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<Option<T>, HostError> {
        Option::<T>::from_value(ctx.arg(slot)).map_err(|e| arg_error(slot, e))
    }
}

impl<T: ToValue> CallReturn for Option<T> {
    fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError> {
        ctx.push(self.to_value());
        Ok(1)
    }
}

impl<A: FromValue, B: FromValue> CallParam for OneOf2<A, B> {
    fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<OneOf2<A, B>, HostError> {
        OneOf2::<A, B>::from_value(ctx.arg(slot)).map_err(|e| arg_error(slot, e))
    }
}

impl<A: ToValue, B: ToValue> CallReturn for OneOf2<A, B> {
    fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError> {
        ctx.push(self.to_value());
        Ok(1)
    }
}

impl<A: FromValue, B: FromValue, C: FromValue> CallParam for OneOf3<A, B, C> {
    fn take(ctx: &CallCtx<'_>, slot: usize) -> Result<OneOf3<A, B, C>, HostError> {
        OneOf3::<A, B, C>::from_value(ctx.arg(slot)).map_err(|e| arg_error(slot, e))
    }
}

impl<A: ToValue, B: ToValue, C: ToValue> CallReturn for OneOf3<A, B, C> {
    fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError> {
        ctx.push(self.to_value());
        Ok(1)
    }
}

/// 非消耗形参：当前调用所在的脉络句柄
pub struct CurrentStrand(pub Rc<Strand>);

impl CallParam for CurrentStrand {
    const CONSUMES: bool = false;

    fn take(ctx: &CallCtx<'_>, _slot: usize) -> Result<CurrentStrand, HostError> {
        Ok(CurrentStrand(ctx.strand().clone()))
    }
}

impl CallParam for Coroutine {
    const CONSUMES: bool = false;

    fn take(ctx: &CallCtx<'_>, _slot: usize) -> Result<Coroutine, HostError> {
        Coroutine::pin_current(ctx)
    }
}

impl<R: CallReturn> CallReturn for Result<R, HostError> {
    fn push_results(self, ctx: &CallCtx<'_>) -> Result<usize, HostError> {
        match self {
            Ok(value) => value.push_results(ctx),
            Err(err) => Err(err),
        }
    }
}

/// 可注册为脚本函数的原生可调用对象
///
/// Args 只用来区分同一个闭包类型可能满足的不同形参元组。
pub trait ScriptFunction<Args> {
    fn invoke(&self, ctx: &mut CallCtx<'_>) -> Result<usize, HostError>;
}

macro_rules! impl_script_function {
    ($(($($p:ident),*))*) => {$(
        #[allow(non_snake_case)]
        impl<Fun, Ret, $($p,)*> ScriptFunction<($($p,)*)> for Fun
        where
            Fun: Fn($($p),*) -> Ret,
            Ret: CallReturn,
            $($p: CallParam,)*
        {
            fn invoke(&self, ctx: &mut CallCtx<'_>) -> Result<usize, HostError> {
                #[allow(unused_mut, unused_variables)]
                let mut slot = 0usize;
                $(
                    let $p = <$p as CallParam>::take(ctx, slot)?;
                    #[allow(unused_assignments)]
                    {
                        slot += usize::from(<$p as CallParam>::CONSUMES);
                    }
                )*
                let ret = self($($p),*);
                ret.push_results(ctx)
            }
        }
    )*};
}

impl_script_function! {
    ()
    (P1)
    (P1, P2)
    (P1, P2, P3)
    (P1, P2, P3, P4)
    (P1, P2, P3, P4, P5)
    (P1, P2, P3, P4, P5, P6)
    (P1, P2, P3, P4, P5, P6, P7)
    (P1, P2, P3, P4, P5, P6, P7, P8)
    (P1, P2, P3, P4, P5, P6, P7, P8, P9)
    (P1, P2, P3, P4, P5, P6, P7, P8, P9, P10)
    (P1, P2, P3, P4, P5, P6, P7, P8, P9, P10, P11)
    (P1, P2, P3, P4, P5, P6, P7, P8, P9, P10, P11, P12)
}

/// 把类型化的 Rust 函数包装成脚本函数对象
pub fn bind_fn<Args, F>(name: &str, f: F) -> Rc<Function>
where
    F: ScriptFunction<Args> + 'static,
    Args: 'static,
{
    make_closure(name, move |ctx: &mut CallCtx<'_>| f.invoke(ctx))
}

/// 包装并登记到引擎的全局表
pub fn register_fn<Args, F>(engine: &Engine, name: &str, f: F) -> Rc<Function>
where
    F: ScriptFunction<Args> + 'static,
    Args: 'static,
{
    let func = bind_fn(name, f);
    engine.set_global(name, Value::Function(func.clone()));
    func
}
