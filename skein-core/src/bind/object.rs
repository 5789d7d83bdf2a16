//! 对象绑定
//!
//! 把一个 Rust 类型安置进脚本世界：值装进 userdata 单元，方法表
//! 在绑定期静态建好（能力表），脚本的方法调用直接查表分发。
//! 方法的第一个实参是接收者本身；形参转换复用类型化调用机制，
//! 槽位从 1 起步。

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::bind::call::{CallParam, CallReturn};
use crate::bind::closure::make_closure;
use crate::error::HostError;
use crate::host::engine::CallCtx;
use crate::host::value::{CapTable, Finalizer, Function, UserData, Value};

/// 可注册为脚本方法的原生可调用对象（接收者 + 形参元组）
pub trait ScriptMethod<T, Args> {
    fn invoke(&self, ctx: &mut CallCtx<'_>) -> Result<usize, HostError>;
}

fn method_receiver(ctx: &CallCtx<'_>) -> Result<Rc<UserData>, HostError> {
    match ctx.arg(0) {
        Value::UserData(u) => Ok(u),
        other => Err(HostError::runtime(format!(
            "method receiver is a {} value",
            other.tag()
        ))),
    }
}

macro_rules! impl_script_method {
    ($(($($p:ident),*))*) => {$(
        #[allow(non_snake_case)]
        impl<Fun, T, Ret, $($p,)*> ScriptMethod<T, ($($p,)*)> for Fun
        where
            Fun: Fn(&mut T, $($p),*) -> Ret,
            T: Any,
            Ret: CallReturn,
            $($p: CallParam,)*
        {
            fn invoke(&self, ctx: &mut CallCtx<'_>) -> Result<usize, HostError> {
                let receiver = method_receiver(ctx)?;
                #[allow(unused_mut, unused_variables)]
                let mut slot = 1usize;
                $(
                    let $p = <$p as CallParam>::take(ctx, slot)?;
                    #[allow(unused_assignments)]
                    {
                        slot += usize::from(<$p as CallParam>::CONSUMES);
                    }
                )*
                // 形参都取完了才借用单元，方法体内不能重入同一对象
                let ret = receiver
                    .with_payload::<T, _>(|obj| self(obj, $($p),*))
                    .ok_or_else(|| {
                        HostError::runtime(format!(
                            "receiver is not a {} or is busy",
                            std::any::type_name::<T>()
                        ))
                    })?;
                ret.push_results(ctx)
            }
        }
    )*};
}

impl_script_method! {
    ()
    (P1)
    (P1, P2)
    (P1, P2, P3)
    (P1, P2, P3, P4)
    (P1, P2, P3, P4, P5)
    (P1, P2, P3, P4, P5, P6)
    (P1, P2, P3, P4, P5, P6, P7)
    (P1, P2, P3, P4, P5, P6, P7, P8)
}

/// 一个类型的脚本绑定构建器
pub struct ObjectBinder<T: Any> {
    type_name: &'static str,
    methods: HashMap<String, Rc<Function>>,
    finalizer: Option<Finalizer>,
    marker: PhantomData<fn(T)>,
}

impl<T: Any> ObjectBinder<T> {
    pub fn new(type_name: &'static str) -> ObjectBinder<T> {
        ObjectBinder {
            type_name,
            methods: HashMap::new(),
            finalizer: None,
            marker: PhantomData,
        }
    }

    /// 注册一个方法
    pub fn method<Args, F>(mut self, name: &str, f: F) -> Self
    where
        F: ScriptMethod<T, Args> + 'static,
        Args: 'static,
    {
        let func = make_closure(name, move |ctx: &mut CallCtx<'_>| {
            <F as ScriptMethod<T, Args>>::invoke(&f, ctx)
        });
        self.methods.insert(name.to_string(), func);
        self
    }

    /// 注册一个回收钩子，在 userdata 单元释放前恰好调用一次
    pub fn on_drop(mut self, f: impl Fn(&mut T) + 'static) -> Self {
        self.finalizer = Some(Box::new(move |payload: &mut dyn Any| {
            if let Some(obj) = payload.downcast_mut::<T>() {
                f(obj);
            }
        }));
        self
    }

    /// 固化为能力表
    pub fn build(self) -> Rc<CapTable> {
        Rc::new(CapTable {
            type_name: self.type_name,
            methods: self.methods,
            finalizer: self.finalizer,
        })
    }
}

/// 把一个值安置进脚本世界
pub fn emplace_object<T: Any>(caps: &Rc<CapTable>, value: T) -> Rc<UserData> {
    UserData::new(Box::new(value), caps.clone())
}
