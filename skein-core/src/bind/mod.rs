//! 原生绑定桥
//!
//! 原生 Rust 代码与脚本世界之间的全部通道：
//! - [`slot`]：脉络栈上的临时值纪律（栈守卫）
//! - [`reference`]：注册表引用，原生侧的持久强持有
//! - [`convert`]：类型转换与联合类型
//! - [`call`]：类型化函数注册（形参按槽位循环取出）
//! - [`closure`]：任意闭包封装成脚本函数
//! - [`object`]：对象安置与方法分发（能力表）
//! - [`coroutine`]：可挂起脉络的原生句柄
//! - [`observe`]：可观测序列与脚本世界的互通
//! - [`sink`]：缓冲写入端与脚本世界的互通

pub mod call;
pub mod closure;
pub mod convert;
pub mod coroutine;
pub mod object;
pub mod observe;
pub mod reference;
pub mod sink;
pub mod slot;

pub use call::{bind_fn, register_fn, CallParam, CallReturn, CurrentStrand, ScriptFunction};
pub use closure::{make_closure, register_closure};
pub use convert::{FromValue, OneOf2, OneOf3, ToValue};
pub use coroutine::Coroutine;
pub use object::{emplace_object, ObjectBinder, ScriptMethod};
pub use observe::{
    await_next, observable_into_script, register_async_fn, Observable, Observer,
    ScriptObservable, SharedObservable,
};
pub use reference::RegRef;
pub use sink::{sink_into_script, ScriptSink, SharedSink, Sink};
pub use slot::{Slot, StackGuard};
