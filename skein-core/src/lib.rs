//! skein-core - 嵌入式脚本宿主与原生绑定桥
//!
//! 两层结构：
//! - [`host`]：值模型、字节码块、脉络（逻辑调用栈）、注册表和运行循环
//! - [`bind`]：原生 Rust 与脚本世界的桥（栈守卫、引用、类型转换、
//!   闭包与函数注册、对象绑定、协程桥、可观测序列适配）
//!
//! 所有权是单线程的：一个 [`host::Engine`] 和它的脉络、注册表
//! 同属一个线程，句柄类型内部用 `Rc` 共享。

pub mod bind;
pub mod error;
pub mod host;

pub use error::{ConvertError, HostError, HostErrorCode};
