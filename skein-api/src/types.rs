//! API 类型定义
//!
//! 会话运行的输出类型。

use skein_core::host::Value;

/// 执行输出
#[derive(Debug)]
pub struct ExecuteOutput {
    /// 入口脉络的返回值
    pub value: Option<Value>,
    /// 反应器走过的虚拟时刻数
    pub ticks: u64,
}
