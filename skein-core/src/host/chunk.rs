//! 字节码块
//!
//! 宿主执行的最小指令集。没有源语言前端，测试和宿主端示例
//! 直接用写入器辅助方法构造块。

use std::rc::Rc;

use crate::host::value::Value;

/// 指令
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    /// 压入常量池第 n 项
    LoadConst(u8),
    LoadNil,
    LoadTrue,
    LoadFalse,
    /// 压入局部槽 n 的值
    LoadLocal(u8),
    /// 弹出栈顶写入局部槽 n
    StoreLocal(u8),
    /// 弹出栈顶
    Pop,
    /// 调用：被调者在 argc 个实参之下
    Call(u8),
    /// 方法调用：接收者在 argc 个实参之下，方法名取常量池第 name 项
    MethodCall { name: u8, argc: u8 },
    /// 弹出键和容器，压入 container[key]
    IndexGet,
    /// 挂起当前脉络，栈顶为让出值
    Yield,
    /// 无值返回
    Return,
    /// 返回栈顶值
    ReturnValue,
}

/// 已编译的函数体
#[derive(Debug, Default)]
pub struct Chunk {
    name: String,
    arity: u8,
    local_count: u8,
    code: Vec<Op>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new(name: impl Into<String>, arity: u8) -> Chunk {
        Chunk {
            name: name.into(),
            arity,
            local_count: arity,
            code: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> u8 {
        self.arity
    }

    pub fn local_count(&self) -> u8 {
        self.local_count
    }

    /// 预留 count 个局部槽（前 arity 个已被形参占用）
    pub fn reserve_locals(&mut self, count: u8) {
        self.local_count = self.local_count.max(self.arity.saturating_add(count));
    }

    pub fn write_op(&mut self, op: Op) {
        self.code.push(op);
    }

    /// 追加常量并返回其下标
    pub fn add_constant(&mut self, value: Value) -> u8 {
        let index = self.constants.len();
        assert!(index <= u8::MAX as usize, "constant pool overflow");
        self.constants.push(value);
        index as u8
    }

    pub fn op(&self, pc: usize) -> Option<&Op> {
        self.code.get(pc)
    }

    pub fn constant(&self, index: u8) -> Value {
        self.constants
            .get(index as usize)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn finish(self) -> Rc<Chunk> {
        Rc::new(self)
    }
}
