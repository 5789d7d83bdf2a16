//! 脉络：一条逻辑调用栈
//!
//! 每个引擎启动时带一条主脉络，其余脉络由 spawn 派生。
//! 状态机是显式的：Fresh -> Running -> Suspended/Finished/Errored，
//! 所有非法迁移都在 resume 处断言。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::host::chunk::Chunk;
use crate::host::value::Value;

/// 脉络生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrandState {
    /// 已建立但从未恢复过
    Fresh,
    /// 正在执行
    Running,
    /// 在让出点挂起，等待恢复
    Suspended,
    /// 入口函数已返回
    Finished,
    /// 以错误告终，不可再恢复
    Errored,
}

/// 字节码调用帧
pub(crate) struct Frame {
    pub(crate) chunk: Rc<Chunk>,
    pub(crate) pc: usize,
    pub(crate) locals: Vec<Value>,
    /// 调用发生时的操作数栈高度，返回时截断到这里
    pub(crate) ret_floor: usize,
}

/// 一条逻辑调用栈：操作数栈 + 帧栈 + 生命周期状态
pub struct Strand {
    id: u64,
    main: bool,
    state: Cell<StrandState>,
    pub(crate) stack: RefCell<Vec<Value>>,
    pub(crate) frames: RefCell<Vec<Frame>>,
    /// 原生函数请求挂起的标志，运行循环读取后立即清除
    pub(crate) suspend_requested: Cell<bool>,
}

impl Strand {
    pub(crate) fn new(id: u64, main: bool) -> Rc<Strand> {
        Rc::new(Strand {
            id,
            main,
            state: Cell::new(if main { StrandState::Running } else { StrandState::Fresh }),
            stack: RefCell::new(Vec::new()),
            frames: RefCell::new(Vec::new()),
            suspend_requested: Cell::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 是否主脉络（主脉络不可挂起）
    pub fn is_main(&self) -> bool {
        self.main
    }

    pub fn state(&self) -> StrandState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: StrandState) {
        self.state.set(state);
    }

    /// 当前操作数栈高度
    pub fn height(&self) -> usize {
        self.stack.borrow().len()
    }

    pub(crate) fn push(&self, value: Value) {
        self.stack.borrow_mut().push(value);
    }

    pub(crate) fn pop(&self) -> Value {
        self.stack
            .borrow_mut()
            .pop()
            .unwrap_or(Value::Nil)
    }

    /// 读取距栈底 index 处的值
    pub(crate) fn get(&self, index: usize) -> Value {
        self.stack
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// 截断到 floor，被弹出的值在借用释放后才析构
    pub(crate) fn truncate(&self, floor: usize) {
        let dropped: Vec<Value> = {
            let mut stack = self.stack.borrow_mut();
            if floor >= stack.len() {
                return;
            }
            stack.split_off(floor)
        };
        drop(dropped);
    }
}

impl std::fmt::Debug for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strand")
            .field("id", &self.id)
            .field("main", &self.main)
            .field("state", &self.state.get())
            .field("height", &self.height())
            .finish()
    }
}
