//! 栈守卫
//!
//! 原生代码在脉络栈上临时放值时的纪律检查：守卫记录建立时的
//! 栈高度和自己压入的值数，析构时断言栈顶没有被别人占用，然后
//! 弹掉自己的值。把值交给别处管理时用 release 解除守卫。

use std::rc::Rc;

use crate::error::HostError;
use crate::host::strand::Strand;
use crate::host::value::Value;

/// 脉络栈上的一个绝对位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot(pub(crate) usize);

impl Slot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 一段由原生代码临时占用的栈顶区间
#[derive(Debug)]
pub struct StackGuard<'a> {
    strand: &'a Rc<Strand>,
    floor: usize,
    count: usize,
    armed: bool,
}

impl<'a> StackGuard<'a> {
    /// 在当前栈顶建立一个空守卫
    pub fn new(strand: &'a Rc<Strand>) -> StackGuard<'a> {
        StackGuard {
            strand,
            floor: strand.height(),
            count: 0,
            armed: true,
        }
    }

    /// 压入一个值并纳入守卫
    pub fn push(&mut self, value: Value) -> Slot {
        self.strand.push(value);
        let slot = Slot(self.floor + self.count);
        self.count += 1;
        slot
    }

    /// 守卫内值的个数
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 读取守卫内第 i 个值
    pub fn value(&self, i: usize) -> Value {
        assert!(i < self.count, "slot {i} out of guard range {}", self.count);
        self.strand.get(self.floor + i)
    }

    /// 守卫内第 i 个值的栈位置
    pub fn slot(&self, i: usize) -> Slot {
        assert!(i < self.count, "slot {i} out of guard range {}", self.count);
        Slot(self.floor + i)
    }

    /// 对守卫内第 i 个值做下标取值，结果进入一个新的单值守卫
    pub fn index(&self, i: usize, key: &Value) -> Result<StackGuard<'a>, HostError> {
        let container = self.value(i);
        let result = match &container {
            Value::Table(table) => match key.as_table_key() {
                Some(table_key) => table.get(&table_key),
                None => {
                    return Err(HostError::runtime(format!(
                        "a {} value cannot index a table",
                        key.tag()
                    )))
                }
            },
            other => {
                return Err(HostError::runtime(format!(
                    "attempt to index a {} value",
                    other.tag()
                )))
            }
        };
        let mut child = StackGuard::new(self.strand);
        child.push(result);
        Ok(child)
    }

    /// 解除守卫：值留在栈上，交由调用方处置
    pub fn release(mut self) -> usize {
        self.armed = false;
        self.count
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let height = self.strand.height();
        assert!(
            height == self.floor + self.count,
            "stack guard dropped out of order: height {} != floor {} + count {}",
            height,
            self.floor,
            self.count
        );
        self.strand.truncate(self.floor);
    }
}
