//! 注册表：宿主侧对脚本值的强持有
//!
//! 代际标记的 slab：槽位复用时代数递增，旧句柄解引用得到 Nil
//! 而不是别人的值。槽位 0 永不分配，可作哨兵。

use crate::host::value::Value;

/// 注册表句柄：槽位下标 + 分配时的代数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegSlot {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

enum Entry {
    Occupied { generation: u32, value: Value },
    /// 空闲槽，记录下一个空闲槽的下标
    Vacant { generation: u32, next_free: u32 },
}

const NO_FREE: u32 = u32::MAX;

/// 值注册表
pub struct Registry {
    entries: Vec<Entry>,
    free_head: u32,
    live: usize,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Registry {
        Registry {
            // 槽位 0 保留
            entries: vec![Entry::Vacant { generation: 0, next_free: NO_FREE }],
            free_head: NO_FREE,
            live: 0,
            capacity,
        }
    }

    /// 当前存活条目数
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// 持有一个值，返回其句柄；超过容量上限返回 None
    pub fn register(&mut self, value: Value) -> Option<RegSlot> {
        if self.live >= self.capacity {
            return None;
        }
        self.live += 1;
        if self.free_head != NO_FREE {
            let index = self.free_head;
            let entry = &mut self.entries[index as usize];
            let generation = match entry {
                Entry::Vacant { generation, next_free } => {
                    self.free_head = *next_free;
                    *generation
                }
                Entry::Occupied { .. } => unreachable!("free list points at occupied slot"),
            };
            *entry = Entry::Occupied { generation, value };
            Some(RegSlot { index, generation })
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry::Occupied { generation: 0, value });
            Some(RegSlot { index, generation: 0 })
        }
    }

    /// 读取句柄指向的值；句柄已失效时得到 Nil
    pub fn get(&self, slot: RegSlot) -> Value {
        match self.entries.get(slot.index as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == slot.generation => {
                value.clone()
            }
            _ => Value::Nil,
        }
    }

    /// 释放句柄，返回其中的值（便于调用方在注册表借用之外析构）
    pub fn unregister(&mut self, slot: RegSlot) -> Value {
        let entry = match self.entries.get_mut(slot.index as usize) {
            Some(e) => e,
            None => return Value::Nil,
        };
        match entry {
            Entry::Occupied { generation, .. } if *generation == slot.generation => {
                let next_generation = generation.wrapping_add(1);
                let old = std::mem::replace(
                    entry,
                    Entry::Vacant { generation: next_generation, next_free: self.free_head },
                );
                self.free_head = slot.index;
                self.live -= 1;
                match old {
                    Entry::Occupied { value, .. } => value,
                    Entry::Vacant { .. } => unreachable!(),
                }
            }
            _ => Value::Nil,
        }
    }
}
