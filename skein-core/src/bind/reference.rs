//! 注册表引用
//!
//! 原生侧对脚本值的持久强持有。句柄只移动不克隆，析构时自动
//! 释放注册表槽位。引擎先于句柄消亡时解引用得到 Nil，释放
//! 变成空操作。

use std::rc::Weak;

use crate::error::HostError;
use crate::host::engine::{Engine, EngineInner};
use crate::host::registry::RegSlot;
use crate::host::value::Value;

/// 注册表引用（move-only，析构时释放槽位）
pub struct RegRef {
    engine: Weak<EngineInner>,
    slot: RegSlot,
}

impl RegRef {
    /// 把一个值放入注册表并返回引用
    pub fn register(engine: &Engine, value: Value) -> Result<RegRef, HostError> {
        let slot = engine.register_value(value)?;
        Ok(RegRef {
            engine: engine.downgrade(),
            slot,
        })
    }

    /// 读取被持有的值；引擎已消亡时得到 Nil
    pub fn get(&self) -> Value {
        match self.engine.upgrade() {
            Some(inner) => Engine::from_inner(inner).registered_value(self.slot),
            None => Value::Nil,
        }
    }

    pub fn slot(&self) -> RegSlot {
        self.slot
    }

    /// 引用所属的引擎是否仍然存活
    pub fn is_live(&self) -> bool {
        self.engine.strong_count() > 0
    }
}

impl Drop for RegRef {
    fn drop(&mut self) {
        if let Some(inner) = self.engine.upgrade() {
            Engine::from_inner(inner).unregister_value(self.slot);
        }
    }
}

impl std::fmt::Debug for RegRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegRef")
            .field("slot", &self.slot)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::value::Table;
    use crate::test_support::test_engine;

    #[test]
    fn test_register_and_get() {
        let engine = test_engine();
        let table = Table::new();
        let reference = RegRef::register(&engine, Value::Table(table.clone())).unwrap();
        assert_eq!(reference.get(), Value::Table(table));
        assert_eq!(engine.registry_live_count(), 1);
    }

    #[test]
    fn test_drop_releases_slot() {
        let engine = test_engine();
        let reference = RegRef::register(&engine, Value::Integer(5)).unwrap();
        assert_eq!(engine.registry_live_count(), 1);
        drop(reference);
        assert_eq!(engine.registry_live_count(), 0);
    }

    #[test]
    fn test_engine_gone_is_noop() {
        let engine = test_engine();
        let reference = RegRef::register(&engine, Value::Integer(5)).unwrap();
        drop(engine);
        assert!(!reference.is_live());
        assert_eq!(reference.get(), Value::Nil);
        // 析构不会 panic
        drop(reference);
    }

    #[test]
    fn test_value_survives_only_through_reference() {
        let engine = test_engine();
        let table = Table::new();
        let reference = RegRef::register(&engine, Value::Table(table.clone())).unwrap();
        // 脚本世界之外唯一的持有者是注册表
        let weak = std::rc::Rc::downgrade(&table);
        drop(table);
        assert!(weak.upgrade().is_some());
        drop(reference);
        assert!(weak.upgrade().is_none());
    }
}
