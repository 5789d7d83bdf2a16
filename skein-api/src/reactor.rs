//! 反应器
//!
//! 单线程虚拟时钟：时刻手动推进，到期的观察者在借用释放后
//! 逐个触发，触发过程中可以再订阅。没有真实 IO，定时器元素
//! 就是到期时刻本身。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use skein_config::Phase;
use skein_core::bind::{Observable, Observer, SharedObservable};
use skein_core::host::Value;
use skein_core::HostError;
use skein_log::{debug, trace, Logger};

struct TimerWheel {
    pending: Vec<(u64, Box<dyn Observer>)>,
}

/// 固定间隔的定时器源：每次请求在 now + interval 时刻完成
pub struct TimerSource {
    interval: u64,
    now: Rc<Cell<u64>>,
    wheel: Rc<RefCell<TimerWheel>>,
}

impl Observable for TimerSource {
    fn async_get_one(&mut self, observer: Box<dyn Observer>) -> Result<(), HostError> {
        let deadline = self.now.get() + self.interval.max(1);
        self.wheel.borrow_mut().pending.push((deadline, observer));
        Ok(())
    }
}

/// 手动触发的序列源（测试和宿主驱动的数据流用）
pub struct ManualSource {
    pending: Option<Box<dyn Observer>>,
}

impl ManualSource {
    pub fn shared() -> Rc<RefCell<ManualSource>> {
        Rc::new(RefCell::new(ManualSource { pending: None }))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 送出下一个元素
    pub fn fire(source: &Rc<RefCell<ManualSource>>, value: Value) -> Result<(), HostError> {
        let observer = source
            .borrow_mut()
            .pending
            .take()
            .ok_or_else(|| HostError::handler("no outstanding request to complete"))?;
        observer.got_element(value)
    }

    /// 宣告序列结束
    pub fn finish(source: &Rc<RefCell<ManualSource>>) -> Result<(), HostError> {
        let observer = source
            .borrow_mut()
            .pending
            .take()
            .ok_or_else(|| HostError::handler("no outstanding request to complete"))?;
        observer.ended()
    }
}

impl Observable for ManualSource {
    fn async_get_one(&mut self, observer: Box<dyn Observer>) -> Result<(), HostError> {
        assert!(
            self.pending.is_none(),
            "a request is already outstanding on this observable"
        );
        self.pending = Some(observer);
        Ok(())
    }
}

/// 虚拟时钟反应器
pub struct Reactor {
    logger: Arc<Logger>,
    now: Rc<Cell<u64>>,
    wheel: Rc<RefCell<TimerWheel>>,
}

impl Reactor {
    pub fn new(logger: Arc<Logger>) -> Reactor {
        Reactor {
            logger,
            now: Rc::new(Cell::new(0)),
            wheel: Rc::new(RefCell::new(TimerWheel { pending: Vec::new() })),
        }
    }

    /// 当前虚拟时刻
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// 未到期的定时请求数
    pub fn pending_count(&self) -> usize {
        self.wheel.borrow().pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// 建一个固定间隔的定时器源
    pub fn timer(&self, interval: u64) -> SharedObservable {
        Rc::new(RefCell::new(TimerSource {
            interval,
            now: self.now.clone(),
            wheel: self.wheel.clone(),
        }))
    }

    /// 推进一个时刻，触发所有到期的观察者
    ///
    /// 触发时不持有任何内部借用，观察者可以在回调里再订阅。
    pub fn tick(&self) -> Result<usize, HostError> {
        let now = self.now.get() + 1;
        self.now.set(now);
        let due: Vec<Box<dyn Observer>> = {
            let mut wheel = self.wheel.borrow_mut();
            let mut due = Vec::new();
            let mut index = 0;
            while index < wheel.pending.len() {
                if wheel.pending[index].0 <= now {
                    due.push(wheel.pending.swap_remove(index).1);
                } else {
                    index += 1;
                }
            }
            due
        };
        let fired = due.len();
        if fired > 0 {
            trace!(target: Phase::Reactor.target(), self.logger, "tick {}: firing {} timer(s)", now, fired);
        }
        for observer in due {
            observer.got_element(Value::Integer(now as i64))?;
        }
        Ok(fired)
    }

    /// 推进时钟直到没有未到期的请求，返回走过的时刻数
    ///
    /// max_ticks 防止互相续订的定时器把循环变成死循环。
    pub fn run_until_idle(&self, max_ticks: u64) -> Result<u64, HostError> {
        let mut elapsed = 0;
        while !self.is_idle() {
            if elapsed >= max_ticks {
                debug!(target: Phase::Reactor.target(), self.logger, "reactor stopped after {} ticks, still busy", elapsed);
                return Err(HostError::runtime(format!(
                    "reactor still busy after {max_ticks} ticks"
                )));
            }
            self.tick()?;
            elapsed += 1;
        }
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        seen: Rc<RefCell<Vec<i64>>>,
        ended: Rc<Cell<bool>>,
    }

    impl Observer for Probe {
        fn got_element(self: Box<Self>, value: Value) -> Result<(), HostError> {
            self.seen.borrow_mut().push(value.as_integer().unwrap_or(-1));
            Ok(())
        }

        fn ended(self: Box<Self>) -> Result<(), HostError> {
            self.ended.set(true);
            Ok(())
        }
    }

    fn probe() -> (Box<Probe>, Rc<RefCell<Vec<i64>>>, Rc<Cell<bool>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let ended = Rc::new(Cell::new(false));
        (
            Box::new(Probe {
                seen: seen.clone(),
                ended: ended.clone(),
            }),
            seen,
            ended,
        )
    }

    #[test]
    fn test_timer_fires_at_deadline() {
        let reactor = Reactor::new(Logger::noop());
        let timer = reactor.timer(2);
        let (observer, seen, _) = probe();
        timer.borrow_mut().async_get_one(observer).unwrap();

        reactor.tick().unwrap();
        assert!(seen.borrow().is_empty());
        reactor.tick().unwrap();
        assert_eq!(seen.borrow().as_slice(), &[2]);
        assert!(reactor.is_idle());
    }

    #[test]
    fn test_run_until_idle_counts_ticks() {
        let reactor = Reactor::new(Logger::noop());
        let timer = reactor.timer(3);
        let (observer, seen, _) = probe();
        timer.borrow_mut().async_get_one(observer).unwrap();
        let elapsed = reactor.run_until_idle(10).unwrap();
        assert_eq!(elapsed, 3);
        assert_eq!(seen.borrow().as_slice(), &[3]);
    }

    #[test]
    fn test_run_until_idle_gives_up() {
        struct Resubscriber {
            timer: SharedObservable,
        }
        impl Observer for Resubscriber {
            fn got_element(self: Box<Self>, _: Value) -> Result<(), HostError> {
                let timer = self.timer.clone();
                let next = Box::new(Resubscriber { timer: self.timer.clone() });
                let result = timer.borrow_mut().async_get_one(next);
                result
            }
            fn ended(self: Box<Self>) -> Result<(), HostError> {
                Ok(())
            }
        }

        let reactor = Reactor::new(Logger::noop());
        let timer = reactor.timer(1);
        let first = Box::new(Resubscriber { timer: timer.clone() });
        timer.borrow_mut().async_get_one(first).unwrap();
        let err = reactor.run_until_idle(5).unwrap_err();
        assert!(err.message.contains("still busy"), "{}", err.message);
    }

    #[test]
    fn test_manual_source_fire_and_finish() {
        let source = ManualSource::shared();
        let (observer, seen, _) = probe();
        source.borrow_mut().async_get_one(observer).unwrap();
        ManualSource::fire(&source, Value::Integer(9)).unwrap();
        assert_eq!(seen.borrow().as_slice(), &[9]);

        let (observer, _, ended) = probe();
        source.borrow_mut().async_get_one(observer).unwrap();
        ManualSource::finish(&source).unwrap();
        assert!(ended.get());
    }

    #[test]
    fn test_manual_source_without_request_errors() {
        let source = ManualSource::shared();
        let err = ManualSource::fire(&source, Value::Nil).unwrap_err();
        assert!(err.message.contains("no outstanding request"));
    }
}
