//! 引用计数的配置块：嵌套的 begin/end 只在最外层结束时发出一次变更通知。

use std::fmt;
use std::ops::{Deref, DerefMut};

/// `ConfigObject::connect` 返回的监听句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut()>;

#[derive(Default)]
pub struct ConfigObject {
    ref_counter: u32,
    next_listener: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl ConfigObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入配置块，可任意嵌套。
    #[inline]
    pub fn begin_config(&mut self) {
        self.ref_counter += 1;
    }

    /// 离开配置块。计数归零时通知所有监听者并返回 `true`。
    pub fn end_config(&mut self) -> bool {
        assert!(
            self.ref_counter > 0,
            "end_config() called without matching begin_config()"
        );
        self.ref_counter -= 1;
        if self.ref_counter == 0 {
            self.emit_changed();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn config_active(&self) -> bool {
        self.ref_counter > 0
    }

    /// 仅在没有活动配置块时发出通知，返回是否已通知。
    pub fn emit_changed_if_needed(&mut self) -> bool {
        if self.config_active() {
            return false;
        }
        self.emit_changed();
        true
    }

    pub fn emit_changed(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }

    pub fn connect(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// 移除监听者，返回是否存在。
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != self.listeners.len()
    }

    #[inline]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigObject")
            .field("ref_counter", &self.ref_counter)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Clone for ConfigObject {
    /// 克隆不复制计数与监听者。
    fn clone(&self) -> Self {
        Self::new()
    }
}

pub trait Configurable {
    fn config_mut(&mut self) -> &mut ConfigObject;
}

impl Configurable for ConfigObject {
    fn config_mut(&mut self) -> &mut ConfigObject {
        self
    }
}

/// 作用域守卫：构造时 `begin_config()`，析构时 `end_config()`（包括提前返回与 panic 展开）。
pub struct ConfigTransaction<'a, T: Configurable> {
    target: &'a mut T,
}

impl<'a, T: Configurable> ConfigTransaction<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        target.config_mut().begin_config();
        Self { target }
    }
}

impl<T: Configurable> Deref for ConfigTransaction<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: Configurable> DerefMut for ConfigTransaction<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: Configurable> Drop for ConfigTransaction<'_, T> {
    fn drop(&mut self) {
        self.target.config_mut().end_config();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn counting(config: &mut ConfigObject) -> Rc<Cell<u32>> {
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        config.connect(move || counter.set(counter.get() + 1));
        hits
    }

    #[test]
    fn nested_blocks_notify_once() {
        let mut config = ConfigObject::new();
        let hits = counting(&mut config);

        config.begin_config();
        config.begin_config();
        assert!(!config.end_config());
        assert_eq!(hits.get(), 0);
        assert!(!config.emit_changed_if_needed());
        assert!(config.end_config());
        assert_eq!(hits.get(), 1);
        assert!(config.emit_changed_if_needed());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn guard_ends_block_on_drop() {
        let mut config = ConfigObject::new();
        let hits = counting(&mut config);
        {
            let guard = ConfigTransaction::new(&mut config);
            assert!(guard.config_active());
        }
        assert!(!config.config_active());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn disconnect_stops_notifications() {
        let mut config = ConfigObject::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = config.connect(move || counter.set(counter.get() + 1));
        assert!(config.disconnect(id));
        assert!(!config.disconnect(id));
        config.emit_changed();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    #[should_panic(expected = "without matching begin_config")]
    fn unbalanced_end_config_panics() {
        let mut config = ConfigObject::new();
        config.end_config();
    }
}
