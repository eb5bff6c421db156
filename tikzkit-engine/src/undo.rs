//! 命令模式的撤销系统：撤销项、事务分组与撤销/重做栈。

pub mod group;
pub mod items;

use tikzkit_core::store::EntityStore;
use tracing::debug;

pub use group::UndoGroup;
pub use items::{MergeId, UndoItem};

/// 撤销/重做栈与事务引用计数。只有最外层的 start/commit 才开启、关闭撤销组。
#[derive(Debug)]
pub struct UndoManager {
    undo_groups: Vec<UndoGroup>,
    redo_groups: Vec<UndoGroup>,
    current: Option<UndoGroup>,
    ref_count: usize,
    clean: bool,
}

impl UndoManager {
    pub fn new() -> Self {
        Self {
            undo_groups: Vec::new(),
            redo_groups: Vec::new(),
            current: None,
            ref_count: 0,
            clean: true,
        }
    }

    #[inline]
    pub fn transaction_active(&self) -> bool {
        self.ref_count > 0
    }

    #[inline]
    pub fn undo_available(&self) -> bool {
        !self.undo_groups.is_empty()
    }

    #[inline]
    pub fn redo_available(&self) -> bool {
        !self.redo_groups.is_empty()
    }

    #[inline]
    pub fn undo_groups(&self) -> &[UndoGroup] {
        &self.undo_groups
    }

    #[inline]
    pub fn redo_groups(&self) -> &[UndoGroup] {
        &self.redo_groups
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.clean
    }

    #[inline]
    pub fn set_clean(&mut self, clean: bool) {
        self.clean = clean;
    }

    /// 清空两个栈与未完成的事务，并标记为未修改。
    pub fn clear(&mut self) {
        self.undo_groups.clear();
        self.redo_groups.clear();
        self.current = None;
        self.ref_count = 0;
        self.clean = true;
    }

    pub fn start_transaction(&mut self, text: &str) {
        if self.ref_count == 0 {
            assert!(self.current.is_none(), "stale undo group without transaction");
            self.current = Some(UndoGroup::new(text));
        }
        self.ref_count += 1;
    }

    /// 立即执行撤销项的正向操作（期间 undo-active 标志置位），再放入当前撤销组。
    pub fn add_undo_item(&mut self, mut item: UndoItem, store: &mut EntityStore) {
        self.start_transaction(item.text());
        with_undo_active(store, |store| item.redo(store));
        if let Some(group) = self.current.as_mut() {
            group.add_item(item);
        }
        self.commit_transaction();
    }

    /// 结束一层事务。最外层结束时非空的撤销组入栈并清空重做栈，返回是否入栈。
    pub fn commit_transaction(&mut self) -> bool {
        assert!(
            self.ref_count > 0,
            "commit_transaction() without matching start_transaction()"
        );
        self.ref_count -= 1;
        if self.ref_count > 0 {
            return false;
        }
        let Some(group) = self.current.take() else {
            return false;
        };
        if group.is_empty() {
            return false;
        }
        debug!(text = group.text(), items = group.len(), "提交撤销组");
        self.undo_groups.push(group);
        self.redo_groups.clear();
        self.clean = false;
        true
    }

    /// 取消一层事务。最外层取消时逆序撤销当前组内的全部修改并丢弃该组。
    pub fn cancel_transaction(&mut self, store: &mut EntityStore) {
        assert!(
            self.ref_count > 0,
            "cancel_transaction() without matching start_transaction()"
        );
        self.ref_count -= 1;
        if self.ref_count > 0 {
            return;
        }
        if let Some(mut group) = self.current.take() {
            debug!(text = group.text(), items = group.len(), "取消事务");
            with_undo_active(store, |store| group.undo(store));
        }
    }

    /// 撤销栈为空时返回 `false`。
    pub fn undo(&mut self, store: &mut EntityStore) -> bool {
        let Some(mut group) = self.undo_groups.pop() else {
            return false;
        };
        debug!(text = group.text(), "撤销");
        with_undo_active(store, |store| group.undo(store));
        self.redo_groups.push(group);
        self.clean = false;
        true
    }

    pub fn redo(&mut self, store: &mut EntityStore) -> bool {
        let Some(mut group) = self.redo_groups.pop() else {
            return false;
        };
        debug!(text = group.text(), "重做");
        with_undo_active(store, |store| group.redo(store));
        self.undo_groups.push(group);
        self.clean = false;
        true
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

fn with_undo_active(store: &mut EntityStore, apply: impl FnOnce(&mut EntityStore)) {
    let previous = store.undo_active();
    store.set_undo_active(true);
    apply(store);
    store.set_undo_active(previous);
}
