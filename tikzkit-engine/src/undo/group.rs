use std::fmt::Write as _;

use tikzkit_core::store::EntityStore;

use super::items::UndoItem;

/// 一个事务内的全部撤销项，撤销栈上的一步。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoGroup {
    text: String,
    items: Vec<UndoItem>,
}

impl UndoGroup {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn items(&self) -> &[UndoItem] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 追加撤销项。与最后一项类别相同且合并成功时丢弃新项。
    pub fn add_item(&mut self, item: UndoItem) {
        if let Some(last) = self.items.last_mut() {
            let mergeable = last.merge_id().is_some() && last.merge_id() == item.merge_id();
            if mergeable && last.merge_with(&item) {
                return;
            }
        }
        self.items.push(item);
    }

    pub fn undo(&mut self, store: &mut EntityStore) {
        for item in self.items.iter_mut().rev() {
            item.undo(store);
        }
    }

    pub fn redo(&mut self, store: &mut EntityStore) {
        for item in self.items.iter_mut() {
            item.redo(store);
        }
    }

    /// 调试输出：组名后跟各撤销项。
    pub fn describe(&self) -> String {
        let mut out = format!("group: {}", self.text);
        for item in &self.items {
            let _ = write!(out, " --> {} [{}]", item.text(), item.uid());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use tikzkit_core::entity::{EntityKind, MetaPos};
    use tikzkit_core::geometry::Pos;

    use super::*;
    use crate::undo::items::{CreateEntity, SetNodePos, SetNodeText};

    #[test]
    fn consecutive_moves_merge_into_one_item() {
        let mut store = EntityStore::new();
        let uid = store.allocate_uid();
        let mut group = UndoGroup::new("拖动");
        group.add_item(UndoItem::CreateEntity(CreateEntity {
            uid,
            kind: EntityKind::Node,
        }));
        for x in 1..=3 {
            group.add_item(UndoItem::SetNodePos(SetNodePos::new(
                uid,
                MetaPos::new(Pos::new(f64::from(x), 0.0)),
            )));
        }
        group.add_item(UndoItem::SetNodeText(SetNodeText::new(uid, "a")));
        group.add_item(UndoItem::SetNodeText(SetNodeText::new(uid, "b")));
        assert_eq!(group.len(), 4);
        assert!(group.describe().starts_with("group: 拖动 --> 创建实体"));
    }

    #[test]
    fn undo_runs_in_reverse_order() {
        let mut store = EntityStore::new();
        let uid = store.allocate_uid();
        let mut group = UndoGroup::new("创建节点");
        let mut create = UndoItem::CreateEntity(CreateEntity {
            uid,
            kind: EntityKind::Node,
        });
        create.redo(&mut store);
        group.add_item(create);
        let mut text = UndoItem::SetNodeText(SetNodeText::new(uid, "x"));
        text.redo(&mut store);
        group.add_item(text);

        group.undo(&mut store);
        assert!(store.is_empty());
        group.redo(&mut store);
        assert_eq!(store.node(uid).unwrap().text(), "x");
    }
}
