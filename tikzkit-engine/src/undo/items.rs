use tikzkit_core::entity::{Entity, EntityKind, EntityRef, EntityType, MetaPos, PathEnd};
use tikzkit_core::geometry::Value;
use tikzkit_core::store::{EntityStore, RemovedEntity};
use tikzkit_core::style::StyleProperties;
use tikzkit_core::uid::Uid;

use crate::errors::EngineError;

/// 可合并撤销项的类别。只有类别相同的相邻撤销项才会尝试合并。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeId {
    NodePos,
    PathPos,
    EllipseRadii,
}

fn captured<T>(value: Option<T>, item: &str) -> T {
    value.unwrap_or_else(|| panic!("{item} undone before it was applied"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateEntity {
    pub uid: Uid,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteEntity {
    pub uid: Uid,
    removed: Option<RemovedEntity>,
}

impl DeleteEntity {
    pub fn new(uid: Uid) -> Self {
        Self { uid, removed: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetNodePos {
    pub uid: Uid,
    pub pos: MetaPos,
    undo_pos: Option<MetaPos>,
}

impl SetNodePos {
    pub fn new(uid: Uid, pos: MetaPos) -> Self {
        Self {
            uid,
            pos,
            undo_pos: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetNodeText {
    pub uid: Uid,
    pub text: String,
    undo_text: Option<String>,
}

impl SetNodeText {
    pub fn new(uid: Uid, text: impl Into<String>) -> Self {
        Self {
            uid,
            text: text.into(),
            undo_text: None,
        }
    }
}

/// 整体替换实体样式的属性槽。
#[derive(Debug, Clone, PartialEq)]
pub struct SetEntityStyle {
    pub uid: Uid,
    pub properties: StyleProperties,
    undo_properties: Option<StyleProperties>,
}

impl SetEntityStyle {
    pub fn new(uid: Uid, properties: StyleProperties) -> Self {
        Self {
            uid,
            properties,
            undo_properties: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetParentStyle {
    pub uid: Uid,
    pub parent: Option<Uid>,
    undo_parent: Option<Option<Uid>>,
}

impl SetParentStyle {
    pub fn new(uid: Uid, parent: Option<Uid>) -> Self {
        Self {
            uid,
            parent,
            undo_parent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPathPos {
    pub uid: Uid,
    pub end: PathEnd,
    pub pos: MetaPos,
    undo_pos: Option<MetaPos>,
}

impl SetPathPos {
    pub fn new(uid: Uid, end: PathEnd, pos: MetaPos) -> Self {
        Self {
            uid,
            end,
            pos,
            undo_pos: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetEllipseRadii {
    pub uid: Uid,
    pub radius_x: Value,
    pub radius_y: Value,
    undo_radii: Option<(Value, Value)>,
}

impl SetEllipseRadii {
    pub fn new(uid: Uid, radius_x: Value, radius_y: Value) -> Self {
        Self {
            uid,
            radius_x,
            radius_y,
            undo_radii: None,
        }
    }
}

/// 一次原子的可逆修改。正向执行时记录撤销所需的旧状态，因此只保存正向数据的日志回放后同样可以撤销。
#[derive(Debug, Clone, PartialEq)]
pub enum UndoItem {
    CreateEntity(CreateEntity),
    DeleteEntity(DeleteEntity),
    SetNodePos(SetNodePos),
    SetNodeText(SetNodeText),
    SetEntityStyle(SetEntityStyle),
    SetParentStyle(SetParentStyle),
    SetPathPos(SetPathPos),
    SetEllipseRadii(SetEllipseRadii),
}

impl UndoItem {
    pub fn text(&self) -> &'static str {
        match self {
            UndoItem::CreateEntity(_) => "创建实体",
            UndoItem::DeleteEntity(_) => "删除实体",
            UndoItem::SetNodePos(_) => "移动节点",
            UndoItem::SetNodeText(_) => "修改节点文本",
            UndoItem::SetEntityStyle(_) => "修改样式",
            UndoItem::SetParentStyle(_) => "修改父样式",
            UndoItem::SetPathPos(_) => "移动路径端点",
            UndoItem::SetEllipseRadii(_) => "修改椭圆半径",
        }
    }

    /// 被修改的实体。
    pub fn uid(&self) -> Uid {
        match self {
            UndoItem::CreateEntity(item) => item.uid,
            UndoItem::DeleteEntity(item) => item.uid,
            UndoItem::SetNodePos(item) => item.uid,
            UndoItem::SetNodeText(item) => item.uid,
            UndoItem::SetEntityStyle(item) => item.uid,
            UndoItem::SetParentStyle(item) => item.uid,
            UndoItem::SetPathPos(item) => item.uid,
            UndoItem::SetEllipseRadii(item) => item.uid,
        }
    }

    pub fn merge_id(&self) -> Option<MergeId> {
        match self {
            UndoItem::SetNodePos(_) => Some(MergeId::NodePos),
            UndoItem::SetPathPos(_) => Some(MergeId::PathPos),
            UndoItem::SetEllipseRadii(_) => Some(MergeId::EllipseRadii),
            _ => None,
        }
    }

    /// 把 `other` 的正向数据并入自身，撤销数据保持不变。目标不同则返回 `false`。
    pub fn merge_with(&mut self, other: &UndoItem) -> bool {
        match (self, other) {
            (UndoItem::SetNodePos(this), UndoItem::SetNodePos(other)) if this.uid == other.uid => {
                this.pos = other.pos;
                true
            }
            (UndoItem::SetPathPos(this), UndoItem::SetPathPos(other))
                if this.uid == other.uid && this.end == other.end =>
            {
                this.pos = other.pos;
                true
            }
            (UndoItem::SetEllipseRadii(this), UndoItem::SetEllipseRadii(other))
                if this.uid == other.uid =>
            {
                this.radius_x = other.radius_x;
                this.radius_y = other.radius_y;
                true
            }
            _ => false,
        }
    }

    pub fn redo(&mut self, store: &mut EntityStore) {
        match self {
            UndoItem::CreateEntity(item) => store.create_entity(item.uid, item.kind),
            UndoItem::DeleteEntity(item) => {
                item.removed = Some(store.remove_entity(item.uid));
            }
            UndoItem::SetNodePos(item) => {
                item.undo_pos = store.node(item.uid).map(|node| *node.meta_pos());
                store.set_node_meta_pos(item.uid, item.pos);
            }
            UndoItem::SetNodeText(item) => {
                item.undo_text = store.node(item.uid).map(|node| node.text().to_string());
                store.set_node_text(item.uid, item.text.clone());
            }
            UndoItem::SetEntityStyle(item) => {
                item.undo_properties = store
                    .style_of(item.uid)
                    .map(|style| style.properties().clone());
                store.set_style_properties(item.uid, item.properties.clone());
            }
            UndoItem::SetParentStyle(item) => {
                item.undo_parent = store.style_of(item.uid).map(|style| style.parent_uid());
                store.set_parent_style(item.uid, item.parent);
            }
            UndoItem::SetPathPos(item) => {
                item.undo_pos = store
                    .path(item.uid)
                    .and_then(|path| path.meta_pos(item.end).copied());
                store.set_path_pos(item.uid, item.end, item.pos);
            }
            UndoItem::SetEllipseRadii(item) => {
                item.undo_radii = store.path(item.uid).and_then(|path| path.radii());
                store.set_ellipse_radii(item.uid, item.radius_x, item.radius_y);
            }
        }
    }

    pub fn undo(&mut self, store: &mut EntityStore) {
        let text = self.text();
        match self {
            UndoItem::CreateEntity(item) => {
                store.remove_entity(item.uid);
            }
            UndoItem::DeleteEntity(item) => {
                let removed = captured(item.removed.take(), text);
                store.restore_entity(item.uid, &removed.snapshot, removed.index);
            }
            UndoItem::SetNodePos(item) => {
                store.set_node_meta_pos(item.uid, captured(item.undo_pos, text));
            }
            UndoItem::SetNodeText(item) => {
                store.set_node_text(item.uid, captured(item.undo_text.clone(), text));
            }
            UndoItem::SetEntityStyle(item) => {
                let properties = captured(item.undo_properties.clone(), text);
                store.set_style_properties(item.uid, properties);
            }
            UndoItem::SetParentStyle(item) => {
                store.set_parent_style(item.uid, captured(item.undo_parent, text));
            }
            UndoItem::SetPathPos(item) => {
                store.set_path_pos(item.uid, item.end, captured(item.undo_pos, text));
            }
            UndoItem::SetEllipseRadii(item) => {
                let (radius_x, radius_y) = captured(item.undo_radii, text);
                store.set_ellipse_radii(item.uid, radius_x, radius_y);
            }
        }
    }

    /// 检查撤销项能否作用于当前仓库，用于回放外部日志前的校验。
    pub fn validate(&self, store: &EntityStore) -> Result<(), EngineError> {
        let uid = self.uid();
        if !uid.belongs_to(store.document_id()) {
            return Err(EngineError::ForeignUid(uid));
        }
        match self {
            UndoItem::CreateEntity(_) => {
                if uid.id() < Uid::FIRST_ENTITY_ID || uid.id() == i64::MAX {
                    return Err(EngineError::ReservedId(uid));
                }
                if store.contains(uid) {
                    return Err(EngineError::DuplicateEntity(uid));
                }
                Ok(())
            }
            UndoItem::DeleteEntity(_) => {
                if uid.id() < Uid::FIRST_ENTITY_ID {
                    return Err(EngineError::ReservedId(uid));
                }
                expect_entity(store, uid, None)?;
                // 日志必须先显式解除引用并改挂子样式，撤销时才能完整恢复。
                match first_user(store, uid) {
                    Some(user) => Err(EngineError::EntityInUse { uid, user }),
                    None => Ok(()),
                }
            }
            UndoItem::SetNodePos(item) => {
                expect_entity(store, uid, Some(EntityType::Node))?;
                expect_target(store, &item.pos)
            }
            UndoItem::SetNodeText(_) => expect_entity(store, uid, Some(EntityType::Node)).map(|_| ()),
            UndoItem::SetEntityStyle(_) => {
                match expect_entity(store, uid, None)? {
                    EntityType::Document => Err(EngineError::UnexpectedEntityType {
                        uid,
                        expected: EntityType::Style,
                        found: EntityType::Document,
                    }),
                    _ => Ok(()),
                }
            }
            UndoItem::SetParentStyle(item) => {
                if let EntityType::Document = expect_entity(store, uid, None)? {
                    return Err(EngineError::UnexpectedEntityType {
                        uid,
                        expected: EntityType::Style,
                        found: EntityType::Document,
                    });
                }
                if let Some(parent) = item.parent {
                    expect_entity(store, parent, Some(EntityType::Style))?;
                    if !store.can_parent(uid, item.parent) {
                        return Err(EngineError::InvalidParent { uid, parent });
                    }
                }
                Ok(())
            }
            UndoItem::SetPathPos(item) => {
                expect_entity(store, uid, Some(EntityType::Path))?;
                let has_end = store
                    .path(uid)
                    .is_some_and(|path| path.meta_pos(item.end).is_some());
                if !has_end {
                    return Err(EngineError::InvalidArgument(format!(
                        "path {uid} has no {:?} position",
                        item.end
                    )));
                }
                expect_target(store, &item.pos)
            }
            UndoItem::SetEllipseRadii(_) => {
                expect_entity(store, uid, Some(EntityType::Path))?;
                if store.path(uid).and_then(|path| path.radii()).is_none() {
                    return Err(EngineError::InvalidArgument(format!(
                        "path {uid} is not an ellipse"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn expect_entity(
    store: &EntityStore,
    uid: Uid,
    expected: Option<EntityType>,
) -> Result<EntityType, EngineError> {
    let found = store
        .entity(uid)
        .map(|entity| entity.entity_type())
        .ok_or(EngineError::EntityNotFound(uid))?;
    match expected {
        Some(expected) if expected != found => Err(EngineError::UnexpectedEntityType {
            uid,
            expected,
            found,
        }),
        _ => Ok(found),
    }
}

/// 以 `uid` 为父样式，或有位置挂在 `uid` 上的第一个实体。
fn first_user(store: &EntityStore, uid: Uid) -> Option<Uid> {
    if let Some(child) = store.style_of(uid).and_then(|style| style.children().first()) {
        return Some(*child);
    }
    store
        .entities()
        .find(|entity| match entity {
            Entity::Node(node) => node.meta_pos().node() == Some(uid),
            Entity::Path(path) => path.references(uid),
            Entity::Style(_) => false,
        })
        .map(Entity::uid)
}

fn expect_target(store: &EntityStore, pos: &MetaPos) -> Result<(), EngineError> {
    match pos.node() {
        Some(node) => expect_entity(store, node, Some(EntityType::Node)).map(|_| ()),
        None => Ok(()),
    }
}

/// 把查找结果限定为节点，供命令层使用。
pub(crate) fn require_node(store: &EntityStore, uid: Uid) -> Result<(), EngineError> {
    expect_entity(store, uid, Some(EntityType::Node)).map(|_| ())
}

pub(crate) fn require_existing(store: &EntityStore, uid: Uid) -> Result<EntityType, EngineError> {
    match store.entity(uid) {
        Some(EntityRef::Document) | None => Err(EngineError::EntityNotFound(uid)),
        Some(entity) => Ok(entity.entity_type()),
    }
}

#[cfg(test)]
mod tests {
    use tikzkit_core::geometry::Pos;
    use tikzkit_core::tikz::{Anchor, PathKind};

    use super::*;

    #[test]
    fn node_pos_items_merge_on_same_uid() {
        let mut store = EntityStore::new();
        let a = store.allocate_uid();
        let b = store.allocate_uid();
        let mut first = UndoItem::SetNodePos(SetNodePos::new(a, MetaPos::new(Pos::new(1.0, 0.0))));
        let second = UndoItem::SetNodePos(SetNodePos::new(a, MetaPos::new(Pos::new(2.0, 0.0))));
        let other = UndoItem::SetNodePos(SetNodePos::new(b, MetaPos::new(Pos::new(3.0, 0.0))));

        assert_eq!(first.merge_id(), Some(MergeId::NodePos));
        assert!(first.merge_with(&second));
        assert!(!first.merge_with(&other));
        let UndoItem::SetNodePos(merged) = first else {
            panic!("expected node pos item");
        };
        assert_eq!(merged.pos.pos(), Pos::new(2.0, 0.0));
    }

    #[test]
    fn redo_captures_undo_state() {
        let mut store = EntityStore::new();
        let uid = store.allocate_uid();
        let mut create = UndoItem::CreateEntity(CreateEntity {
            uid,
            kind: EntityKind::Node,
        });
        create.redo(&mut store);

        let mut text = UndoItem::SetNodeText(SetNodeText::new(uid, "hello"));
        text.redo(&mut store);
        assert_eq!(store.node(uid).unwrap().text(), "hello");
        text.undo(&mut store);
        assert_eq!(store.node(uid).unwrap().text(), "");

        create.undo(&mut store);
        assert!(store.node(uid).is_none());
    }

    #[test]
    fn validate_rejects_missing_targets() {
        let mut store = EntityStore::new();
        let uid = store.allocate_uid();
        let item = UndoItem::SetNodeText(SetNodeText::new(uid, "x"));
        assert!(matches!(
            item.validate(&store),
            Err(EngineError::EntityNotFound(_))
        ));

        store.create_entity(uid, EntityKind::Style);
        assert!(matches!(
            item.validate(&store),
            Err(EngineError::UnexpectedEntityType { .. })
        ));

        let reserved = UndoItem::CreateEntity(CreateEntity {
            uid: store.style_uid(),
            kind: EntityKind::Style,
        });
        assert!(matches!(
            reserved.validate(&store),
            Err(EngineError::ReservedId(_))
        ));

        let last = UndoItem::CreateEntity(CreateEntity {
            uid: Uid::new(i64::MAX, store.document_id()),
            kind: EntityKind::Node,
        });
        assert!(matches!(
            last.validate(&store),
            Err(EngineError::ReservedId(_))
        ));
    }

    #[test]
    fn validate_rejects_parent_style_on_document() {
        let store = EntityStore::new();
        let item = UndoItem::SetParentStyle(SetParentStyle::new(store.document_uid(), None));
        assert!(matches!(
            item.validate(&store),
            Err(EngineError::UnexpectedEntityType {
                found: EntityType::Document,
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_deleting_entities_still_in_use() {
        let mut store = EntityStore::new();
        let style = store.allocate_uid();
        let node = store.allocate_uid();
        let edge = store.allocate_uid();
        store.create_entity(style, EntityKind::Style);
        store.create_entity(node, EntityKind::Node);
        store.create_entity(edge, EntityKind::Path(PathKind::Line));
        store.set_parent_style(node, Some(style));
        store.set_path_pos(edge, PathEnd::Start, MetaPos::attached(node, Anchor::North));

        let delete_style = UndoItem::DeleteEntity(DeleteEntity::new(style));
        assert!(matches!(
            delete_style.validate(&store),
            Err(EngineError::EntityInUse { user, .. }) if user == node
        ));
        let delete_node = UndoItem::DeleteEntity(DeleteEntity::new(node));
        assert!(matches!(
            delete_node.validate(&store),
            Err(EngineError::EntityInUse { user, .. }) if user == edge
        ));

        store.set_parent_style(node, Some(store.style_uid()));
        store.set_path_pos(edge, PathEnd::Start, MetaPos::new(Pos::new(1.0, 1.0)));
        assert!(delete_style.validate(&store).is_ok());
        assert!(delete_node.validate(&store).is_ok());
    }
}
