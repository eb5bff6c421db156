//! 文档的实体仓库：按插入顺序保存所有实体，负责 uid 分配、样式父子关系与变更通知。
//!
//! 这里的修改接口都是“直接修改”，不经过撤销系统；撤销记录由引擎层的 `Document` 负责。
//! 需要既有实体的接口在 uid 缺失或属于其他文档时 panic。

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{ConfigObject, ConfigTransaction, Configurable, ListenerId};
use crate::entity::{
    AnchorResolver, CenterAnchors, Entity, EntityKind, EntityRef, EntitySnapshot, MetaPos, Node,
    Path, PathEnd, StyleSnapshot,
};
use crate::geometry::{Pos, Value};
use crate::style::{Style, StyleLookup, StyleProperties, StyleRef};
use crate::uid::{DocumentId, Uid};

/// 锚点链的最大解析深度，超过后退回记录的绝对坐标。
const MAX_ANCHOR_DEPTH: usize = 32;

/// `remove_entity` 的结果，足以在原位置恢复实体。
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEntity {
    pub index: usize,
    pub snapshot: EntitySnapshot,
}

#[derive(Debug)]
pub struct EntityStore {
    document: DocumentId,
    config: ConfigObject,
    style: Style,
    entities: IndexMap<Uid, Entity>,
    next_id: i64,
    undo_active: bool,
}

impl EntityStore {
    pub fn new() -> Self {
        let document = DocumentId::next();
        Self {
            document,
            config: ConfigObject::new(),
            style: Style::new(Uid::new(Uid::STYLE_ID, document), None),
            entities: IndexMap::new(),
            next_id: Uid::FIRST_ENTITY_ID,
            undo_active: false,
        }
    }

    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.document
    }

    #[inline]
    pub fn document_uid(&self) -> Uid {
        Uid::new(Uid::DOCUMENT_ID, self.document)
    }

    #[inline]
    pub fn style_uid(&self) -> Uid {
        Uid::new(Uid::STYLE_ID, self.document)
    }

    /// 文档默认样式（uid 1）。
    #[inline]
    pub fn document_style(&self) -> &Style {
        &self.style
    }

    #[inline]
    pub fn undo_active(&self) -> bool {
        self.undo_active
    }

    /// 设置后所有修改都直接生效，不再生成撤销项。撤销管理器在回放时使用。
    #[inline]
    pub fn set_undo_active(&mut self, active: bool) {
        self.undo_active = active;
    }

    #[inline]
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    /// 分配一个新的实体 uid。
    pub fn allocate_uid(&mut self) -> Uid {
        let uid = Uid::new(self.next_id, self.document);
        self.next_id += 1;
        uid
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn contains(&self, uid: Uid) -> bool {
        self.entities.contains_key(&uid)
    }

    /// 按 uid 查找。`0` 返回文档，`1` 返回默认样式，其他文档的 uid 返回 `None`。
    pub fn entity(&self, uid: Uid) -> Option<EntityRef<'_>> {
        if !uid.belongs_to(self.document) {
            return None;
        }
        match uid.id() {
            Uid::DOCUMENT_ID => Some(EntityRef::Document),
            Uid::STYLE_ID => Some(EntityRef::Style(&self.style)),
            _ => self.entities.get(&uid).map(|entity| match entity {
                Entity::Style(style) => EntityRef::Style(style),
                Entity::Node(node) => EntityRef::Node(node),
                Entity::Path(path) => EntityRef::Path(path),
            }),
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    pub fn node(&self, uid: Uid) -> Option<&Node> {
        match self.entities.get(&uid)? {
            Entity::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn path(&self, uid: Uid) -> Option<&Path> {
        match self.entities.get(&uid)? {
            Entity::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.entities.values().filter_map(|entity| match entity {
            Entity::Node(node) => Some(node),
            _ => None,
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.entities.values().filter_map(|entity| match entity {
            Entity::Path(path) => Some(path),
            _ => None,
        })
    }

    /// 独立样式实体（不含默认样式与节点、路径自带的样式）。
    pub fn styles(&self) -> impl Iterator<Item = &Style> + '_ {
        self.entities.values().filter_map(|entity| match entity {
            Entity::Style(style) => Some(style),
            _ => None,
        })
    }

    /// 实体持有的样式：样式实体本身，或节点、路径自带的样式。
    pub fn style_of(&self, uid: Uid) -> Option<&Style> {
        if uid == self.style_uid() {
            return Some(&self.style);
        }
        self.entities.get(&uid).map(Entity::style)
    }

    fn style_of_mut(&mut self, uid: Uid) -> Option<&mut Style> {
        if uid == self.style_uid() {
            return Some(&mut self.style);
        }
        self.entities.get_mut(&uid).map(Entity::style_mut)
    }

    /// 只查找可作为父样式的样式：默认样式与样式实体。
    pub fn find_style(&self, uid: Uid) -> Option<&Style> {
        match self.entity(uid)? {
            EntityRef::Style(style) => Some(style),
            _ => None,
        }
    }

    /// 沿父链解析的样式视图。
    pub fn resolved_style(&self, uid: Uid) -> Option<StyleRef<'_>> {
        self.style_of(uid).map(|style| StyleRef::new(self, style))
    }

    pub fn snapshot(&self, uid: Uid) -> Option<EntitySnapshot> {
        self.entities.get(&uid).map(Entity::snapshot)
    }

    /// 全部状态，按插入顺序。
    pub fn state(&self) -> DocumentState {
        DocumentState {
            style: StyleSnapshot::of(&self.style),
            entities: self
                .entities
                .iter()
                .map(|(uid, entity)| EntityState {
                    uid: *uid,
                    entity: entity.snapshot(),
                })
                .collect(),
        }
    }

    /// 解析位置的场景坐标。引用节点时取节点位置经 `anchors` 换算后的锚点坐标。
    pub fn scene_pos(&self, pos: &MetaPos, anchors: &dyn AnchorResolver) -> Pos {
        self.scene_pos_at_depth(pos, anchors, 0)
    }

    fn scene_pos_at_depth(&self, pos: &MetaPos, anchors: &dyn AnchorResolver, depth: usize) -> Pos {
        let Some(node) = pos.node().and_then(|uid| self.node(uid)) else {
            return pos.pos();
        };
        if depth >= MAX_ANCHOR_DEPTH {
            return pos.pos();
        }
        let center = self.scene_pos_at_depth(node.meta_pos(), anchors, depth + 1);
        let style = StyleRef::new(self, node.style());
        anchors.anchor_pos(node, style, center, pos.anchor())
    }

    /// 判断 `parent` 能否作为 `owner` 的父样式（不能是自身或其后代，必须是样式）。
    pub fn can_parent(&self, owner: Uid, parent: Option<Uid>) -> bool {
        if owner == self.style_uid() {
            return parent.is_none();
        }
        let Some(parent) = parent else {
            return true;
        };
        if parent == owner || self.find_style(parent).is_none() {
            return false;
        }
        let mut cursor = self.style_of(parent).and_then(Style::parent_uid);
        while let Some(uid) = cursor {
            if uid == owner {
                return false;
            }
            cursor = self.style_of(uid).and_then(Style::parent_uid);
        }
        true
    }

    pub fn connect(&mut self, uid: Uid, listener: impl FnMut() + 'static) -> Option<ListenerId> {
        self.config_of_mut(uid).map(|config| config.connect(listener))
    }

    pub fn disconnect(&mut self, uid: Uid, id: ListenerId) -> bool {
        self.config_of_mut(uid)
            .is_some_and(|config| config.disconnect(id))
    }

    /// 以给定 uid 创建空实体，父样式为默认样式。
    pub fn create_entity(&mut self, uid: Uid, kind: EntityKind) {
        self.assert_free(uid);
        let parent = self.style_uid();
        let mut scope = ConfigTransaction::new(self);
        scope.next_id = scope.next_id.max(uid.id().saturating_add(1));
        scope
            .entities
            .insert(uid, Entity::new(uid, kind, Some(parent)));
        scope.style.add_child(uid);
    }

    /// 按快照在 `index` 处恢复实体。
    pub fn restore_entity(&mut self, uid: Uid, snapshot: &EntitySnapshot, index: usize) {
        self.assert_free(uid);
        let mut scope = ConfigTransaction::new(self);
        scope.next_id = scope.next_id.max(uid.id().saturating_add(1));
        let index = index.min(scope.entities.len());
        scope.entities.shift_insert(index, uid, snapshot.restore(uid));
        if let Some(parent) = snapshot.style().parent {
            if let Some(style) = scope.style_of_mut(parent) {
                style.add_child(uid);
            }
        }
    }

    /// 删除实体：子样式改挂到被删样式的父样式，引用该节点的位置解除引用。
    pub fn remove_entity(&mut self, uid: Uid) -> RemovedEntity {
        self.assert_entity(uid);
        let mut scope = ConfigTransaction::new(self);

        let (parent, children) = {
            let style = scope
                .style_of(uid)
                .unwrap_or_else(|| panic!("entity {uid} has no style"));
            (style.parent_uid(), style.children().to_vec())
        };
        for child in children {
            scope.set_parent_style(child, parent);
        }

        let dangling: Vec<Uid> = scope
            .entities
            .iter()
            .filter(|(_, entity)| match entity {
                Entity::Node(node) => node.meta_pos().node() == Some(uid),
                Entity::Path(path) => path.references(uid),
                Entity::Style(_) => false,
            })
            .map(|(other, _)| *other)
            .collect();
        for other in dangling {
            scope.detach_from(other, uid);
        }

        if let Some(parent) = parent.and_then(|parent| scope.style_of_mut(parent)) {
            parent.remove_child(uid);
        }

        let (index, _, entity) = scope
            .entities
            .shift_remove_full(&uid)
            .unwrap_or_else(|| panic!("entity {uid} not found"));
        RemovedEntity {
            index,
            snapshot: entity.snapshot(),
        }
    }

    fn detach_from(&mut self, owner: Uid, node: Uid) {
        match self.entities.get(&owner) {
            Some(Entity::Node(other)) => {
                let mut pos = *other.meta_pos();
                pos.detach(self.scene_pos(&pos, &CenterAnchors));
                self.set_node_meta_pos(owner, pos);
            }
            Some(Entity::Path(path)) => {
                for end in path.ends_attached_to(node) {
                    if let Some(current) = self.path(owner).and_then(|path| path.meta_pos(end)) {
                        let mut pos = *current;
                        pos.detach(self.scene_pos(&pos, &CenterAnchors));
                        self.set_path_pos(owner, end, pos);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn set_node_meta_pos(&mut self, uid: Uid, pos: MetaPos) {
        self.edit(uid, |store| match store.entities.get_mut(&uid) {
            Some(Entity::Node(node)) => node.set_meta_pos(pos),
            _ => panic!("entity {uid} is not a node"),
        });
    }

    pub fn set_node_text(&mut self, uid: Uid, text: String) {
        self.edit(uid, |store| match store.entities.get_mut(&uid) {
            Some(Entity::Node(node)) => node.set_text(text),
            _ => panic!("entity {uid} is not a node"),
        });
    }

    /// 替换实体样式的全部属性槽。
    pub fn set_style_properties(&mut self, uid: Uid, properties: StyleProperties) {
        self.edit(uid, |store| {
            store
                .style_of_mut(uid)
                .unwrap_or_else(|| panic!("entity {uid} has no style"))
                .set_properties(properties);
        });
    }

    /// 修改父样式。以自身或后代为父、或父不是样式时 panic。
    pub fn set_parent_style(&mut self, uid: Uid, parent: Option<Uid>) {
        assert!(
            self.can_parent(uid, parent),
            "invalid parent style {parent:?} for {uid}"
        );
        let old = self
            .style_of(uid)
            .unwrap_or_else(|| panic!("entity {uid} has no style"))
            .parent_uid();
        if old == parent {
            return;
        }
        self.edit(uid, |store| {
            if let Some(old) = old.and_then(|old| store.style_of_mut(old)) {
                old.remove_child(uid);
            }
            if let Some(style) = store.style_of_mut(uid) {
                style.set_parent_uid(parent);
            }
            if let Some(new) = parent.and_then(|parent| store.style_of_mut(parent)) {
                new.add_child(uid);
            }
        });
    }

    pub fn set_path_pos(&mut self, uid: Uid, end: PathEnd, pos: MetaPos) {
        self.edit(uid, |store| {
            let Some(Entity::Path(path)) = store.entities.get_mut(&uid) else {
                panic!("entity {uid} is not a path");
            };
            let slot = path
                .meta_pos_mut(end)
                .unwrap_or_else(|| panic!("path {uid} has no {end:?} position"));
            *slot = pos;
        });
    }

    pub fn set_ellipse_radii(&mut self, uid: Uid, radius_x: Value, radius_y: Value) {
        self.edit(uid, |store| {
            let Some(Entity::Path(path)) = store.entities.get_mut(&uid) else {
                panic!("entity {uid} is not a path");
            };
            assert!(
                path.set_radii(radius_x, radius_y),
                "path {uid} is not an ellipse"
            );
        });
    }

    /// 清空所有实体并重置默认样式与 uid 计数。
    pub fn clear(&mut self) {
        let mut scope = ConfigTransaction::new(self);
        scope.entities.clear();
        let uid = scope.style_uid();
        scope.style = Style::new(uid, None);
        scope.next_id = Uid::FIRST_ENTITY_ID;
    }

    /// 修改 `uid`：文档与实体各自的配置块包裹修改，结束后通知所有子样式的持有者。
    fn edit<R>(&mut self, uid: Uid, apply: impl FnOnce(&mut Self) -> R) -> R {
        self.assert_entity(uid);
        let mut scope = ConfigTransaction::new(self);
        if let Some(config) = scope.config_of_mut(uid) {
            config.begin_config();
        }
        let result = apply(&mut *scope);
        if let Some(config) = scope.config_of_mut(uid) {
            config.end_config();
        }
        scope.propagate_to_children(uid);
        result
    }

    fn propagate_to_children(&mut self, uid: Uid) {
        let mut pending: Vec<Uid> = self
            .style_of(uid)
            .map(|style| style.children().to_vec())
            .unwrap_or_default();
        while let Some(child) = pending.pop() {
            if let Some(config) = self.config_of_mut(child) {
                config.emit_changed();
            }
            if let Some(style) = self.style_of(child) {
                pending.extend_from_slice(style.children());
            }
        }
    }

    fn config_of_mut(&mut self, uid: Uid) -> Option<&mut ConfigObject> {
        if uid == self.document_uid() {
            Some(&mut self.config)
        } else if uid == self.style_uid() {
            Some(self.style.config_mut())
        } else {
            self.entities.get_mut(&uid).map(Entity::config_mut)
        }
    }

    fn assert_entity(&self, uid: Uid) {
        assert!(
            uid.belongs_to(self.document),
            "uid {uid} belongs to another document"
        );
        assert!(
            uid == self.style_uid() || self.entities.contains_key(&uid),
            "entity {uid} not found"
        );
    }

    fn assert_free(&self, uid: Uid) {
        assert!(
            uid.belongs_to(self.document),
            "uid {uid} belongs to another document"
        );
        assert!(uid.id() >= Uid::FIRST_ENTITY_ID, "uid {uid} is reserved");
        assert!(
            !self.entities.contains_key(&uid),
            "entity {uid} already exists"
        );
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurable for EntityStore {
    fn config_mut(&mut self) -> &mut ConfigObject {
        &mut self.config
    }
}

impl StyleLookup for EntityStore {
    fn lookup_style(&self, uid: Uid) -> Option<&Style> {
        self.style_of(uid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub uid: Uid,
    #[serde(flatten)]
    pub entity: EntitySnapshot,
}

/// 文档的完整状态：默认样式加上按顺序排列的所有实体。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentState {
    pub style: StyleSnapshot,
    pub entities: Vec<EntityState>,
}
