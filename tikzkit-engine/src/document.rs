use std::ops::{Deref, DerefMut};
use std::path::{Path as FsPath, PathBuf};

use tikzkit_core::config::{Configurable, ListenerId};
use tikzkit_core::entity::{
    AnchorResolver, CenterAnchors, Entity, EntityKind, EntityRef, MetaPos, Node, Path, PathEnd,
};
use tikzkit_core::geometry::{Pos, Unit, Value};
use tikzkit_core::store::{DocumentState, EntityStore};
use tikzkit_core::style::{Style, StyleRef};
use tikzkit_core::tikz::{Anchor, PathKind};
use tikzkit_core::uid::{DocumentId, Uid};
use tracing::debug;

use crate::errors::EngineError;
use crate::undo::items::{
    CreateEntity, DeleteEntity, SetEllipseRadii, SetEntityStyle, SetNodePos, SetNodeText,
    SetParentStyle, SetPathPos,
};
use crate::undo::{UndoGroup, UndoItem, UndoManager};

/// 图文档：拥有实体仓库与撤销管理器，所有修改都经由这里。
///
/// 撤销标志未置位时，每个修改都被包装成撤销项交给 [`UndoManager`] 执行；
/// 置位时（撤销管理器回放期间）直接修改仓库。
pub struct Document {
    store: EntityStore,
    undo: UndoManager,
    anchors: Box<dyn AnchorResolver>,
    preferred_unit: Unit,
    path: Option<PathBuf>,
}

impl Document {
    pub fn new() -> Self {
        Self::with_anchor_resolver(Box::new(CenterAnchors))
    }

    /// 使用渲染层提供的锚点几何。
    pub fn with_anchor_resolver(anchors: Box<dyn AnchorResolver>) -> Self {
        Self {
            store: EntityStore::new(),
            undo: UndoManager::new(),
            anchors,
            preferred_unit: Unit::Centimeter,
            path: None,
        }
    }

    #[inline]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.store.document_id()
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.store.document_uid()
    }

    #[inline]
    pub fn style_uid(&self) -> Uid {
        self.store.style_uid()
    }

    #[inline]
    pub fn style(&self) -> &Style {
        self.store.document_style()
    }

    #[inline]
    pub fn preferred_unit(&self) -> Unit {
        self.preferred_unit
    }

    pub fn set_preferred_unit(&mut self, unit: Unit) {
        self.preferred_unit = unit;
    }

    #[inline]
    pub fn path(&self) -> Option<&FsPath> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    /// 文档名：文件名，未保存时为“未命名”。
    pub fn name(&self) -> String {
        self.path
            .as_deref()
            .and_then(FsPath::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "未命名".to_string())
    }

    pub fn entity(&self, uid: Uid) -> Option<EntityRef<'_>> {
        self.store.entity(uid)
    }

    pub fn node(&self, uid: Uid) -> Option<&Node> {
        self.store.node(uid)
    }

    pub fn path_entity(&self, uid: Uid) -> Option<&Path> {
        self.store.path(uid)
    }

    pub fn find_style(&self, uid: Uid) -> Option<&Style> {
        self.store.find_style(uid)
    }

    pub fn resolved_style(&self, uid: Uid) -> Option<StyleRef<'_>> {
        self.store.resolved_style(uid)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.store.nodes()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.store.paths()
    }

    pub fn styles(&self) -> impl Iterator<Item = &Style> + '_ {
        self.store.styles()
    }

    pub fn state(&self) -> DocumentState {
        self.store.state()
    }

    pub fn scene_pos(&self, pos: &MetaPos) -> Pos {
        self.store.scene_pos(pos, self.anchors.as_ref())
    }

    pub fn node_scene_pos(&self, uid: Uid) -> Option<Pos> {
        self.node(uid).map(|node| self.scene_pos(node.meta_pos()))
    }

    pub fn connect_changed(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        self.store.config_mut().connect(listener)
    }

    /// 监听指定实体的变更，实体不存在时返回 `None`。
    pub fn connect(&mut self, uid: Uid, listener: impl FnMut() + 'static) -> Option<ListenerId> {
        self.store.connect(uid, listener)
    }

    pub fn disconnect(&mut self, uid: Uid, id: ListenerId) -> bool {
        self.store.disconnect(uid, id)
    }

    // ---- 撤销与事务 ----

    #[inline]
    pub fn undo_active(&self) -> bool {
        self.store.undo_active()
    }

    pub fn set_undo_active(&mut self, active: bool) {
        self.store.set_undo_active(active);
    }

    pub fn add_undo_item(&mut self, item: UndoItem) {
        self.undo.add_undo_item(item, &mut self.store);
    }

    /// 校验后再执行撤销项，用于回放外部日志。
    pub fn try_add_undo_item(&mut self, item: UndoItem) -> Result<(), EngineError> {
        item.validate(&self.store)?;
        self.add_undo_item(item);
        Ok(())
    }

    /// 开始事务，事务期间文档的变更通知被合并到结束时发出。
    pub fn begin_transaction(&mut self, text: &str) {
        self.store.config_mut().begin_config();
        self.undo.start_transaction(text);
    }

    pub fn finish_transaction(&mut self) {
        self.undo.commit_transaction();
        self.store.config_mut().end_config();
    }

    pub fn cancel_transaction(&mut self) {
        self.undo.cancel_transaction(&mut self.store);
        self.store.config_mut().end_config();
    }

    #[inline]
    pub fn transaction_active(&self) -> bool {
        self.undo.transaction_active()
    }

    pub fn transaction(&mut self, text: &str) -> Transaction<'_> {
        Transaction::new(self, text)
    }

    pub fn undo(&mut self) -> bool {
        assert!(!self.transaction_active(), "undo() inside an open transaction");
        self.store.config_mut().begin_config();
        let undone = self.undo.undo(&mut self.store);
        self.store.config_mut().end_config();
        undone
    }

    pub fn redo(&mut self) -> bool {
        assert!(!self.transaction_active(), "redo() inside an open transaction");
        self.store.config_mut().begin_config();
        let redone = self.undo.redo(&mut self.store);
        self.store.config_mut().end_config();
        redone
    }

    #[inline]
    pub fn undo_available(&self) -> bool {
        self.undo.undo_available()
    }

    #[inline]
    pub fn redo_available(&self) -> bool {
        self.undo.redo_available()
    }

    #[inline]
    pub fn undo_groups(&self) -> &[UndoGroup] {
        self.undo.undo_groups()
    }

    #[inline]
    pub fn redo_groups(&self) -> &[UndoGroup] {
        self.undo.redo_groups()
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        !self.undo.is_clean()
    }

    pub fn set_clean(&mut self) {
        self.undo.set_clean(true);
    }

    /// 清空实体、撤销历史与文件路径，得到一个未修改的空文档。
    pub fn clear(&mut self) {
        self.undo.clear();
        self.store.clear();
        self.path = None;
        debug!("文档已清空");
    }

    /// 没有实体、没有历史、没有路径且未修改。
    pub fn is_empty_buffer(&self) -> bool {
        self.path.is_none()
            && !self.is_modified()
            && self.store.is_empty()
            && !self.undo_available()
            && !self.redo_available()
    }

    // ---- 创建与删除 ----

    /// 创建实体并返回其 uid。uid 在生成撤销项之前分配，回放时指向同一实体。
    pub fn create_entity(&mut self, kind: EntityKind) -> Uid {
        let uid = self.store.allocate_uid();
        if self.undo_active() {
            self.store.create_entity(uid, kind);
        } else {
            self.add_undo_item(UndoItem::CreateEntity(CreateEntity { uid, kind }));
        }
        debug!(uid = uid.id(), ?kind, "创建实体");
        uid
    }

    pub fn create_node(&mut self) -> Uid {
        self.create_entity(EntityKind::Node)
    }

    pub fn create_path(&mut self, kind: PathKind) -> Uid {
        self.create_entity(EntityKind::Path(kind))
    }

    pub fn create_style(&mut self) -> Uid {
        self.create_entity(EntityKind::Style)
    }

    /// 在两个节点之间创建连线，两端都引用节点中心。
    pub fn connect_nodes(&mut self, start: Uid, end: Uid, kind: PathKind) -> Uid {
        assert!(!kind.is_ellipse(), "ellipse paths have no endpoints");
        self.expect_node(start);
        self.expect_node(end);
        let mut transaction = self.transaction("连接节点");
        let uid = transaction.create_path(kind);
        transaction.set_path_pos(uid, PathEnd::Start, MetaPos::attached(start, Anchor::NoAnchor));
        transaction.set_path_pos(uid, PathEnd::End, MetaPos::attached(end, Anchor::NoAnchor));
        uid
    }

    /// 删除实体。先解除所有引用（连到该节点的路径与节点、以其为父的样式），再删除，整体为一个事务。
    pub fn delete_entity(&mut self, uid: Uid) {
        self.expect_entity(uid);
        assert!(
            uid.id() >= Uid::FIRST_ENTITY_ID,
            "cannot delete the document or its default style"
        );
        if self.undo_active() {
            self.store.remove_entity(uid);
            return;
        }

        self.begin_transaction("删除实体");

        let attached: Vec<(Uid, Option<PathEnd>, MetaPos)> = self
            .store
            .entities()
            .flat_map(|entity| match entity {
                Entity::Node(node) if node.meta_pos().node() == Some(uid) => {
                    vec![(node.uid(), None, *node.meta_pos())]
                }
                Entity::Path(path) => path
                    .ends_attached_to(uid)
                    .into_iter()
                    .filter_map(|end| path.meta_pos(end).map(|pos| (path.uid(), Some(end), *pos)))
                    .collect(),
                _ => Vec::new(),
            })
            .collect();
        for (owner, end, mut pos) in attached {
            pos.detach(self.scene_pos(&pos));
            match end {
                Some(end) => self.set_path_pos(owner, end, pos),
                None => self.set_node_meta_pos(owner, pos),
            }
        }

        let (parent, children) = self
            .store
            .style_of(uid)
            .map(|style| (style.parent_uid(), style.children().to_vec()))
            .unwrap_or_default();
        for child in children {
            self.set_parent_style(child, parent);
        }

        self.add_undo_item(UndoItem::DeleteEntity(DeleteEntity::new(uid)));
        self.finish_transaction();
        debug!(uid = uid.id(), "删除实体");
    }

    // ---- 属性修改 ----

    pub fn set_node_pos(&mut self, uid: Uid, pos: Pos) {
        self.set_node_meta_pos(uid, MetaPos::new(pos));
    }

    pub fn set_node_meta_pos(&mut self, uid: Uid, pos: MetaPos) {
        if *self.expect_node(uid).meta_pos() == pos {
            return;
        }
        if self.undo_active() {
            self.store.set_node_meta_pos(uid, pos);
        } else {
            self.add_undo_item(UndoItem::SetNodePos(SetNodePos::new(uid, pos)));
        }
    }

    pub fn set_node_text(&mut self, uid: Uid, text: impl Into<String>) {
        let text = text.into();
        if self.expect_node(uid).text() == text {
            return;
        }
        if self.undo_active() {
            self.store.set_node_text(uid, text);
        } else {
            self.add_undo_item(UndoItem::SetNodeText(SetNodeText::new(uid, text)));
        }
    }

    /// 在样式副本上执行 `edit`，属性有变化时作为一个撤销项提交。
    pub fn edit_style(&mut self, uid: Uid, edit: impl FnOnce(&mut Style)) {
        let current = self.expect_style_of(uid);
        let mut scratch =
            Style::with_properties(uid, current.parent_uid(), current.properties().clone());
        edit(&mut scratch);
        if scratch.properties() == current.properties() {
            return;
        }
        let properties = scratch.properties().clone();
        if self.undo_active() {
            self.store.set_style_properties(uid, properties);
        } else {
            self.add_undo_item(UndoItem::SetEntityStyle(SetEntityStyle::new(uid, properties)));
        }
    }

    /// 修改父样式。`parent` 必须是样式，且不能是 `uid` 自身或其后代。
    pub fn set_parent_style(&mut self, uid: Uid, parent: Option<Uid>) {
        let current = self.expect_style_of(uid).parent_uid();
        assert!(
            self.store.can_parent(uid, parent),
            "invalid parent style {parent:?} for {uid}"
        );
        if current == parent {
            return;
        }
        if self.undo_active() {
            self.store.set_parent_style(uid, parent);
        } else {
            self.add_undo_item(UndoItem::SetParentStyle(SetParentStyle::new(uid, parent)));
        }
    }

    pub fn set_path_pos(&mut self, uid: Uid, end: PathEnd, pos: MetaPos) {
        let current = self
            .expect_path(uid)
            .meta_pos(end)
            .copied()
            .unwrap_or_else(|| panic!("path {uid} has no {end:?} position"));
        if current == pos {
            return;
        }
        if self.undo_active() {
            self.store.set_path_pos(uid, end, pos);
        } else {
            self.add_undo_item(UndoItem::SetPathPos(SetPathPos::new(uid, end, pos)));
        }
    }

    pub fn set_ellipse_radii(&mut self, uid: Uid, radius_x: Value, radius_y: Value) {
        let current = self
            .expect_path(uid)
            .radii()
            .unwrap_or_else(|| panic!("path {uid} is not an ellipse"));
        if current == (radius_x, radius_y) {
            return;
        }
        if self.undo_active() {
            self.store.set_ellipse_radii(uid, radius_x, radius_y);
        } else {
            self.add_undo_item(UndoItem::SetEllipseRadii(SetEllipseRadii::new(
                uid, radius_x, radius_y,
            )));
        }
    }

    fn expect_entity(&self, uid: Uid) -> EntityRef<'_> {
        assert!(
            uid.belongs_to(self.document_id()),
            "uid {uid} belongs to another document"
        );
        self.store
            .entity(uid)
            .unwrap_or_else(|| panic!("entity {uid} not found"))
    }

    fn expect_node(&self, uid: Uid) -> &Node {
        match self.expect_entity(uid) {
            EntityRef::Node(node) => node,
            other => panic!("entity {uid} is a {}, expected node", other.entity_type()),
        }
    }

    fn expect_path(&self, uid: Uid) -> &Path {
        match self.expect_entity(uid) {
            EntityRef::Path(path) => path,
            other => panic!("entity {uid} is a {}, expected path", other.entity_type()),
        }
    }

    fn expect_style_of(&self, uid: Uid) -> &Style {
        self.expect_entity(uid);
        self.store
            .style_of(uid)
            .unwrap_or_else(|| panic!("entity {uid} has no style"))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("store", &self.store)
            .field("undo", &self.undo)
            .field("preferred_unit", &self.preferred_unit)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// 事务守卫：构造时开始事务，析构时提交，`cancel()` 撤销事务内的全部修改。
pub struct Transaction<'a> {
    document: &'a mut Document,
    done: bool,
}

impl<'a> Transaction<'a> {
    pub fn new(document: &'a mut Document, text: &str) -> Self {
        document.begin_transaction(text);
        Self {
            document,
            done: false,
        }
    }

    pub fn cancel(mut self) {
        self.document.cancel_transaction();
        self.done = true;
    }

    pub fn finish(mut self) {
        self.document.finish_transaction();
        self.done = true;
    }
}

impl Deref for Transaction<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.document
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.document
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.document.finish_transaction();
        }
    }
}
