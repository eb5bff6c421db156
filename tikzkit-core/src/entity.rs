use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigObject, Configurable};
use crate::geometry::{Pos, Unit, Value};
use crate::style::{Style, StyleProperties, StyleRef};
use crate::tikz::{Anchor, PathKind};
use crate::uid::Uid;

/// 位置：绝对坐标，或者对某个节点（加锚点）的非拥有引用。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetaPos {
    pos: Pos,
    node: Option<Uid>,
    anchor: Anchor,
}

impl MetaPos {
    #[inline]
    pub fn new(pos: Pos) -> Self {
        Self {
            pos,
            node: None,
            anchor: Anchor::NoAnchor,
        }
    }

    #[inline]
    pub fn attached(node: Uid, anchor: Anchor) -> Self {
        Self {
            pos: Pos::default(),
            node: Some(node),
            anchor,
        }
    }

    /// 日志反序列化使用，三个字段原样保留。
    #[inline]
    pub fn from_parts(pos: Pos, node: Option<Uid>, anchor: Anchor) -> Self {
        Self { pos, node, anchor }
    }

    /// 最近一次记录的绝对坐标；引用节点时该值仅作为解除引用后的位置。
    #[inline]
    pub fn pos(&self) -> Pos {
        self.pos
    }

    #[inline]
    pub fn node(&self) -> Option<Uid> {
        self.node
    }

    #[inline]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.node.is_some()
    }

    /// 设置绝对坐标，同时清除节点引用。
    pub fn set_pos(&mut self, pos: Pos) {
        self.pos = pos;
        self.node = None;
    }

    /// `None` 时保留最后记录的坐标。
    pub fn set_node(&mut self, node: Option<Uid>) {
        self.node = node;
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    /// 解除节点引用，并把解除前解析出的场景坐标记为绝对坐标。
    pub fn detach(&mut self, resolved: Pos) {
        self.pos = resolved;
        self.node = None;
        self.anchor = Anchor::NoAnchor;
    }
}

/// 把节点锚点换算为场景坐标，由渲染层的几何实现提供。
pub trait AnchorResolver {
    fn anchor_pos(&self, node: &Node, style: StyleRef<'_>, center: Pos, anchor: Anchor) -> Pos;
}

/// 默认解析器：所有锚点都落在节点中心。
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterAnchors;

impl AnchorResolver for CenterAnchors {
    fn anchor_pos(&self, _node: &Node, _style: StyleRef<'_>, center: Pos, _anchor: Anchor) -> Pos {
        center
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    uid: Uid,
    pos: MetaPos,
    text: String,
    style: Style,
    config: ConfigObject,
}

impl Node {
    /// 节点自带样式，样式 uid 与节点相同。
    pub fn new(uid: Uid, style_parent: Option<Uid>) -> Self {
        Self {
            uid,
            pos: MetaPos::default(),
            text: String::new(),
            style: Style::new(uid, style_parent),
            config: ConfigObject::new(),
        }
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[inline]
    pub fn meta_pos(&self) -> &MetaPos {
        &self.pos
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn style(&self) -> &Style {
        &self.style
    }

    pub(crate) fn style_mut(&mut self) -> &mut Style {
        &mut self.style
    }

    pub(crate) fn set_meta_pos(&mut self, pos: MetaPos) {
        self.pos = pos;
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            pos: self.pos,
            text: self.text.clone(),
            style: StyleSnapshot::of(&self.style),
        }
    }
}

impl Configurable for Node {
    fn config_mut(&mut self) -> &mut ConfigObject {
        &mut self.config
    }
}

/// 路径上可编辑的端点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathEnd {
    Start,
    End,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathGeometry {
    Edge {
        start: MetaPos,
        end: MetaPos,
    },
    Ellipse {
        center: MetaPos,
        #[serde(rename = "radius-x")]
        radius_x: Value,
        #[serde(rename = "radius-y")]
        radius_y: Value,
    },
}

impl PathGeometry {
    pub fn for_kind(kind: PathKind) -> Self {
        if kind.is_ellipse() {
            let radius = Value::new(1.0, Unit::Centimeter);
            PathGeometry::Ellipse {
                center: MetaPos::default(),
                radius_x: radius,
                radius_y: radius,
            }
        } else {
            PathGeometry::Edge {
                start: MetaPos::default(),
                end: MetaPos::default(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Path {
    uid: Uid,
    kind: PathKind,
    geometry: PathGeometry,
    style: Style,
    config: ConfigObject,
}

impl Path {
    pub fn new(uid: Uid, kind: PathKind, style_parent: Option<Uid>) -> Self {
        Self {
            uid,
            kind,
            geometry: PathGeometry::for_kind(kind),
            style: Style::new(uid, style_parent),
            config: ConfigObject::new(),
        }
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[inline]
    pub fn kind(&self) -> PathKind {
        self.kind
    }

    #[inline]
    pub fn geometry(&self) -> &PathGeometry {
        &self.geometry
    }

    #[inline]
    pub fn style(&self) -> &Style {
        &self.style
    }

    pub(crate) fn style_mut(&mut self) -> &mut Style {
        &mut self.style
    }

    pub fn meta_pos(&self, end: PathEnd) -> Option<&MetaPos> {
        match (&self.geometry, end) {
            (PathGeometry::Edge { start, .. }, PathEnd::Start) => Some(start),
            (PathGeometry::Edge { end, .. }, PathEnd::End) => Some(end),
            (PathGeometry::Ellipse { center, .. }, PathEnd::Center) => Some(center),
            _ => None,
        }
    }

    pub(crate) fn meta_pos_mut(&mut self, end: PathEnd) -> Option<&mut MetaPos> {
        match (&mut self.geometry, end) {
            (PathGeometry::Edge { start, .. }, PathEnd::Start) => Some(start),
            (PathGeometry::Edge { end, .. }, PathEnd::End) => Some(end),
            (PathGeometry::Ellipse { center, .. }, PathEnd::Center) => Some(center),
            _ => None,
        }
    }

    /// 该路径几何上存在的端点。
    pub fn ends(&self) -> &'static [PathEnd] {
        match self.geometry {
            PathGeometry::Edge { .. } => &[PathEnd::Start, PathEnd::End],
            PathGeometry::Ellipse { .. } => &[PathEnd::Center],
        }
    }

    /// 引用了 `node` 的端点。
    pub fn ends_attached_to(&self, node: Uid) -> Vec<PathEnd> {
        self.ends()
            .iter()
            .copied()
            .filter(|end| self.meta_pos(*end).and_then(MetaPos::node) == Some(node))
            .collect()
    }

    #[inline]
    pub fn references(&self, node: Uid) -> bool {
        !self.ends_attached_to(node).is_empty()
    }

    pub fn radii(&self) -> Option<(Value, Value)> {
        match self.geometry {
            PathGeometry::Ellipse {
                radius_x, radius_y, ..
            } => Some((radius_x, radius_y)),
            PathGeometry::Edge { .. } => None,
        }
    }

    pub(crate) fn set_radii(&mut self, rx: Value, ry: Value) -> bool {
        match &mut self.geometry {
            PathGeometry::Ellipse {
                radius_x, radius_y, ..
            } => {
                *radius_x = rx;
                *radius_y = ry;
                true
            }
            PathGeometry::Edge { .. } => false,
        }
    }

    pub fn snapshot(&self) -> PathSnapshot {
        PathSnapshot {
            path_kind: self.kind,
            geometry: self.geometry,
            style: StyleSnapshot::of(&self.style),
        }
    }
}

impl Configurable for Path {
    fn config_mut(&mut self) -> &mut ConfigObject {
        &mut self.config
    }
}

/// 仓库中的实体。文档本身（uid 0）不在此列。
#[derive(Debug, Clone)]
pub enum Entity {
    Style(Style),
    Node(Node),
    Path(Path),
}

impl Entity {
    pub fn new(uid: Uid, kind: EntityKind, style_parent: Option<Uid>) -> Self {
        match kind {
            EntityKind::Style => Entity::Style(Style::new(uid, style_parent)),
            EntityKind::Node => Entity::Node(Node::new(uid, style_parent)),
            EntityKind::Path(path_kind) => Entity::Path(Path::new(uid, path_kind, style_parent)),
        }
    }

    pub fn uid(&self) -> Uid {
        match self {
            Entity::Style(style) => style.uid(),
            Entity::Node(node) => node.uid(),
            Entity::Path(path) => path.uid(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Style(_) => EntityType::Style,
            Entity::Node(_) => EntityType::Node,
            Entity::Path(_) => EntityType::Path,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Style(_) => EntityKind::Style,
            Entity::Node(_) => EntityKind::Node,
            Entity::Path(path) => EntityKind::Path(path.kind()),
        }
    }

    /// 样式实体返回自身，节点与路径返回其自带样式。
    pub fn style(&self) -> &Style {
        match self {
            Entity::Style(style) => style,
            Entity::Node(node) => node.style(),
            Entity::Path(path) => path.style(),
        }
    }

    pub(crate) fn style_mut(&mut self) -> &mut Style {
        match self {
            Entity::Style(style) => style,
            Entity::Node(node) => node.style_mut(),
            Entity::Path(path) => path.style_mut(),
        }
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        match self {
            Entity::Style(style) => EntitySnapshot::Style(StyleSnapshot::of(style)),
            Entity::Node(node) => EntitySnapshot::Node(node.snapshot()),
            Entity::Path(path) => EntitySnapshot::Path(path.snapshot()),
        }
    }
}

impl Configurable for Entity {
    fn config_mut(&mut self) -> &mut ConfigObject {
        match self {
            Entity::Style(style) => style.config_mut(),
            Entity::Node(node) => node.config_mut(),
            Entity::Path(path) => path.config_mut(),
        }
    }
}

/// 创建实体所需的类型信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Style,
    Node,
    Path(PathKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Document,
    Style,
    Node,
    Path,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Document => "document",
            EntityType::Style => "style",
            EntityType::Node => "node",
            EntityType::Path => "path",
        };
        f.write_str(name)
    }
}

/// `EntityStore::entity` 的查找结果。
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Document,
    Style(&'a Style),
    Node(&'a Node),
    Path(&'a Path),
}

impl EntityRef<'_> {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityRef::Document => EntityType::Document,
            EntityRef::Style(_) => EntityType::Style,
            EntityRef::Node(_) => EntityType::Node,
            EntityRef::Path(_) => EntityType::Path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleSnapshot {
    pub parent: Option<Uid>,
    pub properties: StyleProperties,
}

impl StyleSnapshot {
    pub fn of(style: &Style) -> Self {
        Self {
            parent: style.parent_uid(),
            properties: style.properties().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub pos: MetaPos,
    pub text: String,
    pub style: StyleSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSnapshot {
    #[serde(rename = "path-kind")]
    pub path_kind: PathKind,
    pub geometry: PathGeometry,
    pub style: StyleSnapshot,
}

/// 实体的完整状态（不含 uid 与子样式列表），用于删除后的恢复以及状态导出。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntitySnapshot {
    Style(StyleSnapshot),
    Node(NodeSnapshot),
    Path(PathSnapshot),
}

impl EntitySnapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySnapshot::Style(_) => EntityKind::Style,
            EntitySnapshot::Node(_) => EntityKind::Node,
            EntitySnapshot::Path(path) => EntityKind::Path(path.path_kind),
        }
    }

    pub fn style(&self) -> &StyleSnapshot {
        match self {
            EntitySnapshot::Style(style) => style,
            EntitySnapshot::Node(node) => &node.style,
            EntitySnapshot::Path(path) => &path.style,
        }
    }

    /// 按快照重建实体。
    pub fn restore(&self, uid: Uid) -> Entity {
        let mut entity = Entity::new(uid, self.kind(), self.style().parent);
        *entity.style_mut().properties_mut() = self.style().properties.clone();
        match (&mut entity, self) {
            (Entity::Node(node), EntitySnapshot::Node(snapshot)) => {
                node.set_meta_pos(snapshot.pos);
                node.set_text(snapshot.text.clone());
            }
            (Entity::Path(path), EntitySnapshot::Path(snapshot)) => {
                path.geometry = snapshot.geometry;
            }
            _ => {}
        }
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::DocumentId;

    #[test]
    fn set_pos_clears_node_reference() {
        let doc = DocumentId::next();
        let node = Uid::new(2, doc);
        let mut pos = MetaPos::attached(node, Anchor::North);
        assert!(pos.is_attached());
        pos.set_pos(Pos::new(1.0, 2.0));
        assert_eq!(pos.node(), None);
        assert_eq!(pos.pos(), Pos::new(1.0, 2.0));

        let mut pos = MetaPos::attached(node, Anchor::Center);
        pos.set_node(None);
        assert_eq!(pos.pos(), Pos::default());
        assert_eq!(pos.anchor(), Anchor::Center);
    }

    #[test]
    fn path_ends_follow_geometry() {
        let doc = DocumentId::next();
        let line = Path::new(Uid::new(3, doc), PathKind::Line, None);
        assert!(line.meta_pos(PathEnd::Start).is_some());
        assert!(line.meta_pos(PathEnd::Center).is_none());
        assert!(line.radii().is_none());

        let ellipse = Path::new(Uid::new(4, doc), PathKind::Ellipse, None);
        assert_eq!(ellipse.ends(), &[PathEnd::Center]);
        assert!(ellipse.radii().is_some());
    }

    #[test]
    fn snapshot_restores_node_state() {
        let doc = DocumentId::next();
        let uid = Uid::new(7, doc);
        let mut node = Node::new(uid, Some(Uid::new(1, doc)));
        node.set_text("a".to_string());
        node.set_meta_pos(MetaPos::new(Pos::new(3.0, 4.0)));
        node.style_mut().set_shape(crate::tikz::Shape::Circle);

        let snapshot = Entity::Node(node).snapshot();
        let Entity::Node(restored) = snapshot.restore(uid) else {
            panic!("expected node");
        };
        assert_eq!(restored.text(), "a");
        assert_eq!(restored.meta_pos().pos(), Pos::new(3.0, 4.0));
        assert!(restored.style().shape_set());
        assert_eq!(restored.style().parent_uid(), Some(Uid::new(1, doc)));
    }
}
