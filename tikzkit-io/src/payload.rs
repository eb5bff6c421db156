//! 撤销历史日志的 JSON 结构。
//!
//! ```json
//! { "history": [ { "text": "...", "items": [ { "type": "node-set-pos", ... } ] } ],
//!   "preferred-unit": "cm" }
//! ```

use serde::{Deserialize, Serialize};
use tikzkit_core::entity::{EntityKind, MetaPos, PathEnd};
use tikzkit_core::geometry::{Pos, Unit, Value};
use tikzkit_core::style::StyleProperties;
use tikzkit_core::tikz::{Anchor, PathKind};
use tikzkit_core::uid::{DocumentId, Uid};
use tikzkit_engine::undo::UndoItem;
use tikzkit_engine::undo::items::{
    CreateEntity, DeleteEntity, SetEllipseRadii, SetEntityStyle, SetNodePos, SetNodeText,
    SetParentStyle, SetPathPos,
};

use crate::IoError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
    pub history: Vec<TransactionEntry>,
    #[serde(
        rename = "preferred-unit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred_unit: Option<Unit>,
}

/// 一个撤销组。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub text: String,
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKindPayload {
    Style,
    Node,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPosPayload {
    pub pos: [f64; 2],
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub anchor: Anchor,
}

impl MetaPosPayload {
    fn from_meta_pos(pos: &MetaPos) -> Self {
        Self {
            pos: [pos.pos().x(), pos.pos().y()],
            node: pos.node().map(|uid| uid.to_string()),
            anchor: pos.anchor(),
        }
    }

    fn into_meta_pos(self, document: DocumentId) -> Result<MetaPos, IoError> {
        let node = self
            .node
            .map(|uid| Uid::parse(&uid, document))
            .transpose()?;
        Ok(MetaPos::from_parts(
            Pos::new(self.pos[0], self.pos[1]),
            node,
            self.anchor,
        ))
    }
}

/// 单个撤销项的正向数据。uid 以十进制字符串保存。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ItemPayload {
    CreateEntity {
        uid: String,
        kind: EntityKindPayload,
        #[serde(rename = "path-kind", default, skip_serializing_if = "Option::is_none")]
        path_kind: Option<PathKind>,
    },
    DeleteEntity {
        uid: String,
    },
    NodeSetPos {
        uid: String,
        pos: MetaPosPayload,
    },
    NodeSetText {
        uid: String,
        text: String,
    },
    SetStyle {
        uid: String,
        style: StyleProperties,
    },
    SetParentStyle {
        uid: String,
        parent: Option<String>,
    },
    PathSetPos {
        uid: String,
        end: PathEnd,
        pos: MetaPosPayload,
    },
    EllipseSetRadii {
        uid: String,
        #[serde(rename = "radius-x")]
        radius_x: Value,
        #[serde(rename = "radius-y")]
        radius_y: Value,
    },
}

impl ItemPayload {
    pub fn from_item(item: &UndoItem) -> Self {
        match item {
            UndoItem::CreateEntity(item) => {
                let (kind, path_kind) = match item.kind {
                    EntityKind::Style => (EntityKindPayload::Style, None),
                    EntityKind::Node => (EntityKindPayload::Node, None),
                    EntityKind::Path(path_kind) => (EntityKindPayload::Path, Some(path_kind)),
                };
                ItemPayload::CreateEntity {
                    uid: item.uid.to_string(),
                    kind,
                    path_kind,
                }
            }
            UndoItem::DeleteEntity(item) => ItemPayload::DeleteEntity {
                uid: item.uid.to_string(),
            },
            UndoItem::SetNodePos(item) => ItemPayload::NodeSetPos {
                uid: item.uid.to_string(),
                pos: MetaPosPayload::from_meta_pos(&item.pos),
            },
            UndoItem::SetNodeText(item) => ItemPayload::NodeSetText {
                uid: item.uid.to_string(),
                text: item.text.clone(),
            },
            UndoItem::SetEntityStyle(item) => ItemPayload::SetStyle {
                uid: item.uid.to_string(),
                style: item.properties.clone(),
            },
            UndoItem::SetParentStyle(item) => ItemPayload::SetParentStyle {
                uid: item.uid.to_string(),
                parent: item.parent.map(|uid| uid.to_string()),
            },
            UndoItem::SetPathPos(item) => ItemPayload::PathSetPos {
                uid: item.uid.to_string(),
                end: item.end,
                pos: MetaPosPayload::from_meta_pos(&item.pos),
            },
            UndoItem::SetEllipseRadii(item) => ItemPayload::EllipseSetRadii {
                uid: item.uid.to_string(),
                radius_x: item.radius_x,
                radius_y: item.radius_y,
            },
        }
    }

    /// 转换为绑定到 `document` 的撤销项。
    pub fn into_item(self, document: DocumentId) -> Result<UndoItem, IoError> {
        let uid = |text: &str| Uid::parse(text, document);
        let item = match self {
            ItemPayload::CreateEntity {
                uid: id,
                kind,
                path_kind,
            } => {
                let kind = match kind {
                    EntityKindPayload::Style => EntityKind::Style,
                    EntityKindPayload::Node => EntityKind::Node,
                    EntityKindPayload::Path => EntityKind::Path(path_kind.unwrap_or_default()),
                };
                UndoItem::CreateEntity(CreateEntity {
                    uid: uid(&id)?,
                    kind,
                })
            }
            ItemPayload::DeleteEntity { uid: id } => {
                UndoItem::DeleteEntity(DeleteEntity::new(uid(&id)?))
            }
            ItemPayload::NodeSetPos { uid: id, pos } => UndoItem::SetNodePos(SetNodePos::new(
                uid(&id)?,
                pos.into_meta_pos(document)?,
            )),
            ItemPayload::NodeSetText { uid: id, text } => {
                UndoItem::SetNodeText(SetNodeText::new(uid(&id)?, text))
            }
            ItemPayload::SetStyle { uid: id, style } => {
                UndoItem::SetEntityStyle(SetEntityStyle::new(uid(&id)?, style))
            }
            ItemPayload::SetParentStyle { uid: id, parent } => {
                let parent = parent.as_deref().map(uid).transpose()?;
                UndoItem::SetParentStyle(SetParentStyle::new(uid(&id)?, parent))
            }
            ItemPayload::PathSetPos { uid: id, end, pos } => UndoItem::SetPathPos(
                SetPathPos::new(uid(&id)?, end, pos.into_meta_pos(document)?),
            ),
            ItemPayload::EllipseSetRadii {
                uid: id,
                radius_x,
                radius_y,
            } => UndoItem::SetEllipseRadii(SetEllipseRadii::new(uid(&id)?, radius_x, radius_y)),
        };
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn node_pos_payload_uses_log_field_names() {
        let doc = DocumentId::next();
        let item = UndoItem::SetNodePos(SetNodePos::new(
            Uid::new(4, doc),
            MetaPos::attached(Uid::new(2, doc), Anchor::NorthEast),
        ));
        let value = serde_json::to_value(ItemPayload::from_item(&item)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "node-set-pos",
                "uid": "4",
                "pos": { "pos": [0.0, 0.0], "node": "2", "anchor": "north-east" }
            })
        );
    }

    #[test]
    fn create_path_defaults_to_line() {
        let doc = DocumentId::next();
        let payload: ItemPayload =
            serde_json::from_value(json!({ "type": "create-entity", "uid": "3", "kind": "path" }))
                .unwrap();
        let item = payload.into_item(doc).unwrap();
        assert_eq!(
            item,
            UndoItem::CreateEntity(CreateEntity {
                uid: Uid::new(3, doc),
                kind: EntityKind::Path(PathKind::Line),
            })
        );
    }

    #[test]
    fn malformed_uid_is_rejected() {
        let payload = ItemPayload::DeleteEntity {
            uid: "three".to_string(),
        };
        assert!(matches!(
            payload.into_item(DocumentId::next()),
            Err(IoError::Value(_))
        ));
    }
}
