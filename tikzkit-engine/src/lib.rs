pub mod command;
pub mod document;
pub mod undo;

pub use document::{Document, Transaction};

pub mod errors {
    use thiserror::Error;
    use tikzkit_core::entity::EntityType;
    use tikzkit_core::errors::ParseError;
    use tikzkit_core::uid::Uid;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity {0} not found")]
        EntityNotFound(Uid),
        #[error("entity {uid} is a {found}, expected {expected}")]
        UnexpectedEntityType {
            uid: Uid,
            expected: EntityType,
            found: EntityType,
        },
        #[error("entity {0} already exists")]
        DuplicateEntity(Uid),
        #[error("uid {0} is reserved")]
        ReservedId(Uid),
        #[error("uid {0} belongs to another document")]
        ForeignUid(Uid),
        #[error("style {parent} cannot be the parent style of {uid}")]
        InvalidParent { uid: Uid, parent: Uid },
        #[error("entity {uid} is still used by {user}")]
        EntityInUse { uid: Uid, user: Uid },
        #[error("invalid argument: {0}")]
        InvalidArgument(String),
        #[error(transparent)]
        Parse(#[from] ParseError),
    }
}

pub mod demo {
    use tikzkit_core::entity::{MetaPos, PathEnd};
    use tikzkit_core::geometry::{Pos, Unit, Value};
    use tikzkit_core::tikz::{Anchor, Arrow, Color, PathKind, PenStyle, Shape};
    use tikzkit_core::uid::Uid;
    use tracing::debug;

    use crate::document::Document;

    #[derive(Debug, Clone, Copy)]
    pub struct DemoEntities {
        pub style: Uid,
        pub start: Uid,
        pub end: Uid,
        pub edge: Uid,
        pub ellipse: Uid,
    }

    /// 为 CLI / 快速验证填充一组示例实体，返回关键实体 uid。每一步都是独立的撤销组。
    pub fn populate_demo(document: &mut Document) -> DemoEntities {
        let style = {
            let mut transaction = document.transaction("创建样式");
            let style = transaction.create_style();
            transaction.edit_style(style, |style| {
                style.set_shape(Shape::Circle);
                style.set_line_width(Value::thick());
                style.set_fill_color(Color::rgb(0xdd, 0xee, 0xff));
            });
            style
        };

        let start = {
            let mut transaction = document.transaction("创建节点");
            let node = transaction.create_node();
            transaction.set_node_pos(node, Pos::new(0.0, 0.0));
            transaction.set_node_text(node, "$a$");
            transaction.set_parent_style(node, Some(style));
            node
        };

        let end = {
            let mut transaction = document.transaction("创建节点");
            let node = transaction.create_node();
            transaction.set_node_pos(node, Pos::new(3.0, 1.0));
            transaction.set_node_text(node, "$b$");
            transaction.set_parent_style(node, Some(style));
            node
        };

        let edge = document.connect_nodes(start, end, PathKind::BendCurve);
        document.edit_style(edge, |style| {
            style.set_arrow_head(Arrow::StealthTick);
            style.set_pen_style(PenStyle::Dashed);
            style.set_bend_angle(30.0);
        });

        let ellipse = {
            let mut transaction = document.transaction("创建椭圆");
            let ellipse = transaction.create_path(PathKind::Ellipse);
            transaction.set_path_pos(
                ellipse,
                PathEnd::Center,
                MetaPos::attached(end, Anchor::NoAnchor),
            );
            transaction.set_ellipse_radii(
                ellipse,
                Value::new(1.0, Unit::Centimeter),
                Value::new(5.0, Unit::Millimeter),
            );
            ellipse
        };

        let ids = DemoEntities {
            style,
            start,
            end,
            edge,
            ellipse,
        };

        debug!(
            style = ids.style.id(),
            start = ids.start.id(),
            end = ids.end.id(),
            edge = ids.edge.id(),
            ellipse = ids.ellipse.id(),
            "已创建演示实体"
        );

        ids
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn demo_population_creates_entities() {
            let mut document = Document::new();
            let ids = populate_demo(&mut document);
            assert_eq!(document.store().len(), 5);
            assert_eq!(document.nodes().count(), 2);
            assert_eq!(document.paths().count(), 2);
            assert!(document.path_entity(ids.edge).unwrap().references(ids.start));
            assert_eq!(
                document.resolved_style(ids.start).unwrap().shape(),
                Shape::Circle
            );
            assert_eq!(document.undo_groups().len(), 6);
        }

        #[test]
        fn demo_history_unwinds_completely() {
            let mut document = Document::new();
            populate_demo(&mut document);
            while document.undo() {}
            assert!(document.store().is_empty());
            while document.redo() {}
            assert_eq!(document.store().len(), 5);
        }
    }
}
