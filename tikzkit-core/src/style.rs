//! 样式：带父链回退的属性集合。
//!
//! 每个属性槽要么未设置（回退到父样式，最终回退到内置默认值），要么显式设置。
//! 样式之间只通过 `Uid` 互相引用，解析时借助 [`StyleLookup`] 沿父链查找。

use serde::{Deserialize, Serialize};

use crate::config::{ConfigObject, ConfigTransaction, Configurable, ListenerId};
use crate::geometry::Value;
use crate::tikz::{Arrow, Color, PenStyle, Shape, TextAlignment};
use crate::uid::Uid;

macro_rules! style_properties {
    (
        chained {
            $( $(#[$doc:meta])* $field:ident, $setter:ident, $unsetter:ident, $is_set:ident:
                $ty:ty = $default:expr, $key:literal; )+
        }
        custom {
            $( $(#[$cdoc:meta])* $cfield:ident, $csetter:ident, $cunsetter:ident, $cis_set:ident:
                $cty:ty = $cdefault:expr, $ckey:literal; )+
        }
    ) => {
        /// 样式的本地属性槽，`None` 表示未设置。序列化时只输出已设置的键。
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct StyleProperties {
            $(
                $(#[$doc])*
                #[serde(rename = $key, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
            $(
                $(#[$cdoc])*
                #[serde(rename = $ckey, default, skip_serializing_if = "Option::is_none")]
                pub $cfield: Option<$cty>,
            )+
        }

        impl StyleProperties {
            /// 所有属性都设置为内置默认值。
            pub fn defaults() -> Self {
                Self {
                    $( $field: Some($default), )+
                    $( $cfield: Some($cdefault), )+
                }
            }

            /// 已设置属性的 JSON 键，按声明顺序。
            pub fn set_keys(&self) -> Vec<&'static str> {
                let mut keys = Vec::new();
                $( if self.$field.is_some() { keys.push($key); } )+
                $( if self.$cfield.is_some() { keys.push($ckey); } )+
                keys
            }

            pub fn is_empty(&self) -> bool {
                $( self.$field.is_none() && )+
                $( self.$cfield.is_none() && )+
                true
            }

            /// 用 `other` 中已设置的槽覆盖自身。
            pub fn overlay(&mut self, other: &StyleProperties) {
                $( if other.$field.is_some() { self.$field = other.$field; } )+
                $( if other.$cfield.is_some() { self.$cfield = other.$cfield; } )+
            }
        }

        impl Style {
            $(
                pub fn $setter(&mut self, value: $ty) {
                    if self.properties.$field == Some(value) {
                        return;
                    }
                    let mut guard = ConfigTransaction::new(self);
                    guard.properties.$field = Some(value);
                }

                pub fn $unsetter(&mut self) {
                    if self.properties.$field.is_none() {
                        return;
                    }
                    let mut guard = ConfigTransaction::new(self);
                    guard.properties.$field = None;
                }

                #[inline]
                pub fn $is_set(&self) -> bool {
                    self.properties.$field.is_some()
                }
            )+
            $(
                pub fn $csetter(&mut self, value: $cty) {
                    if self.properties.$cfield == Some(value) {
                        return;
                    }
                    let mut guard = ConfigTransaction::new(self);
                    guard.properties.$cfield = Some(value);
                }

                pub fn $cunsetter(&mut self) {
                    if self.properties.$cfield.is_none() {
                        return;
                    }
                    let mut guard = ConfigTransaction::new(self);
                    guard.properties.$cfield = None;
                }

                #[inline]
                pub fn $cis_set(&self) -> bool {
                    self.properties.$cfield.is_some()
                }
            )+
        }

        impl StyleRef<'_> {
            $(
                pub fn $field(&self) -> $ty {
                    self.resolve(|props| props.$field).unwrap_or($default)
                }
            )+

            /// 完全解析后的属性集合，每个槽都有值。
            pub fn resolved(&self) -> StyleProperties {
                StyleProperties {
                    $( $field: Some(self.$field()), )+
                    $( $cfield: Some(self.$cfield()), )+
                }
            }
        }
    };
}

style_properties! {
    chained {
        pen_style, set_pen_style, unset_pen_style, pen_style_set:
            PenStyle = PenStyle::Solid, "pen-style";
        line_width, set_line_width, unset_line_width, line_width_set:
            Value = Value::semi_thick(), "line-width";
        double_line, set_double_line, unset_double_line, double_line_set:
            bool = false, "double-line";
        pen_opacity, set_pen_opacity, unset_pen_opacity, pen_opacity_set:
            f64 = 1.0, "pen-opacity";
        fill_opacity, set_fill_opacity, unset_fill_opacity, fill_opacity_set:
            f64 = 1.0, "fill-opacity";
        pen_color, set_pen_color, unset_pen_color, pen_color_set:
            Color = Color::BLACK, "pen-color";
        /// 双线时两条线之间的颜色。
        inner_line_color, set_inner_line_color, unset_inner_line_color, inner_line_color_set:
            Color = Color::WHITE, "inner-line-color";
        fill_color, set_fill_color, unset_fill_color, fill_color_set:
            Color = Color::TRANSPARENT, "fill-color";
        /// 旋转角度（度）。
        rotation, set_rotation, unset_rotation, rotation_set:
            f64 = 0.0, "rotation";
        shape, set_shape, unset_shape, shape_set:
            Shape = Shape::Rectangle, "shape";
        text_align, set_text_align, unset_text_align, text_align_set:
            TextAlignment = TextAlignment::Center, "text-align";
        inner_sep, set_inner_sep, unset_inner_sep, inner_sep_set:
            Value = Value::pt(3.0), "inner-sep";
        outer_sep, set_outer_sep, unset_outer_sep, outer_sep_set:
            Value = Value::pt(0.3), "outer-sep";
        minimum_width, set_minimum_width, unset_minimum_width, minimum_width_set:
            Value = Value::zero(), "minimum-width";
        minimum_height, set_minimum_height, unset_minimum_height, minimum_height_set:
            Value = Value::zero(), "minimum-height";
        arrow_tail, set_arrow_tail, unset_arrow_tail, arrow_tail_set:
            Arrow = Arrow::NoArrow, "arrow-tail";
        arrow_head, set_arrow_head, unset_arrow_head, arrow_head_set:
            Arrow = Arrow::NoArrow, "arrow-head";
        shorten_start, set_shorten_start, unset_shorten_start, shorten_start_set:
            Value = Value::zero(), "shorten-start";
        shorten_end, set_shorten_end, unset_shorten_end, shorten_end_set:
            Value = Value::zero(), "shorten-end";
        bend_angle, set_bend_angle, unset_bend_angle, bend_angle_set:
            f64 = 0.0, "bend-angle";
        looseness, set_looseness, unset_looseness, looseness_set:
            f64 = 1.0, "looseness";
    }
    custom {
        /// 只在双线样式上生效，见 [`StyleRef::inner_line_width`]。
        inner_line_width, set_inner_line_width, unset_inner_line_width, inner_line_width_set:
            Value = Value::semi_thick(), "inner-line-width";
    }
}

/// 根据 `Uid` 查找样式，由实体仓库实现。
pub trait StyleLookup {
    fn lookup_style(&self, uid: Uid) -> Option<&Style>;
}

/// 没有父链可查的查找器，用于独立样式。
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl StyleLookup for Detached {
    fn lookup_style(&self, _uid: Uid) -> Option<&Style> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Style {
    uid: Uid,
    parent: Option<Uid>,
    children: Vec<Uid>,
    properties: StyleProperties,
    config: ConfigObject,
}

impl Style {
    pub fn new(uid: Uid, parent: Option<Uid>) -> Self {
        Self {
            uid,
            parent,
            children: Vec::new(),
            properties: StyleProperties::default(),
            config: ConfigObject::new(),
        }
    }

    pub fn with_properties(uid: Uid, parent: Option<Uid>, properties: StyleProperties) -> Self {
        Self {
            properties,
            ..Self::new(uid, parent)
        }
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[inline]
    pub fn parent_uid(&self) -> Option<Uid> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[Uid] {
        &self.children
    }

    #[inline]
    pub fn properties(&self) -> &StyleProperties {
        &self.properties
    }

    /// 复制 `other` 的全部属性槽（不含 uid、父子关系与配置计数）。
    pub fn set_style(&mut self, other: &Style) {
        self.set_properties(other.properties.clone());
    }

    pub fn set_properties(&mut self, properties: StyleProperties) {
        if self.properties == properties {
            return;
        }
        let mut guard = ConfigTransaction::new(self);
        guard.properties = properties;
    }

    /// 以独立样式解析（不查父链）。
    pub fn detached(&self) -> StyleRef<'_> {
        StyleRef::new(&Detached, self)
    }

    pub fn connect_changed(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        self.config.connect(listener)
    }

    #[inline]
    pub fn config(&self) -> &ConfigObject {
        &self.config
    }

    pub(crate) fn set_parent_uid(&mut self, parent: Option<Uid>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: Uid) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: Uid) {
        self.children.retain(|uid| *uid != child);
    }

    pub(crate) fn properties_mut(&mut self) -> &mut StyleProperties {
        &mut self.properties
    }
}

impl Configurable for Style {
    fn config_mut(&mut self) -> &mut ConfigObject {
        &mut self.config
    }
}

/// 样式加上其所在仓库，属性读取会沿父链解析。
#[derive(Clone, Copy)]
pub struct StyleRef<'a> {
    lookup: &'a dyn StyleLookup,
    style: &'a Style,
}

impl<'a> StyleRef<'a> {
    pub fn new(lookup: &'a dyn StyleLookup, style: &'a Style) -> Self {
        Self { lookup, style }
    }

    #[inline]
    pub fn style(&self) -> &'a Style {
        self.style
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.style.uid
    }

    pub fn parent(&self) -> Option<StyleRef<'a>> {
        let parent = self.style.parent?;
        self.lookup
            .lookup_style(parent)
            .map(|style| StyleRef::new(self.lookup, style))
    }

    fn resolve<T>(&self, pick: impl Fn(&StyleProperties) -> Option<T>) -> Option<T> {
        let mut current = Some(*self);
        while let Some(style) = current {
            if let Some(value) = pick(&style.style.properties) {
                return Some(value);
            }
            current = style.parent();
        }
        None
    }

    /// 双线的内线宽度。非双线时为零；未设置时只回退到同为双线的父样式。
    pub fn inner_line_width(&self) -> Value {
        if !self.double_line() {
            return Value::zero();
        }
        if let Some(width) = self.style.properties.inner_line_width {
            return width;
        }
        match self.parent() {
            Some(parent) if parent.double_line() => parent.inner_line_width(),
            _ => Value::semi_thick(),
        }
    }

    /// 画笔总宽度：双线时为两条线宽加内线宽。
    pub fn pen_width(&self) -> Value {
        if self.double_line() {
            2.0 * self.line_width() + self.inner_line_width()
        } else {
            self.line_width()
        }
    }
}

impl std::fmt::Debug for StyleRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StyleRef").field(self.style).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::uid::DocumentId;

    #[derive(Default)]
    struct Styles(HashMap<Uid, Style>);

    impl StyleLookup for Styles {
        fn lookup_style(&self, uid: Uid) -> Option<&Style> {
            self.0.get(&uid)
        }
    }

    fn chain() -> (Styles, Uid, Uid, Uid) {
        let doc = DocumentId::next();
        let root = Uid::new(1, doc);
        let middle = Uid::new(2, doc);
        let leaf = Uid::new(3, doc);
        let mut styles = Styles::default();
        styles.0.insert(root, Style::new(root, None));
        styles.0.insert(middle, Style::new(middle, Some(root)));
        styles.0.insert(leaf, Style::new(leaf, Some(middle)));
        (styles, root, middle, leaf)
    }

    fn view(styles: &Styles, uid: Uid) -> StyleRef<'_> {
        StyleRef::new(styles, &styles.0[&uid])
    }

    #[test]
    fn unset_properties_fall_back_through_parents() {
        let (mut styles, root, middle, leaf) = chain();
        assert_eq!(view(&styles, leaf).line_width(), Value::semi_thick());

        styles.0.get_mut(&root).unwrap().set_line_width(Value::thick());
        assert_eq!(view(&styles, leaf).line_width(), Value::thick());

        styles.0.get_mut(&middle).unwrap().set_line_width(Value::thin());
        assert_eq!(view(&styles, leaf).line_width(), Value::thin());
        assert!(!styles.0[&leaf].line_width_set());

        styles.0.get_mut(&middle).unwrap().unset_line_width();
        assert_eq!(view(&styles, leaf).line_width(), Value::thick());
    }

    #[test]
    fn inner_line_width_requires_double_line() {
        let (mut styles, root, _middle, leaf) = chain();
        styles
            .0
            .get_mut(&root)
            .unwrap()
            .set_inner_line_width(Value::pt(2.0));
        assert_eq!(view(&styles, leaf).inner_line_width(), Value::zero());

        styles.0.get_mut(&leaf).unwrap().set_double_line(true);
        // 父样式不是双线，不能继承其内线宽度
        assert_eq!(view(&styles, leaf).inner_line_width(), Value::semi_thick());

        styles.0.get_mut(&root).unwrap().set_double_line(true);
        assert_eq!(view(&styles, leaf).inner_line_width(), Value::pt(2.0));
        assert_eq!(
            view(&styles, leaf).pen_width(),
            Value::pt(2.0 * 0.6 + 2.0)
        );
    }

    #[test]
    fn setters_are_gated_on_equality() {
        let doc = DocumentId::next();
        let mut style = Style::new(Uid::new(4, doc), None);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        style.connect_changed(move || counter.set(counter.get() + 1));

        style.set_pen_color(Color::BLACK);
        assert!(style.pen_color_set());
        assert_eq!(hits.get(), 1);
        style.set_pen_color(Color::BLACK);
        assert_eq!(hits.get(), 1);
        style.unset_pen_color();
        style.unset_pen_color();
        assert_eq!(hits.get(), 2);
        assert!(style.properties().is_empty());
    }

    #[test]
    fn properties_serialize_only_set_keys() {
        let mut props = StyleProperties::default();
        props.line_width = Some(Value::thick());
        props.pen_style = Some(PenStyle::Dashed);
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "pen-style": "dashed", "line-width": "0.8pt" })
        );
        assert_eq!(props.set_keys(), vec!["pen-style", "line-width"]);

        let back: StyleProperties = serde_json::from_value(json).unwrap();
        assert_eq!(back, props);
    }

    #[test]
    fn set_style_copies_slots_only() {
        let doc = DocumentId::next();
        let mut source = Style::new(Uid::new(5, doc), None);
        source.set_shape(Shape::Circle);
        let mut target = Style::new(Uid::new(6, doc), Some(Uid::new(1, doc)));
        target.set_style(&source);
        assert_eq!(target.uid(), Uid::new(6, doc));
        assert_eq!(target.parent_uid(), Some(Uid::new(1, doc)));
        assert_eq!(target.detached().shape(), Shape::Circle);
    }
}
