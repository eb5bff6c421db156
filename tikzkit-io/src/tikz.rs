//! 生成 `tikzpicture` 代码。坐标按 TikZ 的默认单位（cm）输出。

use std::fmt::Write as _;

use tikzkit_core::entity::{MetaPos, Node, Path, PathEnd};
use tikzkit_core::geometry::Value;
use tikzkit_core::style::{StyleProperties, StyleRef};
use tikzkit_core::tikz::{Anchor, Arrow, Color, PathKind, PenStyle, Shape, TextAlignment};
use tikzkit_engine::Document;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct TikzExporter;

impl TikzExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn export(&self, document: &Document) -> String {
        let mut out = String::from("\\begin{tikzpicture}\n");
        for node in document.nodes() {
            if let Some(style) = document.resolved_style(node.uid()) {
                out.push_str(&node_line(node, style));
            }
        }
        for path in document.paths() {
            if let Some(style) = document.resolved_style(path.uid()) {
                out.push_str(&path_line(path, style));
            }
        }
        out.push_str("\\end{tikzpicture}\n");
        debug!(
            nodes = document.nodes().count(),
            paths = document.paths().count(),
            "已导出 TikZ 代码"
        );
        out
    }
}

fn node_line(node: &Node, style: StyleRef<'_>) -> String {
    let mut options = Vec::new();
    let shape = style.shape();
    if shape != Shape::NoShape {
        options.push(shape.tikz_name().to_string());
    }
    line_options(style, &mut options);
    if style.text_align() != TextAlignment::Center {
        options.push(format!("align={}", style.text_align().tikz_name()));
    }
    let defaults = StyleProperties::defaults();
    push_length(&mut options, "inner sep", style.inner_sep(), defaults.inner_sep);
    push_length(&mut options, "outer sep", style.outer_sep(), defaults.outer_sep);
    push_length(
        &mut options,
        "minimum width",
        style.minimum_width(),
        defaults.minimum_width,
    );
    push_length(
        &mut options,
        "minimum height",
        style.minimum_height(),
        defaults.minimum_height,
    );
    format!(
        "\\node{} (n{}) at {} {{{}}};\n",
        option_list(&options),
        node.uid(),
        coordinate(node.meta_pos()),
        node.text()
    )
}

fn path_line(path: &Path, style: StyleRef<'_>) -> String {
    let mut options = Vec::new();
    let arrows = arrow_spec(style.arrow_tail(), style.arrow_head());
    if !arrows.is_empty() {
        options.push(arrows);
    }
    line_options(style, &mut options);
    let defaults = StyleProperties::defaults();
    push_length(&mut options, "shorten <", style.shorten_start(), defaults.shorten_start);
    push_length(&mut options, "shorten >", style.shorten_end(), defaults.shorten_end);

    let mut line = format!("\\draw{} ", option_list(&options));
    match path.kind() {
        PathKind::Ellipse => {
            let center = path.meta_pos(PathEnd::Center).cloned().unwrap_or_default();
            let (radius_x, radius_y) = path.radii().unwrap_or_default();
            let _ = write!(
                line,
                "{} ellipse ({} and {})",
                coordinate(&center),
                radius_x,
                radius_y
            );
        }
        kind => {
            let start = path.meta_pos(PathEnd::Start).cloned().unwrap_or_default();
            let end = path.meta_pos(PathEnd::End).cloned().unwrap_or_default();
            let _ = write!(
                line,
                "{} {} {}",
                coordinate(&start),
                operation(kind, style),
                coordinate(&end)
            );
        }
    }
    line.push_str(";\n");
    line
}

fn operation(kind: PathKind, style: StyleRef<'_>) -> String {
    let mut extra = Vec::new();
    if kind == PathKind::BendCurve {
        let angle = style.bend_angle();
        if angle < 0.0 {
            extra.push(format!("bend right={}", number(-angle)));
        } else {
            extra.push(format!("bend left={}", number(angle)));
        }
    }
    if matches!(kind, PathKind::BendCurve | PathKind::InOutCurve | PathKind::BezierCurve)
        && style.looseness() != 1.0
    {
        extra.push(format!("looseness={}", number(style.looseness())));
    }
    if extra.is_empty() {
        kind.tikz_name().to_string()
    } else {
        format!("{}[{}]", kind.tikz_name(), extra.join(", "))
    }
}

/// 节点与路径共用的线条、颜色与透明度选项。
fn line_options(style: StyleRef<'_>, options: &mut Vec<String>) {
    match style.pen_style() {
        PenStyle::Solid => {}
        pen => options.push(pen.tikz_name().to_string()),
    }
    if style.pen_style() != PenStyle::NoPen && style.pen_color() != Color::BLACK {
        options.push(format!("draw={}", color(style.pen_color())));
    }
    let defaults = StyleProperties::defaults();
    push_length(options, "line width", style.line_width(), defaults.line_width);
    if style.double_line() {
        options.push(format!("double={}", color(style.inner_line_color())));
        options.push(format!("double distance={}", style.inner_line_width()));
    }
    if style.fill_color().a > 0 {
        options.push(format!("fill={}", color(style.fill_color())));
    }
    if style.pen_opacity() != 1.0 {
        options.push(format!("draw opacity={}", number(style.pen_opacity())));
    }
    if style.fill_opacity() != 1.0 {
        options.push(format!("fill opacity={}", number(style.fill_opacity())));
    }
    if style.rotation() != 0.0 {
        options.push(format!("rotate={}", number(style.rotation())));
    }
}

fn push_length(options: &mut Vec<String>, key: &str, value: Value, default: Option<Value>) {
    if Some(value) != default {
        options.push(format!("{key}={value}"));
    }
}

fn arrow_spec(tail: Arrow, head: Arrow) -> String {
    if tail == Arrow::NoArrow && head == Arrow::NoArrow {
        return String::new();
    }
    let tip = |arrow: Arrow| match arrow {
        Arrow::NoArrow => String::new(),
        arrow => format!("{{{}}}", arrow.tikz_name()),
    };
    format!("{}-{}", tip(tail), tip(head))
}

fn coordinate(pos: &MetaPos) -> String {
    match (pos.node(), pos.anchor()) {
        (Some(node), Anchor::NoAnchor) => format!("(n{node})"),
        (Some(node), anchor) => format!("(n{node}.{})", anchor.tikz_name()),
        (None, _) => format!("({}, {})", number(pos.pos().x()), number(pos.pos().y())),
    }
}

fn color(color: Color) -> String {
    format!(
        "{{rgb,255:red,{};green,{};blue,{}}}",
        color.r, color.g, color.b
    )
}

fn option_list(options: &[String]) -> String {
    if options.is_empty() {
        String::new()
    } else {
        format!("[{}]", options.join(", "))
    }
}

fn number(value: f64) -> String {
    let rounded = (value * 1e4).round() / 1e4;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}
