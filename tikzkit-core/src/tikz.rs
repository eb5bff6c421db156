//! TikZ 选项关键字：线型、形状、箭头、锚点、路径类型以及颜色。
//!
//! 每个枚举都有两种文本形式：`keyword()` 用于 JSON 日志，`tikz_name()` 用于导出 TikZ 代码。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $key:literal, $tikz:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $key)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn keyword(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            pub fn tikz_name(self) -> &'static str {
                match self {
                    $($name::$variant => $tikz),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.keyword() == needle)
                    .ok_or_else(|| ParseError::Keyword {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.keyword())
            }
        }
    };
}

keyword_enum! {
    /// 线型（TikZ dash pattern）。
    PenStyle, "pen style" {
        NoPen => "none", "draw=none",
        #[default]
        Solid => "solid", "solid",
        Dotted => "dotted", "dotted",
        DenselyDotted => "densely-dotted", "densely dotted",
        LooselyDotted => "loosely-dotted", "loosely dotted",
        Dashed => "dashed", "dashed",
        DenselyDashed => "densely-dashed", "densely dashed",
        LooselyDashed => "loosely-dashed", "loosely dashed",
        DashDotted => "dash-dotted", "dash dot",
        DenselyDashDotted => "densely-dash-dotted", "densely dash dot",
        LooselyDashDotted => "loosely-dash-dotted", "loosely dash dot",
        DashDotDotted => "dash-dot-dotted", "dash dot dot",
        DenselyDashDotDotted => "densely-dash-dot-dotted", "densely dash dot dot",
        LooselyDashDotDotted => "loosely-dash-dot-dotted", "loosely dash dot dot",
    }
}

keyword_enum! {
    /// 节点形状。
    Shape, "shape" {
        NoShape => "none", "",
        #[default]
        Rectangle => "rectangle", "rectangle",
        Circle => "circle", "circle",
        Ellipse => "ellipse", "ellipse",
    }
}

keyword_enum! {
    TextAlignment, "text alignment" {
        NoAlign => "none", "",
        Left => "left", "left",
        #[default]
        Center => "center", "center",
        Right => "right", "right",
        Justify => "justify", "justify",
    }
}

keyword_enum! {
    /// 箭头样式，`tikz_name()` 为 `-{...}` 语法中的箭头名。
    Arrow, "arrow" {
        #[default]
        NoArrow => "none", "",
        To => "to", "to",
        ReversedTo => "reversed-to", "to reversed",
        Stealth => "stealth", "stealth",
        ReversedStealth => "reversed-stealth", "stealth reversed",
        Latex => "latex", "latex",
        ReversedLatex => "reversed-latex", "latex reversed",
        Pipe => "pipe", "|",
        StealthTick => "stealth-tick", "stealth'",
        ReversedStealthTick => "reversed-stealth-tick", "stealth' reversed",
    }
}

keyword_enum! {
    /// 节点锚点。`NoAnchor` 表示直接使用节点位置。
    Anchor, "anchor" {
        #[default]
        NoAnchor => "none", "",
        Center => "center", "center",
        North => "north", "north",
        NorthEast => "north-east", "north east",
        East => "east", "east",
        SouthEast => "south-east", "south east",
        South => "south", "south",
        SouthWest => "south-west", "south west",
        West => "west", "west",
        NorthWest => "north-west", "north west",
    }
}

keyword_enum! {
    /// 路径类型；除 `Ellipse` 外都是起点/终点两端的连线。
    PathKind, "path kind" {
        #[default]
        Line => "line", "--",
        HvLine => "hv-line", "-|",
        VhLine => "vh-line", "|-",
        BendCurve => "bend-curve", "to",
        InOutCurve => "in-out-curve", "to",
        BezierCurve => "bezier-curve", "to",
        Ellipse => "ellipse", "ellipse",
    }
}

impl PathKind {
    #[inline]
    pub fn is_ellipse(self) -> bool {
        matches!(self, PathKind::Ellipse)
    }
}

/// RGBA 颜色，文本形式为 `#rrggbb` 或 `#rrggbbaa`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        self.a == 255
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if !self.is_opaque() {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::Color(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |index: usize| {
            u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).map_err(|_| invalid())
        };
        let alpha = if hex.len() == 8 { channel(3)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(1)?, channel(2)?, alpha))
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
