pub mod config;
pub mod entity;
pub mod errors;
pub mod store;
pub mod style;
pub mod tikz;
pub mod uid;

pub mod geometry {
    use std::fmt;
    use std::ops::{Add, Mul, Sub};
    use std::str::FromStr;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    use crate::errors::ParseError;

    /// 场景坐标（单位：厘米，与 TikZ 默认单位一致），内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Pos(pub DVec2);

    impl Pos {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn offset(self, dx: f64, dy: f64) -> Self {
            Self(self.0 + DVec2::new(dx, dy))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Pos {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 长度单位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum Unit {
        #[default]
        #[serde(rename = "pt")]
        Point,
        #[serde(rename = "mm")]
        Millimeter,
        #[serde(rename = "cm")]
        Centimeter,
        #[serde(rename = "in")]
        Inch,
    }

    // UNIT_FACTORS[from][to]
    const UNIT_FACTORS: [[f64; 4]; 4] = [
        [1.0, 2540.0 / 7227.0, 254.0 / 7227.0, 100.0 / 7227.0],
        [7227.0 / 2540.0, 1.0, 0.1, 5.0 / 127.0],
        [7227.0 / 254.0, 10.0, 1.0, 50.0 / 127.0],
        [7227.0 / 100.0, 127.0 / 5.0, 127.0 / 50.0, 1.0],
    ];

    impl Unit {
        #[inline]
        fn index(self) -> usize {
            match self {
                Unit::Point => 0,
                Unit::Millimeter => 1,
                Unit::Centimeter => 2,
                Unit::Inch => 3,
            }
        }

        pub fn suffix(self) -> &'static str {
            match self {
                Unit::Point => "pt",
                Unit::Millimeter => "mm",
                Unit::Centimeter => "cm",
                Unit::Inch => "in",
            }
        }

        pub fn from_suffix(suffix: &str) -> Option<Self> {
            match suffix {
                "pt" => Some(Unit::Point),
                "mm" => Some(Unit::Millimeter),
                "cm" => Some(Unit::Centimeter),
                "in" => Some(Unit::Inch),
                _ => None,
            }
        }

        /// `value` 从 `self` 换算到 `target` 的系数。
        #[inline]
        pub fn factor_to(self, target: Unit) -> f64 {
            UNIT_FACTORS[self.index()][target.index()]
        }
    }

    impl FromStr for Unit {
        type Err = ParseError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Unit::from_suffix(s.trim()).ok_or_else(|| ParseError::Unit(s.to_string()))
        }
    }

    /// 带单位的长度值，例如线宽 `0.6pt`。比较时先换算到同一单位再做模糊比较。
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    #[serde(into = "String", try_from = "String")]
    pub struct Value {
        value: f64,
        unit: Unit,
    }

    impl Value {
        #[inline]
        pub const fn new(value: f64, unit: Unit) -> Self {
            Self { value, unit }
        }

        #[inline]
        pub const fn pt(value: f64) -> Self {
            Self::new(value, Unit::Point)
        }

        #[inline]
        pub const fn zero() -> Self {
            Self::pt(0.0)
        }

        pub const fn ultra_thin() -> Self {
            Self::pt(0.1)
        }

        pub const fn very_thin() -> Self {
            Self::pt(0.2)
        }

        pub const fn thin() -> Self {
            Self::pt(0.4)
        }

        /// TikZ 默认线宽。
        pub const fn semi_thick() -> Self {
            Self::pt(0.6)
        }

        pub const fn thick() -> Self {
            Self::pt(0.8)
        }

        pub const fn very_thick() -> Self {
            Self::pt(1.2)
        }

        pub const fn ultra_thick() -> Self {
            Self::pt(1.6)
        }

        #[inline]
        pub fn value(self) -> f64 {
            self.value
        }

        #[inline]
        pub fn unit(self) -> Unit {
            self.unit
        }

        #[inline]
        pub fn is_valid(self) -> bool {
            self.value.is_finite()
        }

        pub fn convert_to(self, unit: Unit) -> Self {
            Self::new(self.value * self.unit.factor_to(unit), unit)
        }

        #[inline]
        pub fn to_point(self) -> f64 {
            self.convert_to(Unit::Point).value
        }
    }

    impl Default for Value {
        fn default() -> Self {
            Self::zero()
        }
    }

    impl PartialEq for Value {
        fn eq(&self, other: &Self) -> bool {
            let lhs = self.value;
            let rhs = other.convert_to(self.unit).value;
            (lhs - rhs).abs() <= 1e-9 * lhs.abs().max(rhs.abs()).max(1.0)
        }
    }

    impl Add for Value {
        type Output = Value;

        fn add(self, rhs: Value) -> Value {
            Value::new(self.value + rhs.convert_to(self.unit).value, self.unit)
        }
    }

    impl Sub for Value {
        type Output = Value;

        fn sub(self, rhs: Value) -> Value {
            Value::new(self.value - rhs.convert_to(self.unit).value, self.unit)
        }
    }

    impl Mul<f64> for Value {
        type Output = Value;

        fn mul(self, factor: f64) -> Value {
            Value::new(self.value * factor, self.unit)
        }
    }

    impl Mul<Value> for f64 {
        type Output = Value;

        fn mul(self, value: Value) -> Value {
            value * self
        }
    }

    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}{}", self.value, self.unit.suffix())
        }
    }

    impl FromStr for Value {
        type Err = ParseError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let trimmed = s.trim();
            let split = trimmed
                .find(|c: char| c.is_ascii_alphabetic())
                .unwrap_or(trimmed.len());
            let (number, suffix) = trimmed.split_at(split);
            let value: f64 = number
                .trim()
                .parse()
                .map_err(|_| ParseError::Value(s.to_string()))?;
            let unit = if suffix.is_empty() {
                Unit::Point
            } else {
                Unit::from_suffix(suffix).ok_or_else(|| ParseError::Value(s.to_string()))?
            };
            Ok(Value::new(value, unit))
        }
    }

    impl From<Value> for String {
        fn from(value: Value) -> Self {
            value.to_string()
        }
    }

    impl TryFrom<String> for Value {
        type Error = ParseError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn value_equality_converts_units() {
            let one_cm = Value::new(1.0, Unit::Centimeter);
            let ten_mm = Value::new(10.0, Unit::Millimeter);
            assert_eq!(one_cm, ten_mm);
            assert!((Value::new(1.0, Unit::Inch).to_point() - 72.27).abs() < 1e-9);
            assert_ne!(Value::thin(), Value::thick());
        }

        #[test]
        fn value_parses_and_formats() {
            let parsed: Value = "1.5cm".parse().expect("parse cm value");
            assert_eq!(parsed.unit(), Unit::Centimeter);
            assert_eq!(parsed.to_string(), "1.5cm");

            let bare: Value = "0.6".parse().expect("bare number defaults to pt");
            assert_eq!(bare, Value::semi_thick());

            assert!("thick".parse::<Value>().is_err());
            assert!("3furlong".parse::<Value>().is_err());
        }

        #[test]
        fn value_arithmetic_keeps_lhs_unit() {
            let width = 2.0 * Value::semi_thick() + Value::new(0.1, Unit::Millimeter);
            assert_eq!(width.unit(), Unit::Point);
            assert!((width.value() - (1.2 + 0.1 * 7227.0 / 2540.0)).abs() < 1e-9);
        }
    }
}
