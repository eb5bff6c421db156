use thiserror::Error;

/// 文本形式的值（单位、长度、颜色、枚举关键字、Uid）解析失败。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid unit: {0:?}")]
    Unit(String),
    #[error("invalid length value: {0:?}")]
    Value(String),
    #[error("invalid color: {0:?}")]
    Color(String),
    #[error("invalid uid: {0:?}")]
    Uid(String),
    #[error("unknown {kind} keyword: {value:?}")]
    Keyword { kind: &'static str, value: String },
}
