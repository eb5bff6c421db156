use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Serializer};

use crate::errors::ParseError;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// 进程内唯一的文档标识，每个实体仓库构造时分配一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// 文档内的实体标识。`0` 为文档本身，`1` 为文档默认样式，其余从 `2` 开始递增分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid {
    id: i64,
    document: Option<DocumentId>,
}

impl Uid {
    pub const DOCUMENT_ID: i64 = 0;
    pub const STYLE_ID: i64 = 1;
    pub const FIRST_ENTITY_ID: i64 = 2;

    #[inline]
    pub fn new(id: i64, document: DocumentId) -> Self {
        Self {
            id,
            document: Some(document),
        }
    }

    /// 无效 Uid，与任何有效 Uid 都不相等。
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            id: -1,
            document: None,
        }
    }

    #[inline]
    pub fn id(self) -> i64 {
        self.id
    }

    #[inline]
    pub fn document(self) -> Option<DocumentId> {
        self.document
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.id >= 0 && self.document.is_some()
    }

    #[inline]
    pub fn belongs_to(self, document: DocumentId) -> bool {
        self.document == Some(document)
    }

    #[inline]
    pub fn is_document(self) -> bool {
        self.is_valid() && self.id == Self::DOCUMENT_ID
    }

    #[inline]
    pub fn is_document_style(self) -> bool {
        self.is_valid() && self.id == Self::STYLE_ID
    }

    /// 解析日志中的十进制 id 字符串，并绑定到给定文档。
    pub fn parse(text: &str, document: DocumentId) -> Result<Self, ParseError> {
        let id: i64 = text
            .trim()
            .parse()
            .map_err(|_| ParseError::Uid(text.to_string()))?;
        if id < 0 {
            return Err(ParseError::Uid(text.to_string()));
        }
        Ok(Self::new(id, document))
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_uid_differs_from_valid_ones() {
        let doc = DocumentId::next();
        let invalid = Uid::default();
        assert!(!invalid.is_valid());
        assert_ne!(invalid, Uid::new(0, doc));
        assert!(Uid::new(0, doc).is_document());
        assert!(Uid::new(1, doc).is_document_style());
    }

    #[test]
    fn uids_of_different_documents_are_distinct() {
        let first = DocumentId::next();
        let second = DocumentId::next();
        assert_ne!(first, second);
        assert_ne!(Uid::new(5, first), Uid::new(5, second));
        assert!(Uid::new(5, first).belongs_to(first));
        assert!(!Uid::new(5, first).belongs_to(second));
    }

    #[test]
    fn parse_accepts_decimal_ids_only() {
        let doc = DocumentId::next();
        assert_eq!(Uid::parse("42", doc).unwrap(), Uid::new(42, doc));
        assert!(Uid::parse("-3", doc).is_err());
        assert!(Uid::parse("abc", doc).is_err());
        assert_eq!(Uid::new(7, doc).to_string(), "7");
    }
}
