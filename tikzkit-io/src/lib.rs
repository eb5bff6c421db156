pub mod payload;
pub mod tikz;

use std::fs;
use std::path::Path;

use thiserror::Error;
use tikzkit_core::errors::ParseError;
use tikzkit_engine::Document;
use tikzkit_engine::errors::EngineError;
use tracing::{debug, info, warn};

use crate::payload::{HistoryLog, ItemPayload, TransactionEntry};

pub use tikz::TikzExporter;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed history log: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value in history log: {0}")]
    Value(#[from] ParseError),
    #[error("history entry {entry} ({text}) cannot be replayed: {source}")]
    Replay {
        entry: usize,
        text: String,
        #[source]
        source: EngineError,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

/// 保存成功后文档被标记为未修改，并记住保存路径。
pub trait DocumentSaver {
    fn save(&self, document: &mut Document, path: &Path) -> Result<(), IoError>;
}

/// 以撤销历史的形式读写文档：文件里只记录每个事务的撤销项，
/// 载入时按顺序回放得到实体状态。重做栈不保存。
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHistoryFacade;

impl JsonHistoryFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn to_log(&self, document: &Document) -> HistoryLog {
        let history = document
            .undo_groups()
            .iter()
            .map(|group| TransactionEntry {
                text: group.text().to_string(),
                items: group.items().iter().map(ItemPayload::from_item).collect(),
            })
            .collect();
        HistoryLog {
            history,
            preferred_unit: Some(document.preferred_unit()),
        }
    }

    pub fn to_json(&self, document: &Document) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(&self.to_log(document))?)
    }

    pub fn load_str(&self, json: &str) -> Result<Document, IoError> {
        let mut document = Document::new();
        self.load_into(&mut document, json)?;
        Ok(document)
    }

    /// 清空 `document` 后载入日志。失败时文档保持清空后的未修改状态。
    pub fn load_into(&self, document: &mut Document, json: &str) -> Result<(), IoError> {
        document.clear();
        let log: HistoryLog = serde_json::from_str(json)?;
        self.replay(document, log)
    }

    /// 在空文档上按顺序回放日志中的事务。
    pub fn replay(&self, document: &mut Document, log: HistoryLog) -> Result<(), IoError> {
        for (index, entry) in log.history.into_iter().enumerate() {
            if let Err(err) = replay_entry(document, entry) {
                let err = match err {
                    ReplayError::Io(err) => err,
                    ReplayError::Engine { text, source } => IoError::Replay {
                        entry: index,
                        text,
                        source,
                    },
                };
                warn!(entry = index, error = %err, "历史日志回放失败，文档已清空");
                document.clear();
                return Err(err);
            }
        }

        if let Some(unit) = log.preferred_unit {
            document.set_preferred_unit(unit);
        }
        document.set_clean();
        debug!(
            groups = document.undo_groups().len(),
            entities = document.store().len(),
            next_id = document.store().next_id(),
            "历史日志回放完成"
        );
        Ok(())
    }
}

enum ReplayError {
    Io(IoError),
    Engine { text: String, source: EngineError },
}

fn replay_entry(document: &mut Document, entry: TransactionEntry) -> Result<(), ReplayError> {
    let TransactionEntry { text, items } = entry;
    document.begin_transaction(&text);
    for payload in items {
        let applied = payload
            .into_item(document.document_id())
            .map_err(ReplayError::Io)
            .and_then(|item| {
                document
                    .try_add_undo_item(item)
                    .map_err(|source| ReplayError::Engine {
                        text: text.clone(),
                        source,
                    })
            });
        if let Err(err) = applied {
            document.cancel_transaction();
            return Err(err);
        }
    }
    document.finish_transaction();
    Ok(())
}

impl DocumentLoader for JsonHistoryFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = self.load_str(&data)?;
        document.set_path(Some(path.to_path_buf()));
        info!(
            path = %path.display(),
            entities = document.store().len(),
            "已载入文档"
        );
        Ok(document)
    }
}

impl DocumentSaver for JsonHistoryFacade {
    fn save(&self, document: &mut Document, path: &Path) -> Result<(), IoError> {
        let json = self.to_json(document)?;
        fs::write(path, json).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        document.set_path(Some(path.to_path_buf()));
        document.set_clean();
        info!(
            path = %path.display(),
            groups = document.undo_groups().len(),
            "已保存文档"
        );
        Ok(())
    }
}

/// 当前实体状态的 JSON 视图，便于调试与对比。
pub fn state_to_json(document: &Document) -> Result<String, IoError> {
    Ok(serde_json::to_string_pretty(&document.state())?)
}
