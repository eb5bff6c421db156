use std::path::PathBuf;

use thiserror::Error;
use tikzkit_io::IoError;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("无法打开文档 {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("无法保存文档 {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("命令 `{command}` 执行失败: {message}")]
    Command { command: String, message: String },
    #[error("输出失败: {0}")]
    Output(#[from] std::io::Error),
}
