use std::env;
use std::path::{Path, PathBuf};

use tikzkit_config::AppConfig;
use tikzkit_core::geometry::Unit;
use tikzkit_engine::Document;
use tikzkit_engine::demo::{DemoEntities, populate_demo};
use tikzkit_io::{DocumentLoader, JsonHistoryFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 指定演示用历史日志的环境变量，优先于配置中的 `history.sample_path`。
pub const SAMPLE_ENV: &str = "TIKZKIT_CLI_SAMPLE";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone)]
pub enum DocumentSource {
    History(PathBuf),
    Demo,
}

/// 统一封装加载后的文档与元信息。
pub struct LoadedDocument {
    pub document: Document,
    pub source: DocumentSource,
    pub demo_entities: Option<DemoEntities>,
}

/// 加载显式指定的历史日志；失败时返回错误。
pub fn open_document(path: &Path) -> Result<LoadedDocument, FrontendError> {
    let document = JsonHistoryFacade::new()
        .load(path)
        .map_err(|source| FrontendError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(LoadedDocument {
        document,
        source: DocumentSource::History(path.to_path_buf()),
        demo_entities: None,
    })
}

/// 依次尝试环境变量 `TIKZKIT_CLI_SAMPLE` 与配置中的示例日志，
/// 都不可用时回退到内置示例。
pub fn load_sample_or_demo(config: &AppConfig) -> LoadedDocument {
    let candidates = env::var_os(SAMPLE_ENV)
        .map(PathBuf::from)
        .into_iter()
        .chain(config.history.sample_path.clone());
    for path in candidates {
        match open_document(&path) {
            Ok(loaded) => {
                info!(path = %path.display(), "从历史日志加载文档成功");
                return loaded;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载历史日志失败，尝试下一个来源");
            }
        }
    }
    build_demo(config)
}

/// 构建内置示例文档，首选单位取自配置。
pub fn build_demo(config: &AppConfig) -> LoadedDocument {
    let mut document = Document::new();
    document.set_preferred_unit(preferred_unit(config));
    let demo_entities = populate_demo(&mut document);
    LoadedDocument {
        document,
        source: DocumentSource::Demo,
        demo_entities: Some(demo_entities),
    }
}

pub fn preferred_unit(config: &AppConfig) -> Unit {
    let text = &config.document.preferred_unit;
    match text.parse() {
        Ok(unit) => unit,
        Err(err) => {
            warn!(unit = %text, error = %err, "无法识别的首选单位，使用厘米");
            Unit::Centimeter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_uses_configured_unit() {
        let mut config = AppConfig::default();
        config.document.preferred_unit = "mm".to_string();
        let loaded = build_demo(&config);
        assert_eq!(loaded.document.preferred_unit(), Unit::Millimeter);
        assert!(loaded.demo_entities.is_some());
        assert!(matches!(loaded.source, DocumentSource::Demo));
    }

    #[test]
    fn unknown_unit_falls_back_to_centimeter() {
        let mut config = AppConfig::default();
        config.document.preferred_unit = "furlong".to_string();
        assert_eq!(preferred_unit(&config), Unit::Centimeter);
    }

    #[test]
    fn opening_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = open_document(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(FrontendError::Open { .. })));
    }
}
