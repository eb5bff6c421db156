use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "TIKZKIT_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `TIKZKIT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let current = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&current)
    }

    /// 在 `root/config/default.toml` 查找配置，缺失时返回默认配置。
    pub fn discover_in(root: &Path) -> Result<Self, ConfigError> {
        let default_path = root.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 命令行前端的默认输出。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    #[default]
    Summary,
    Tikz,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    /// 新文档的首选单位：`pt`、`mm`、`cm` 或 `in`。
    #[serde(default = "DocumentConfig::default_unit")]
    pub preferred_unit: String,
}

impl DocumentConfig {
    fn default_unit() -> String {
        "cm".to_string()
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            preferred_unit: Self::default_unit(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryConfig {
    /// 命令行演示时回放的历史日志。
    #[serde(default)]
    pub sample_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = AppConfig::discover_in(dir.path()).expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Summary);
        assert_eq!(cfg.document.preferred_unit, "cm");
        assert!(cfg.history.sample_path.is_none());
    }

    #[test]
    fn discover_reads_config_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(dir.path().join("config")).expect("create config dir");
        fs::write(
            dir.path().join("config").join("default.toml"),
            "[frontend]\ndefault_mode = \"tikz\"\n",
        )
        .expect("write config");

        let cfg = AppConfig::discover_in(dir.path()).expect("discover should succeed");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Tikz);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [frontend]
            default_mode = "tikz"

            [document]
            preferred_unit = "mm"

            [history]
            sample_path = "../samples/two_nodes.json"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Tikz);
        assert_eq!(cfg.document.preferred_unit, "mm");
        assert_eq!(
            cfg.history
                .sample_path
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("../samples/two_nodes.json".to_string())
        );
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[frontend]\ndefault_mode = \"bevy\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
