use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use tikzkit_config::{AppConfig, FrontendMode};
use tikzkit_core::entity::{Entity, MetaPos, PathEnd};
use tikzkit_core::tikz::Anchor;
use tikzkit_engine::Document;
use tikzkit_engine::command::{CommandBus, CommandContext, CommandRequest};
use tikzkit_io::{DocumentSaver, JsonHistoryFacade, TikzExporter};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, LoadedDocument, load_sample_or_demo, open_document};

/// 命令行参数解析后的选项。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// 覆盖配置中的默认输出。
    pub mode: Option<FrontendMode>,
    pub open: Option<PathBuf>,
    pub save: Option<PathBuf>,
    /// 按顺序执行的命令，例如 `move_node 3 1 2`。
    pub commands: Vec<String>,
}

/// 加载文档、执行命令、输出概览或 TikZ 代码，并按需保存历史日志。
pub fn run(
    config: &AppConfig,
    options: &CliOptions,
    out: &mut impl Write,
) -> Result<(), FrontendError> {
    let loaded = match &options.open {
        Some(path) => open_document(path)?,
        None => load_sample_or_demo(config),
    };
    let LoadedDocument {
        mut document,
        source,
        demo_entities,
    } = loaded;

    let bus = CommandBus::new();
    for line in &options.commands {
        let message = dispatch_cli_command(&bus, line, &mut document)?;
        writeln!(out, "[命令] {message}")?;
    }

    let mode = options.mode.unwrap_or(config.frontend.default_mode);
    match mode {
        FrontendMode::Summary => {
            match &source {
                DocumentSource::History(path) => {
                    writeln!(out, "已从历史日志加载文档：{}", path.display())?;
                }
                DocumentSource::Demo => {
                    if let Some(ids) = &demo_entities {
                        writeln!(out, "已构建内置示例：")?;
                        writeln!(out, "  - 样式 ID = {}", ids.style)?;
                        writeln!(out, "  - 起点节点 ID = {}", ids.start)?;
                        writeln!(out, "  - 终点节点 ID = {}", ids.end)?;
                        writeln!(out, "  - 连线 ID = {}", ids.edge)?;
                        writeln!(out, "  - 椭圆 ID = {}", ids.ellipse)?;
                    }
                }
            }
            let mut commands: Vec<&str> = bus.available_commands().copied().collect();
            commands.sort_unstable();
            writeln!(out, "支持的命令: {}", commands.join(", "))?;
            out.write_all(summary(&document).as_bytes())?;
        }
        FrontendMode::Tikz => {
            out.write_all(TikzExporter::new().export(&document).as_bytes())?;
        }
    }

    if let Some(path) = &options.save {
        JsonHistoryFacade::new()
            .save(&mut document, path)
            .map_err(|source| FrontendError::Save {
                path: path.clone(),
                source,
            })?;
        writeln!(out, "已保存历史日志：{}", path.display())?;
    }
    Ok(())
}

/// 文档概览：实体列表与撤销历史。
pub fn summary(document: &Document) -> String {
    let mut out = String::new();
    let store = document.store();
    let _ = writeln!(
        out,
        "文档 {}：{} 个实体，首选单位 {}，{}",
        document.name(),
        store.len(),
        document.preferred_unit().suffix(),
        if document.is_modified() { "已修改" } else { "未修改" }
    );
    info!(
        entities = store.len(),
        nodes = document.nodes().count(),
        paths = document.paths().count(),
        "CLI 文档统计"
    );

    let _ = writeln!(out, "实体：");
    for entity in store.entities() {
        let uid = entity.uid();
        let parent = entity
            .style()
            .parent_uid()
            .map(|uid| uid.to_string())
            .unwrap_or_else(|| "<无>".to_string());
        let keys = entity.style().properties().set_keys();
        let local = if keys.is_empty() {
            String::new()
        } else {
            format!(", 本地样式=[{}]", keys.join(", "))
        };
        match entity {
            Entity::Style(_) => {
                let _ = writeln!(out, "  - 样式 #{uid}, 父样式={parent}{local}");
            }
            Entity::Node(node) => {
                let pos = document.scene_pos(node.meta_pos());
                let _ = writeln!(
                    out,
                    "  - 节点 #{uid}, 位置=({:.2}, {:.2}), 文本={:?}, 父样式={parent}{local}",
                    pos.x(),
                    pos.y(),
                    node.text()
                );
            }
            Entity::Path(path) => {
                let ends: Vec<String> = path
                    .ends()
                    .iter()
                    .filter_map(|end| {
                        path.meta_pos(*end)
                            .map(|pos| format!("{}={}", end_label(*end), describe_pos(pos)))
                    })
                    .collect();
                let radii = path
                    .radii()
                    .map(|(rx, ry)| format!(", 半径={rx}/{ry}"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  - 路径 #{uid}, 类型={}, {}{radii}, 父样式={parent}{local}",
                    path.kind().keyword(),
                    ends.join(", ")
                );
            }
        }
    }

    let _ = writeln!(out, "撤销历史：");
    if document.undo_groups().is_empty() {
        let _ = writeln!(out, "  <空>");
    }
    for group in document.undo_groups() {
        let _ = writeln!(out, "  {}", group.describe());
    }
    if document.redo_available() {
        let _ = writeln!(out, "可重做 {} 步", document.redo_groups().len());
    }
    out
}

fn describe_pos(pos: &MetaPos) -> String {
    match pos.node() {
        Some(node) if pos.anchor() == Anchor::NoAnchor => format!("节点 {node}"),
        Some(node) => format!("节点 {node}.{}", pos.anchor().keyword()),
        None => format!("({:.2}, {:.2})", pos.pos().x(), pos.pos().y()),
    }
}

fn end_label(end: PathEnd) -> &'static str {
    match end {
        PathEnd::Start => "起点",
        PathEnd::End => "终点",
        PathEnd::Center => "中心",
    }
}

/// 执行一行形如 `name arg...` 的命令。
fn dispatch_cli_command(
    bus: &CommandBus,
    line: &str,
    document: &mut Document,
) -> Result<String, FrontendError> {
    let mut words = line.split_whitespace();
    let name = words.next().unwrap_or_default();
    let request = CommandRequest::new(name, words);
    let mut context = CommandContext { document };
    let response = bus.dispatch(&request, &mut context);
    let message = response.message.unwrap_or_default();
    if response.success {
        Ok(message)
    } else {
        warn!(command = line, %message, "CLI 命令执行失败");
        Err(FrontendError::Command {
            command: line.to_string(),
            message,
        })
    }
}
