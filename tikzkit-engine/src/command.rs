use std::collections::HashMap;

use tikzkit_core::geometry::Pos;
use tikzkit_core::tikz::PathKind;
use tikzkit_core::uid::Uid;

use crate::document::Document;
use crate::errors::EngineError;
use crate::undo::items::{require_existing, require_node};

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<Result<String, EngineError>> for CommandResponse {
    fn from(result: Result<String, EngineError>) -> Self {
        match result {
            Ok(message) => CommandResponse::ok(message),
            Err(err) => CommandResponse::err(format!("命令执行失败: {err}")),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub document: &'a mut Document,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(UndoCommand);
        bus.register(RedoCommand);
        bus.register(CreateNodeCommand);
        bus.register(MoveNodeCommand);
        bus.register(SetTextCommand);
        bus.register(ConnectCommand);
        bus.register(DeleteCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn arg<'a>(request: &'a CommandRequest, index: usize) -> Result<&'a str, EngineError> {
    request
        .args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| EngineError::InvalidArgument(format!("缺少第 {} 个参数", index + 1)))
}

fn number_arg(request: &CommandRequest, index: usize) -> Result<f64, EngineError> {
    let text = arg(request, index)?;
    text.parse()
        .map_err(|_| EngineError::InvalidArgument(format!("无法解析数值: {text}")))
}

fn uid_arg(
    request: &CommandRequest,
    index: usize,
    document: &Document,
) -> Result<Uid, EngineError> {
    Ok(Uid::parse(arg(request, index)?, document.document_id())?)
}

struct UndoCommand;

impl CommandHandler for UndoCommand {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let text = context
            .document
            .undo_groups()
            .last()
            .map(|group| group.text().to_string());
        match text {
            Some(text) if context.document.undo() => CommandResponse::ok(format!("已撤销: {text}")),
            _ => CommandResponse::err("没有可撤销的操作"),
        }
    }
}

struct RedoCommand;

impl CommandHandler for RedoCommand {
    fn name(&self) -> &'static str {
        "redo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let text = context
            .document
            .redo_groups()
            .last()
            .map(|group| group.text().to_string());
        match text {
            Some(text) if context.document.redo() => CommandResponse::ok(format!("已重做: {text}")),
            _ => CommandResponse::err("没有可重做的操作"),
        }
    }
}

/// `create_node x y [text...]`
struct CreateNodeCommand;

impl CommandHandler for CreateNodeCommand {
    fn name(&self) -> &'static str {
        "create_node"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        create_node(request, context.document).into()
    }
}

fn create_node(request: &CommandRequest, document: &mut Document) -> Result<String, EngineError> {
    let pos = Pos::new(number_arg(request, 0)?, number_arg(request, 1)?);
    let text = request.args.get(2..).unwrap_or_default().join(" ");
    let mut transaction = document.transaction("创建节点");
    let uid = transaction.create_node();
    transaction.set_node_pos(uid, pos);
    transaction.set_node_text(uid, text);
    Ok(format!("已创建节点 {uid}"))
}

/// `move_node uid x y`
struct MoveNodeCommand;

impl CommandHandler for MoveNodeCommand {
    fn name(&self) -> &'static str {
        "move_node"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        move_node(request, context.document).into()
    }
}

fn move_node(request: &CommandRequest, document: &mut Document) -> Result<String, EngineError> {
    let uid = uid_arg(request, 0, document)?;
    require_node(document.store(), uid)?;
    let pos = Pos::new(number_arg(request, 1)?, number_arg(request, 2)?);
    document.set_node_pos(uid, pos);
    Ok(format!("节点 {uid} 已移动到 ({}, {})", pos.x(), pos.y()))
}

/// `set_text uid text...`
struct SetTextCommand;

impl CommandHandler for SetTextCommand {
    fn name(&self) -> &'static str {
        "set_text"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        set_text(request, context.document).into()
    }
}

fn set_text(request: &CommandRequest, document: &mut Document) -> Result<String, EngineError> {
    let uid = uid_arg(request, 0, document)?;
    require_node(document.store(), uid)?;
    let text = request.args.get(1..).unwrap_or_default().join(" ");
    document.set_node_text(uid, text);
    Ok(format!("节点 {uid} 文本已更新"))
}

/// `connect from to`
struct ConnectCommand;

impl CommandHandler for ConnectCommand {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        connect(request, context.document).into()
    }
}

fn connect(request: &CommandRequest, document: &mut Document) -> Result<String, EngineError> {
    let start = uid_arg(request, 0, document)?;
    let end = uid_arg(request, 1, document)?;
    require_node(document.store(), start)?;
    require_node(document.store(), end)?;
    let path = document.connect_nodes(start, end, PathKind::Line);
    Ok(format!("已创建连线 {path}: {start} -> {end}"))
}

/// `delete uid`
struct DeleteCommand;

impl CommandHandler for DeleteCommand {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        delete(request, context.document).into()
    }
}

fn delete(request: &CommandRequest, document: &mut Document) -> Result<String, EngineError> {
    let uid = uid_arg(request, 0, document)?;
    if uid.id() < Uid::FIRST_ENTITY_ID {
        return Err(EngineError::ReservedId(uid));
    }
    let kind = require_existing(document.store(), uid)?;
    document.delete_entity(uid);
    Ok(format!("已删除实体 {uid}（{kind}）"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::populate_demo;

    fn run(bus: &CommandBus, document: &mut Document, name: &str, args: &[&str]) -> CommandResponse {
        let mut context = CommandContext { document };
        bus.dispatch(&CommandRequest::new(name, args.iter().copied()), &mut context)
    }

    #[test]
    fn node_commands_edit_the_document() {
        let bus = CommandBus::new();
        let mut document = Document::new();

        let response = run(&bus, &mut document, "create_node", &["1", "2", "hello", "world"]);
        assert!(response.success, "{:?}", response.message);
        let uid = document.nodes().next().unwrap().uid();
        assert_eq!(document.node(uid).unwrap().text(), "hello world");

        let id = uid.id().to_string();
        assert!(run(&bus, &mut document, "move_node", &[&id, "4", "5"]).success);
        assert_eq!(
            document.node(uid).unwrap().meta_pos().pos(),
            Pos::new(4.0, 5.0)
        );

        assert!(run(&bus, &mut document, "undo", &[]).success);
        assert_eq!(
            document.node(uid).unwrap().meta_pos().pos(),
            Pos::new(1.0, 2.0)
        );
        assert!(run(&bus, &mut document, "redo", &[]).success);
        assert!(!run(&bus, &mut document, "redo", &[]).success);
    }

    #[test]
    fn connect_and_delete_commands() {
        let bus = CommandBus::new();
        let mut document = Document::new();
        let ids = populate_demo(&mut document);
        let (start, end) = (ids.start.id().to_string(), ids.end.id().to_string());

        assert!(run(&bus, &mut document, "connect", &[&start, &end]).success);
        assert_eq!(document.paths().count(), 3);

        assert!(run(&bus, &mut document, "delete", &[&start]).success);
        assert!(document.node(ids.start).is_none());
        assert!(document.paths().all(|path| !path.references(ids.start)));
    }

    #[test]
    fn invalid_arguments_are_reported() {
        let bus = CommandBus::new();
        let mut document = Document::new();

        let response = run(&bus, &mut document, "move_node", &["42", "0", "0"]);
        assert!(!response.success);
        assert!(response.message.unwrap().contains("not found"));

        assert!(!run(&bus, &mut document, "create_node", &["x", "0"]).success);
        assert!(!run(&bus, &mut document, "delete", &["1"]).success);
        assert!(!run(&bus, &mut document, "undo", &[]).success);
        assert!(!run(&bus, &mut document, "frobnicate", &[]).success);
    }
}
