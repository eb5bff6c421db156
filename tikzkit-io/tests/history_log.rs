mod golden;

use std::path::PathBuf;

use golden::assert_golden;
use tikzkit_core::geometry::{Pos, Unit};
use tikzkit_core::tikz::PathKind;
use tikzkit_engine::Document;
use tikzkit_engine::demo::populate_demo;
use tikzkit_engine::errors::EngineError;
use tikzkit_io::{DocumentLoader, DocumentSaver, IoError, JsonHistoryFacade};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

/// 不同文档的 uid 不相等，比较状态时经由 JSON 去掉文档归属。
fn state_json(document: &Document) -> serde_json::Value {
    serde_json::to_value(document.state()).expect("序列化文档状态失败")
}

#[test]
fn load_two_nodes_matches_expected_document() {
    let loader = JsonHistoryFacade::new();
    let document = loader.load(&fixture("two_nodes.json")).expect("读取历史日志失败");
    assert_golden("two_nodes", &document);

    assert_eq!(document.undo_groups().len(), 6);
    assert!(!document.is_modified());
    assert_eq!(document.preferred_unit(), Unit::Millimeter);
    assert_eq!(document.path(), Some(fixture("two_nodes.json").as_path()));
    assert_eq!(document.name(), "two_nodes.json");
}

#[test]
fn loaded_history_can_be_undone() {
    let loader = JsonHistoryFacade::new();
    let mut document = loader.load(&fixture("two_nodes.json")).expect("读取历史日志失败");

    assert!(document.undo());
    assert!(document.is_modified());
    let restored = document
        .nodes()
        .find(|node| node.text() == "$b$")
        .expect("撤销删除后节点应恢复");
    assert_eq!(restored.meta_pos().pos(), Pos::new(3.0, 1.0));

    while document.undo() {}
    assert!(document.store().is_empty());
}

#[test]
fn new_uids_follow_the_loaded_history() {
    let loader = JsonHistoryFacade::new();
    let mut document = loader.load(&fixture("two_nodes.json")).expect("读取历史日志失败");
    let max_loaded = document
        .store()
        .entities()
        .map(|entity| entity.uid().id())
        .max()
        .unwrap_or_default();

    let node = document.create_node();
    assert!(node.id() > max_loaded);
    // 已删除的 4 号节点同样不会被复用。
    assert_eq!(node.id(), 7);
}

#[test]
fn save_then_load_reproduces_state() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("demo.json");
    let facade = JsonHistoryFacade::new();

    let mut document = Document::new();
    populate_demo(&mut document);
    document.set_preferred_unit(Unit::Inch);
    assert!(document.is_modified());

    facade.save(&mut document, &path).expect("保存失败");
    assert!(!document.is_modified());
    assert_eq!(document.path(), Some(path.as_path()));

    let loaded = facade.load(&path).expect("读取保存的日志失败");
    assert_eq!(state_json(&loaded), state_json(&document));
    assert_eq!(facade.to_log(&loaded), facade.to_log(&document));
    assert_eq!(loaded.preferred_unit(), Unit::Inch);
    assert_eq!(
        loaded.store().next_id(),
        document.store().next_id(),
        "回放后的 uid 计数应与原文档一致"
    );
}

#[test]
fn redo_stack_is_not_persisted() {
    let facade = JsonHistoryFacade::new();
    let mut document = Document::new();
    document.create_node();
    let path = document.create_path(PathKind::Line);
    document.undo();
    assert!(document.redo_available());
    assert!(document.path_entity(path).is_none());

    let json = facade.to_json(&document).expect("序列化失败");
    let loaded = facade.load_str(&json).expect("回放失败");
    assert!(!loaded.redo_available());
    assert_eq!(loaded.undo_groups().len(), 1);
    assert_eq!(state_json(&loaded), state_json(&document));
}

#[test]
fn dangling_reference_aborts_load() {
    let json = r#"{
        "history": [
            { "text": "创建节点", "items": [ { "type": "create-entity", "uid": "2", "kind": "node" } ] },
            { "text": "移动节点", "items": [
                { "type": "node-set-pos", "uid": "2", "pos": { "pos": [1.0, 1.0] } },
                { "type": "node-set-text", "uid": "9", "text": "missing" }
            ] }
        ]
    }"#;
    let mut document = Document::new();
    populate_demo(&mut document);

    let err = JsonHistoryFacade::new()
        .load_into(&mut document, json)
        .expect_err("引用不存在的实体应当失败");
    assert!(matches!(err, IoError::Replay { entry: 1, .. }), "{err}");
    assert!(document.is_empty_buffer());
    assert!(!document.transaction_active());
}

fn replay_error(json: &str) -> EngineError {
    match JsonHistoryFacade::new().load_str(json) {
        Err(IoError::Replay { entry: 0, source, .. }) => source,
        Err(err) => panic!("预期回放错误，得到 {err}"),
        Ok(_) => panic!("非法日志不应载入成功"),
    }
}

#[test]
fn parent_style_on_document_is_rejected() {
    let err = replay_error(
        r#"{ "history": [ { "text": "x", "items": [ { "type": "set-parent-style", "uid": "0", "parent": null } ] } ] }"#,
    );
    assert!(matches!(err, EngineError::UnexpectedEntityType { .. }), "{err}");
}

#[test]
fn largest_uid_cannot_be_created() {
    let err = replay_error(
        r#"{ "history": [ { "text": "x", "items": [ { "type": "create-entity", "uid": "9223372036854775807", "kind": "node" } ] } ] }"#,
    );
    assert!(matches!(err, EngineError::ReservedId(_)), "{err}");
}

#[test]
fn bare_delete_of_referenced_entity_is_rejected() {
    let json = r#"{
        "history": [
            { "text": "创建", "items": [
                { "type": "create-entity", "uid": "2", "kind": "style" },
                { "type": "create-entity", "uid": "3", "kind": "node" },
                { "type": "set-parent-style", "uid": "3", "parent": "2" }
            ] },
            { "text": "删除样式", "items": [ { "type": "delete-entity", "uid": "2" } ] }
        ]
    }"#;
    let mut document = Document::new();
    let err = JsonHistoryFacade::new()
        .load_into(&mut document, json)
        .expect_err("子样式仍挂在被删样式上时应当失败");
    assert!(
        matches!(
            err,
            IoError::Replay {
                entry: 1,
                source: EngineError::EntityInUse { .. },
                ..
            }
        ),
        "{err}"
    );
    assert!(document.is_empty_buffer());
}

#[test]
fn malformed_json_is_rejected() {
    let facade = JsonHistoryFacade::new();
    assert!(matches!(facade.load_str("{ \"history\": 3 }"), Err(IoError::Json(_))));
    assert!(matches!(
        facade.load_str(r#"{ "history": [ { "text": "x", "items": [ { "type": "explode" } ] } ] }"#),
        Err(IoError::Json(_))
    ));
    assert!(matches!(
        facade.load_str(r#"{ "history": [ { "text": "x", "items": [ { "type": "delete-entity", "uid": "-4" } ] } ] }"#),
        Err(IoError::Value(_))
    ));
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("absent.json");
    match JsonHistoryFacade::new().load(&path) {
        Err(IoError::ReadError { path: reported, .. }) => assert_eq!(reported, path),
        Err(err) => panic!("预期读取错误，得到 {err}"),
        Ok(_) => panic!("不存在的文件不应载入成功"),
    }
}
