use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tikzkit_core::entity::{Entity, MetaPos, PathEnd};
use tikzkit_engine::Document;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GoldenDocument {
    preferred_unit: String,
    next_id: i64,
    entities: Vec<GoldenEntity>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenEntity {
    uid: i64,
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<i64>,
    #[serde(default)]
    style: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<GoldenNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<GoldenPath>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenNode {
    text: String,
    pos: GoldenPos,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenPath {
    kind: String,
    ends: Vec<GoldenEnd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radii: Option<[String; 2]>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenEnd {
    end: String,
    pos: GoldenPos,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenPos {
    xy: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anchor: Option<String>,
}

pub fn assert_golden(name: &str, document: &Document) {
    let snapshot = GoldenDocument::from_document(document);
    let base_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/golden");
    if let Err(err) = fs::create_dir_all(&base_dir) {
        panic!("无法创建黄金数据目录 {}: {err}", base_dir.display());
    }
    let golden_path = base_dir.join(format!("{name}.json"));
    let serialized = serde_json::to_string_pretty(&snapshot).expect("序列化黄金快照失败");

    if !golden_path.exists() {
        fs::write(&golden_path, &serialized)
            .unwrap_or_else(|err| panic!("写入黄金文件 {} 失败: {err}", golden_path.display()));
        panic!(
            "黄金文件 {} 不存在，已自动生成。请确认内容后重新运行测试。",
            golden_path.display()
        );
    }

    let expected_str = fs::read_to_string(&golden_path)
        .unwrap_or_else(|err| panic!("读取黄金文件 {} 失败: {err}", golden_path.display()));
    let expected: GoldenDocument = serde_json::from_str(&expected_str)
        .unwrap_or_else(|err| panic!("解析黄金文件 {} 失败: {err}", golden_path.display()));

    if expected != snapshot {
        let diff_path = base_dir.join(format!("{name}.actual.json"));
        fs::write(&diff_path, &serialized).expect("写入差异文件失败");
        panic!(
            "黄金文件 {} 与当前回放结果不一致。已生成对照输出 {}。",
            golden_path.display(),
            diff_path.display()
        );
    }
}

impl GoldenDocument {
    fn from_document(document: &Document) -> Self {
        let entities = document
            .store()
            .entities()
            .map(GoldenEntity::from_entity)
            .collect();
        Self {
            preferred_unit: document.preferred_unit().suffix().to_string(),
            next_id: document.store().next_id(),
            entities,
        }
    }
}

impl GoldenEntity {
    fn from_entity(entity: &Entity) -> Self {
        let style = entity.style();
        let mut golden = Self {
            uid: entity.uid().id(),
            kind: entity.entity_type().to_string(),
            parent: style.parent_uid().map(|uid| uid.id()),
            style: style
                .properties()
                .set_keys()
                .into_iter()
                .map(str::to_string)
                .collect(),
            node: None,
            path: None,
        };
        match entity {
            Entity::Style(_) => {}
            Entity::Node(node) => {
                golden.node = Some(GoldenNode {
                    text: node.text().to_string(),
                    pos: GoldenPos::from_meta_pos(node.meta_pos()),
                });
            }
            Entity::Path(path) => {
                let ends = path
                    .ends()
                    .iter()
                    .filter_map(|end| {
                        path.meta_pos(*end).map(|pos| GoldenEnd {
                            end: end_name(*end).to_string(),
                            pos: GoldenPos::from_meta_pos(pos),
                        })
                    })
                    .collect();
                golden.path = Some(GoldenPath {
                    kind: path.kind().keyword().to_string(),
                    ends,
                    radii: path
                        .radii()
                        .map(|(radius_x, radius_y)| [radius_x.to_string(), radius_y.to_string()]),
                });
            }
        }
        golden
    }
}

impl GoldenPos {
    fn from_meta_pos(pos: &MetaPos) -> Self {
        Self {
            xy: [pos.pos().x(), pos.pos().y()],
            node: pos.node().map(|uid| uid.id()),
            anchor: pos
                .node()
                .map(|_| pos.anchor().keyword().to_string()),
        }
    }
}

fn end_name(end: PathEnd) -> &'static str {
    match end {
        PathEnd::Start => "start",
        PathEnd::End => "end",
        PathEnd::Center => "center",
    }
}
