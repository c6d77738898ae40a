//! Spec document loading and candidate enumeration
//!
//! A [`SpecDocument`] is a parsed OpenAPI-style specification plus the three
//! candidate collections the evaluation phases consume: the global node map
//! (every container node keyed by its own absolute path), the per-API
//! candidates (container nodes inside `paths-><path>-><method>` subtrees,
//! each carrying its owning operation) and the reference candidates
//! (`$ref` mappings with their targets resolved).
//!
//! Documents produced by a line-annotating preprocessor carry `__lines__`
//! entries inside mappings; these become node line ranges and are never
//! surfaced as children.

use crate::node::{
    ApiCandidate, ApiContext, GlobalNodes, LineRange, Scalar, SpecNode, SpecValue,
    LINE_RANGE_KEY, PATH_SEPARATOR,
};
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// HTTP methods recognized as operation keys under `paths`.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Error loading or parsing a spec document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported spec file extension '{0}'; expected .json, .yaml or .yml")]
    UnsupportedExtension(PathBuf),
}

/// A parsed spec with its evaluation candidates.
#[derive(Debug)]
pub struct SpecDocument {
    /// Source file, empty for documents parsed from strings.
    pub file: PathBuf,

    /// Root of the value tree.
    pub root: Arc<SpecValue>,

    /// Container nodes keyed by their own absolute path.
    pub global_nodes: GlobalNodes,

    /// Container nodes inside operation subtrees, with API context.
    pub api_candidates: Vec<ApiCandidate>,

    /// `$ref` mappings with resolved targets.
    pub ref_candidates: Vec<Arc<SpecNode>>,
}

impl SpecDocument {
    /// Load a spec file, dispatching on the file extension.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let root = match ext.as_str() {
            "json" => {
                let value: serde_json::Value =
                    serde_json::from_str(&content).map_err(|source| DocumentError::Json {
                        path: path.to_path_buf(),
                        source,
                    })?;
                from_json_value(&value)
            }
            "yaml" | "yml" => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(&content).map_err(|source| DocumentError::Yaml {
                        path: path.to_path_buf(),
                        source,
                    })?;
                from_yaml_value(&value)
            }
            _ => return Err(DocumentError::UnsupportedExtension(path.to_path_buf())),
        };

        Ok(Self::build(path.to_path_buf(), root))
    }

    /// Parse a JSON spec from a string.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        Ok(Self::build(PathBuf::new(), from_json_value(&value)))
    }

    /// Parse a YAML spec from a string.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        Ok(Self::build(PathBuf::new(), from_yaml_value(&value)))
    }

    /// Construct the candidate collections from a converted value tree.
    fn build(file: PathBuf, root: Arc<SpecValue>) -> Self {
        // First walk: one record per container node, in document order.
        let mut records = Vec::new();
        collect_records("#", "#", &root, &mut records);

        // Plain nodes first, so references can resolve against them.
        let mut by_path: HashMap<String, Arc<SpecNode>> = HashMap::new();
        for rec in records.iter().filter(|r| r.ref_pointer.is_none()) {
            let mut node = SpecNode::new(&rec.name, &rec.path, Arc::clone(&rec.value), rec.lines);
            if let Some(api) = &rec.api {
                node = node.with_api(api.clone());
            }
            by_path.insert(rec.path.clone(), Arc::new(node));
        }

        let mut global_nodes = GlobalNodes::new();
        let mut api_candidates = Vec::new();
        let mut ref_candidates = Vec::new();

        for rec in &records {
            let node = match &rec.ref_pointer {
                None => Arc::clone(&by_path[&rec.path]),
                Some(pointer) => {
                    let mut node =
                        SpecNode::new(&rec.name, &rec.path, Arc::clone(&rec.value), rec.lines);
                    if let Some(api) = &rec.api {
                        node = node.with_api(api.clone());
                    }
                    match pointer_to_path(pointer).and_then(|p| by_path.get(&p).cloned()) {
                        Some(target) => {
                            debug!("resolved {} -> {}", rec.path, target.path);
                            node = node.with_ref_target(target);
                        }
                        None => {
                            warn!("unresolvable $ref '{}' at '{}'", pointer, rec.path);
                        }
                    }
                    let node = Arc::new(node);
                    ref_candidates.push(Arc::clone(&node));
                    node
                }
            };

            global_nodes
                .entry(rec.path.clone())
                .or_default()
                .push(Arc::clone(&node));

            if let Some(api) = &rec.api {
                api_candidates.push(ApiCandidate {
                    path: rec.path.clone(),
                    node,
                    api: api.clone(),
                });
            }
        }

        Self {
            file,
            root,
            global_nodes,
            api_candidates,
            ref_candidates,
        }
    }
}

/// Intermediate record for one container node, produced by the tree walk.
struct NodeRecord {
    name: String,
    path: String,
    value: Arc<SpecValue>,
    lines: LineRange,
    api: Option<ApiContext>,
    ref_pointer: Option<String>,
}

/// Walk the value tree and record every container (mapping or sequence)
/// node under its own absolute path.
fn collect_records(name: &str, path: &str, value: &Arc<SpecValue>, records: &mut Vec<NodeRecord>) {
    match value.as_ref() {
        SpecValue::Mapping(map) => {
            records.push(NodeRecord {
                name: name.to_string(),
                path: path.to_string(),
                value: Arc::clone(value),
                lines: lines_of(map),
                api: api_context_of(path),
                ref_pointer: ref_pointer_of(map),
            });
            for (key, child) in map {
                if key == LINE_RANGE_KEY {
                    continue;
                }
                let child_path = format!("{}{}{}", path, PATH_SEPARATOR, key);
                collect_records(key, &child_path, child, records);
            }
        }
        SpecValue::Sequence(items) => {
            records.push(NodeRecord {
                name: name.to_string(),
                path: path.to_string(),
                value: Arc::clone(value),
                lines: LineRange::UNKNOWN,
                api: api_context_of(path),
                ref_pointer: None,
            });
            for (idx, child) in items.iter().enumerate() {
                let idx = idx.to_string();
                let child_path = format!("{}{}{}", path, PATH_SEPARATOR, idx);
                collect_records(&idx, &child_path, child, records);
            }
        }
        SpecValue::Scalar(..) => {}
    }
}

/// The owning API operation for a node path, derived from the
/// `#->paths-><path>-><method>` prefix.
fn api_context_of(path: &str) -> Option<ApiContext> {
    let mut segments = path.split(PATH_SEPARATOR);
    if segments.next() != Some("#") || segments.next() != Some("paths") {
        return None;
    }
    let api_path = segments.next()?;
    let method = segments.next()?;
    if !HTTP_METHODS.contains(&method) {
        return None;
    }
    Some(ApiContext {
        path: api_path.to_string(),
        method: method.to_string(),
    })
}

/// The `$ref` pointer of a mapping, if it is a local reference.
fn ref_pointer_of(map: &IndexMap<String, Arc<SpecValue>>) -> Option<String> {
    match map.get("$ref")?.scalar()? {
        Scalar::Str(s) if s.starts_with("#/") => Some(s.clone()),
        _ => None,
    }
}

/// Convert a JSON pointer (`#/definitions/Pet`) to an absolute node path
/// (`#->definitions->Pet`).
fn pointer_to_path(pointer: &str) -> Option<String> {
    let rest = pointer.strip_prefix("#/")?;
    let mut path = String::from("#");
    for segment in rest.split('/') {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        path.push_str(PATH_SEPARATOR);
        path.push_str(&segment);
    }
    Some(path)
}

/// Extract the `__lines__` annotation of a mapping, if present. Accepts
/// both the `[start, end]` and the `"start-end"` encodings.
fn lines_of(map: &IndexMap<String, Arc<SpecValue>>) -> LineRange {
    let Some(value) = map.get(LINE_RANGE_KEY) else {
        return LineRange::UNKNOWN;
    };
    match value.as_ref() {
        SpecValue::Sequence(items) if items.len() == 2 => {
            let as_usize = |v: &SpecValue| match v.scalar() {
                Some(Scalar::Int(i)) if *i >= 0 => Some(*i as usize),
                _ => None,
            };
            match (as_usize(&items[0]), as_usize(&items[1])) {
                (Some(start), Some(end)) => LineRange::new(start, end),
                _ => LineRange::UNKNOWN,
            }
        }
        SpecValue::Scalar(Scalar::Str(s), _) => match s.split_once('-') {
            Some((start, end)) => match (start.parse(), end.parse()) {
                (Ok(start), Ok(end)) => LineRange::new(start, end),
                _ => LineRange::UNKNOWN,
            },
            None => LineRange::UNKNOWN,
        },
        _ => LineRange::UNKNOWN,
    }
}

fn from_json_value(value: &serde_json::Value) -> Arc<SpecValue> {
    Arc::new(match value {
        serde_json::Value::Null => SpecValue::Scalar(Scalar::Null, LineRange::UNKNOWN),
        serde_json::Value::Bool(b) => SpecValue::Scalar(Scalar::Bool(*b), LineRange::UNKNOWN),
        serde_json::Value::Number(n) => {
            let scalar = match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            };
            SpecValue::Scalar(scalar, LineRange::UNKNOWN)
        }
        serde_json::Value::String(s) => {
            SpecValue::Scalar(Scalar::Str(s.clone()), LineRange::UNKNOWN)
        }
        serde_json::Value::Array(items) => {
            SpecValue::Sequence(items.iter().map(from_json_value).collect())
        }
        serde_json::Value::Object(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), from_json_value(v));
            }
            SpecValue::Mapping(out)
        }
    })
}

fn from_yaml_value(value: &serde_yaml::Value) -> Arc<SpecValue> {
    Arc::new(match value {
        serde_yaml::Value::Null => SpecValue::Scalar(Scalar::Null, LineRange::UNKNOWN),
        serde_yaml::Value::Bool(b) => SpecValue::Scalar(Scalar::Bool(*b), LineRange::UNKNOWN),
        serde_yaml::Value::Number(n) => {
            let scalar = match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            };
            SpecValue::Scalar(scalar, LineRange::UNKNOWN)
        }
        serde_yaml::Value::String(s) => {
            SpecValue::Scalar(Scalar::Str(s.clone()), LineRange::UNKNOWN)
        }
        serde_yaml::Value::Sequence(items) => {
            SpecValue::Sequence(items.iter().map(from_yaml_value).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                let Some(key) = yaml_key_string(k) else {
                    warn!("skipping non-scalar mapping key in YAML spec");
                    continue;
                };
                out.insert(key, from_yaml_value(v));
            }
            SpecValue::Mapping(out)
        }
        serde_yaml::Value::Tagged(tagged) => return from_yaml_value(&tagged.value),
    })
}

fn yaml_key_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PETSTORE: &str = r##"{
        "swagger": "2.0",
        "info": {"title": "petstore", "version": "1.0"},
        "paths": {
            "/pets": {
                "get": {
                    "responses": {
                        "200": {
                            "schema": {"$ref": "#/definitions/Pet"}
                        }
                    }
                }
            }
        },
        "definitions": {
            "Pet": {"type": "object", "required": ["id"]}
        }
    }"##;

    #[test]
    fn test_global_nodes_keyed_by_own_path() {
        let doc = SpecDocument::from_json_str(PETSTORE).unwrap();
        assert!(doc.global_nodes.contains_key("#"));
        assert!(doc.global_nodes.contains_key("#->paths->/pets->get"));
        assert!(doc.global_nodes.contains_key("#->definitions->Pet"));

        let get = &doc.global_nodes["#->paths->/pets->get"][0];
        assert_eq!(get.name, "get");
        assert!(get.value.is_mapping());
    }

    #[test]
    fn test_api_candidates_carry_operation_context() {
        let doc = SpecDocument::from_json_str(PETSTORE).unwrap();
        let ops: Vec<_> = doc
            .api_candidates
            .iter()
            .filter(|c| c.path == "#->paths->/pets->get")
            .collect();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].api.path, "/pets");
        assert_eq!(ops[0].api.method, "get");

        // Nodes deeper in the operation subtree share the context.
        let deep = doc
            .api_candidates
            .iter()
            .find(|c| c.path == "#->paths->/pets->get->responses->200")
            .unwrap();
        assert_eq!(deep.api.method, "get");

        // Nodes outside paths have no context.
        assert!(!doc.api_candidates.iter().any(|c| c.path.starts_with("#->definitions")));
    }

    #[test]
    fn test_ref_candidates_resolve_targets() {
        let doc = SpecDocument::from_json_str(PETSTORE).unwrap();
        assert_eq!(doc.ref_candidates.len(), 1);
        let schema = &doc.ref_candidates[0];
        assert_eq!(schema.path, "#->paths->/pets->get->responses->200->schema");
        let target = schema.ref_target.as_ref().unwrap();
        assert_eq!(target.path, "#->definitions->Pet");
        assert!(schema.match_target().as_mapping().unwrap().contains_key("required"));
    }

    #[test]
    fn test_unresolvable_ref_kept_without_target() {
        let doc = SpecDocument::from_json_str(
            r##"{"paths": {}, "x": {"$ref": "#/definitions/Missing"}}"##,
        )
        .unwrap();
        assert_eq!(doc.ref_candidates.len(), 1);
        assert!(doc.ref_candidates[0].ref_target.is_none());
    }

    #[test]
    fn test_lines_annotation_intake() {
        let doc = SpecDocument::from_json_str(
            r#"{"info": {"__lines__": [3, 9], "title": "t"}}"#,
        )
        .unwrap();
        let info = &doc.global_nodes["#->info"][0];
        assert_eq!(info.lines, LineRange::new(3, 9));
        // The marker never becomes a child node.
        assert!(!doc.global_nodes.contains_key("#->info->__lines__"));
    }

    #[test]
    fn test_lines_annotation_string_form() {
        let doc = SpecDocument::from_json_str(
            r#"{"info": {"__lines__": "4-11", "title": "t"}}"#,
        )
        .unwrap();
        assert_eq!(doc.global_nodes["#->info"][0].lines, LineRange::new(4, 11));
    }

    #[test]
    fn test_sequences_are_candidates() {
        let doc = SpecDocument::from_json_str(r#"{"tags": [{"name": "pets"}, "x"]}"#).unwrap();
        let tags = &doc.global_nodes["#->tags"][0];
        assert!(tags.value.as_sequence().is_some());
        // Mapping elements get index path segments.
        assert!(doc.global_nodes.contains_key("#->tags->0"));
    }

    #[test]
    fn test_yaml_parsing() {
        let doc = SpecDocument::from_yaml_str(
            "openapi: 3.0.0\npaths:\n  /pets:\n    get:\n      responses:\n        '200':\n          description: ok\n",
        )
        .unwrap();
        assert!(doc.global_nodes.contains_key("#->paths->/pets->get->responses"));
        let responses = &doc.global_nodes["#->paths->/pets->get->responses"][0];
        assert!(responses.value.as_mapping().unwrap().contains_key("200"));
    }

    #[test]
    fn test_pointer_to_path() {
        assert_eq!(
            pointer_to_path("#/definitions/Pet").unwrap(),
            "#->definitions->Pet"
        );
        assert_eq!(
            pointer_to_path("#/paths/~1pets/get").unwrap(),
            "#->paths->/pets->get"
        );
        assert!(pointer_to_path("http://other/schema.json").is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.txt");
        std::fs::write(&path, "{}").unwrap();
        let err = SpecDocument::from_file(&path).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(&path, PETSTORE).unwrap();
        let doc = SpecDocument::from_file(&path).unwrap();
        assert_eq!(doc.file, path);
        assert!(doc.global_nodes.contains_key("#->paths->/pets"));
    }
}
