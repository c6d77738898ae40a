//! Spec summary statistics
//!
//! Counts API operations, response codes and parameter data types across a
//! spec, resolving `$ref` parameter schemas against the document root.

use crate::document::{SpecDocument, HTTP_METHODS};
use crate::node::{Scalar, SpecValue, LINE_PREFIX_MARKER, LINE_RANGE_KEY};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Spec format generation, detected from the version key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    /// Swagger 2.0
    V2,
    /// OpenAPI 3.x
    V3,
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecVersion::V2 => write!(f, "v2"),
            SpecVersion::V3 => write!(f, "v3"),
        }
    }
}

/// Aggregate counters for one spec document.
#[derive(Debug)]
pub struct SpecStats {
    pub version: SpecVersion,

    /// Number of path templates under `paths`.
    pub api_count: usize,

    /// Operation count per HTTP method.
    pub methods: IndexMap<String, usize>,

    /// Occurrence count per response code.
    pub responses: IndexMap<String, usize>,

    /// Number of typed parameters, including resolved `$ref` schemas.
    pub parameter_count: usize,

    /// Parameter count per declared data type.
    pub parameter_types: IndexMap<String, usize>,
}

impl SpecStats {
    pub fn collect(doc: &SpecDocument) -> Self {
        let root = doc.root.as_mapping();
        let version = match root.map(|m| m.contains_key("openapi")) {
            Some(true) => SpecVersion::V3,
            _ => SpecVersion::V2,
        };

        let mut stats = Self {
            version,
            api_count: 0,
            methods: IndexMap::new(),
            responses: IndexMap::new(),
            parameter_count: 0,
            parameter_types: IndexMap::new(),
        };

        let Some(paths) = root
            .and_then(|m| m.get("paths"))
            .and_then(|p| p.as_mapping())
        else {
            return stats;
        };

        let mut ref_pointers = Vec::new();
        for (path, item) in paths {
            if is_marker_key(path) {
                continue;
            }
            stats.api_count += 1;
            let Some(operations) = item.as_mapping() else {
                continue;
            };
            for (method, op) in operations {
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                *stats.methods.entry(method.clone()).or_insert(0) += 1;
                let Some(op) = op.as_mapping() else { continue };

                if let Some(responses) = op.get("responses").and_then(|r| r.as_mapping()) {
                    for code in responses.keys() {
                        if is_marker_key(code) {
                            continue;
                        }
                        *stats.responses.entry(code.clone()).or_insert(0) += 1;
                    }
                }

                if let Some(params) = op.get("parameters").and_then(|p| p.as_sequence()) {
                    for param in params {
                        stats.count_parameter(param, version, &mut ref_pointers);
                    }
                }
            }
        }

        // Referenced parameter schemas are counted against their targets.
        for pointer in ref_pointers {
            if let Some(target) = resolve_pointer(&doc.root, &pointer) {
                if let Some(mapping) = target.as_mapping() {
                    stats.count_type(mapping);
                }
            }
        }

        stats
    }

    fn count_parameter(
        &mut self,
        param: &Arc<SpecValue>,
        version: SpecVersion,
        ref_pointers: &mut Vec<String>,
    ) {
        let Some(param) = param.as_mapping() else {
            return;
        };

        // v3 keeps the data type in the parameter's schema object; v2 has
        // it either inline or in a body-parameter schema.
        let subject = match version {
            SpecVersion::V3 => match param.get("schema").and_then(|s| s.as_mapping()) {
                Some(schema) => schema,
                None => return,
            },
            SpecVersion::V2 => param
                .get("schema")
                .and_then(|s| s.as_mapping())
                .unwrap_or(param),
        };

        if let Some(Scalar::Str(pointer)) = subject.get("$ref").and_then(|r| r.scalar()) {
            ref_pointers.push(pointer.clone());
        }
        self.count_type(subject);
    }

    fn count_type(&mut self, mapping: &IndexMap<String, Arc<SpecValue>>) {
        let Some(type_value) = mapping.get("type") else {
            return;
        };
        // Annotated loaders may wrap the type in a one-element list.
        let scalar = match type_value.as_ref() {
            SpecValue::Sequence(items) => items.first().and_then(|v| v.scalar()),
            other => other.scalar(),
        };
        let Some(Scalar::Str(type_name)) = scalar else {
            return;
        };
        let type_name = type_name
            .strip_prefix(LINE_PREFIX_MARKER)
            .unwrap_or(type_name);
        self.parameter_count += 1;
        *self
            .parameter_types
            .entry(type_name.to_string())
            .or_insert(0) += 1;
    }
}

impl fmt::Display for SpecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "spec version: {}", self.version)?;
        writeln!(f, "APIs: {}", self.api_count)?;
        for (method, count) in &self.methods {
            writeln!(f, "  {}: {}", method, count)?;
        }
        writeln!(f, "responses:")?;
        for (code, count) in &self.responses {
            writeln!(f, "  {}: {}", code, count)?;
        }
        writeln!(f, "typed parameters: {}", self.parameter_count)?;
        for (type_name, count) in &self.parameter_types {
            writeln!(f, "  {}: {}", type_name, count)?;
        }
        Ok(())
    }
}

fn is_marker_key(key: &str) -> bool {
    key == LINE_RANGE_KEY || key.starts_with(LINE_PREFIX_MARKER)
}

/// Resolve a `#/a/b` pointer against the document root.
fn resolve_pointer(root: &Arc<SpecValue>, pointer: &str) -> Option<Arc<SpecValue>> {
    let mut current = Arc::clone(root);
    for segment in pointer.split('/') {
        if segment == "#" {
            continue;
        }
        let segment = segment.replace("~1", "/").replace("~0", "~");
        let next = current.as_mapping()?.get(&segment)?.clone();
        current = next;
    }
    Some(current)
}
