//! Spec-tree data model
//!
//! A parsed API specification becomes a tree of [`SpecNode`]s. Every node
//! carries its key name, an absolute `#->`-separated path string, a value
//! (ordered mapping, sequence or scalar) and a source line range. Nodes that
//! are `$ref` indirections additionally carry the resolved target node, and
//! nodes under an HTTP operation carry their owning API definition.
//!
//! Mapping iteration order is the insertion order of the source document;
//! wildcard matching relies on this for deterministic first-match-wins
//! results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Path segment separator in identifier paths and node path strings.
pub const PATH_SEPARATOR: &str = "->";

/// Reserved mapping key carrying a `[start, end]` line range injected by a
/// line-annotating preprocessor. Never exposed as a child node and skipped
/// during wildcard iteration.
pub const LINE_RANGE_KEY: &str = "__lines__";

/// Provenance prefix that annotated loaders may leave on scalar strings.
/// Stripped before any value comparison.
pub const LINE_PREFIX_MARKER: &str = "__line__";

/// A half-open source line range (1-based, inclusive). `0-0` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Range for nodes whose source position is not known.
    pub const UNKNOWN: LineRange = LineRange { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A scalar leaf value in the spec tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    /// Falsiness in the sense of `is-empty`: empty string, zero, `false`
    /// or null.
    pub fn is_falsy(&self) -> bool {
        match self {
            Scalar::Str(s) => s.is_empty(),
            Scalar::Int(i) => *i == 0,
            Scalar::Float(f) => *f == 0.0,
            Scalar::Bool(b) => !b,
            Scalar::Null => true,
        }
    }

    /// String form used for `eq`/`ne`/`pattern-match` comparisons.
    pub fn comparison_str(&self) -> String {
        match self {
            Scalar::Str(s) => s
                .strip_prefix(LINE_PREFIX_MARKER)
                .unwrap_or(s)
                .to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Scalar::Null => String::new(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.comparison_str())
    }
}

/// A value in the spec tree: an ordered mapping, a sequence or a scalar.
///
/// Subtrees are shared between a node and its ancestors via `Arc`, so a
/// `SpecNode` can hand out its whole subtree without cloning it.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecValue {
    Mapping(IndexMap<String, Arc<SpecValue>>),
    Sequence(Vec<Arc<SpecValue>>),
    Scalar(Scalar, LineRange),
}

impl SpecValue {
    pub fn is_mapping(&self) -> bool {
        matches!(self, SpecValue::Mapping(_))
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Arc<SpecValue>>> {
        match self {
            SpecValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Arc<SpecValue>]> {
        match self {
            SpecValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// The scalar at this position, unwrapped from its line-range pairing.
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            SpecValue::Scalar(s, _) => Some(s),
            _ => None,
        }
    }

    /// Falsiness in the sense of `is-empty`: empty containers and falsy
    /// scalars.
    pub fn is_falsy(&self) -> bool {
        match self {
            SpecValue::Mapping(m) => m.keys().all(|k| k == LINE_RANGE_KEY),
            SpecValue::Sequence(s) => s.is_empty(),
            SpecValue::Scalar(s, _) => s.is_falsy(),
        }
    }
}

/// The API operation a node belongs to (e.g. `get /users`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiContext {
    /// The path template under `paths` (e.g. `/users`).
    pub path: String,
    /// HTTP method (e.g. `get`).
    pub method: String,
}

impl fmt::Display for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A position in the parsed spec tree.
#[derive(Debug, Clone)]
pub struct SpecNode {
    /// Key name of this node in its parent (the document root is `#`).
    pub name: String,
    /// Absolute path string, e.g. `#->paths->/users->get->responses`.
    pub path: String,
    /// The value rooted at this node.
    pub value: Arc<SpecValue>,
    /// Source line range, `LineRange::UNKNOWN` if not annotated.
    pub lines: LineRange,
    /// Resolved `$ref` target when this node is itself an indirection.
    pub ref_target: Option<Arc<SpecNode>>,
    /// Owning API operation for nodes under `paths-><path>-><method>`.
    pub api: Option<ApiContext>,
}

impl SpecNode {
    pub fn new(name: &str, path: &str, value: Arc<SpecValue>, lines: LineRange) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            value,
            lines,
            ref_target: None,
            api: None,
        }
    }

    pub fn with_api(mut self, api: ApiContext) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_ref_target(mut self, target: Arc<SpecNode>) -> Self {
        self.ref_target = Some(target);
        self
    }

    /// The value a rule matches against: the `$ref` target's value when this
    /// node is an indirection, the node's own value otherwise.
    pub fn match_target(&self) -> &SpecValue {
        match &self.ref_target {
            Some(target) => &target.value,
            None => &self.value,
        }
    }
}

/// Mapping from absolute path string to the candidate nodes found there,
/// in document order. Input to the global evaluation phase.
pub type GlobalNodes = IndexMap<String, Vec<Arc<SpecNode>>>;

/// One candidate for per-API evaluation: the node, its path string (the
/// regex subject) and the owning API operation.
#[derive(Debug, Clone)]
pub struct ApiCandidate {
    pub path: String,
    pub node: Arc<SpecNode>,
    pub api: ApiContext,
}
