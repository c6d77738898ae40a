//! Rule definitions and the rule compiler
//!
//! A rule file is a JSON document of the form
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "ruleid": "no-open-get",
//!       "rule": [
//!         {"identifier": "#->paths->*->get->security", "condition": "is-missing", "value": "True"}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Each `{identifier, condition, value}` triple compiles into a
//! [`CompiledRule`]: the identifier path becomes an anchored regular
//! expression over node path strings, and the condition/value pair becomes a
//! typed predicate. A [`RuleSet`] is the conjunction of its member rules;
//! one fully matched conjunction triggers one violation. Rule sets are
//! fail-closed: a single rule that fails to compile invalidates the whole
//! set.

use crate::node::PATH_SEPARATOR;
use crate::violation::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identifier suffix selecting the matched key name instead of its value.
const KEY_SUFFIX: &str = "__key__";

/// Expansion of the leading `operation` macro token: any HTTP operation
/// under any path.
const OPERATION_EXPANSION: &str = "^#->paths->[a-zA-Z/]+->[a-zA-Z]+";

/// Regex fragment a lone `*` path segment compiles to: one whole segment.
const SEGMENT_WILDCARD: &str = "[^>]+";

/// Error compiling a single rule. Any member error invalidates the whole
/// owning rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("operator '{operator}' expects a numeric value, got '{value}'")]
    NonNumericValue { operator: String, value: String },

    #[error("operator '{operator}' expects the literal 'True' or 'False', got '{value}'")]
    NonBooleanValue { operator: String, value: String },

    #[error("unrecognized operator '{0}'")]
    UnknownOperator(String),

    #[error("rule value must be a string or an integer, got '{0}'")]
    UnsupportedValue(String),

    #[error("identifier '{identifier}' does not compile to a valid path pattern: {source}")]
    BadPathPattern {
        identifier: String,
        #[source]
        source: regex::Error,
    },

    #[error("'pattern-match' value '{pattern}' is not a valid regular expression: {source}")]
    BadValuePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("'{identifier}' checks a key or emptiness but defines no match key")]
    MissingMatchKey { identifier: String },

    #[error("'{identifier}' checks for a missing key but extracts from values")]
    KeyCheckOnValue { identifier: String },

    #[error("'{identifier}' compares a value but defines no match key; add '->*' or a key name")]
    ValueWithoutKey { identifier: String },

    #[error("rule set '{0}' has no member rules")]
    EmptyRuleSet(String),
}

/// Comparison operator of a rule, as written in the rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    EqNum,
    NeNum,
    EqStr,
    NeStr,
    PatternMatch,
    IsMissing,
    IsEmpty,
}

impl Operator {
    pub fn parse(token: &str) -> Result<Self, RuleError> {
        match token {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "==" => Ok(Operator::EqNum),
            "/=" => Ok(Operator::NeNum),
            "eq" => Ok(Operator::EqStr),
            "ne" => Ok(Operator::NeStr),
            "pattern-match" => Ok(Operator::PatternMatch),
            "is-missing" => Ok(Operator::IsMissing),
            "is-empty" => Ok(Operator::IsEmpty),
            other => Err(RuleError::UnknownOperator(other.to_string())),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::EqNum
                | Operator::NeNum
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::EqNum => "==",
            Operator::NeNum => "/=",
            Operator::EqStr => "eq",
            Operator::NeStr => "ne",
            Operator::PatternMatch => "pattern-match",
            Operator::IsMissing => "is-missing",
            Operator::IsEmpty => "is-empty",
        };
        write!(f, "{}", token)
    }
}

/// Whether a rule matches against the whole document once, or independently
/// per API operation / reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    ApiLocal,
}

/// Whether the comparison reads the matched key name or the value stored at
/// that key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Key,
    Value,
}

/// The kind of check a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Compare,
    IsEmpty,
    KeyMissing,
}

/// The right-hand value of a rule, coerced at compile time per operator.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedValue::Int(i) => write!(f, "{}", i),
            ExpectedValue::Str(s) => write!(f, "{}", s),
            ExpectedValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
        }
    }
}

/// One rule as it appears in the rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    /// Path expression, e.g. `#->paths->*->get->responses->__key__`.
    pub identifier: String,

    /// Operator token, e.g. `<=`, `eq`, `is-missing`.
    pub condition: String,

    /// Right-hand value (string or integer).
    pub value: serde_json::Value,
}

/// One named rule set as it appears in the rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRuleSet {
    /// Unique rule set identifier.
    pub ruleid: String,

    /// Severity of violations raised by this rule set.
    #[serde(default)]
    pub severity: Severity,

    /// Member rules; all must match for a violation.
    pub rule: Vec<RawRule>,
}

/// Rule file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub rules: Vec<RawRuleSet>,
}

impl RuleFile {
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// A single compiled path+operator+value matcher. Immutable after
/// construction and shared across evaluation runs.
#[derive(Debug)]
pub struct CompiledRule {
    /// Raw identifier path, kept for reporting.
    pub identifier: String,
    pub operator: Operator,
    pub expected: ExpectedValue,
    /// Compiled `pattern-match` expression, present only for that operator.
    pub value_pattern: Option<Regex>,
    pub scope: Scope,
    /// Last path segment; `*` for wildcard, empty for bare-key rules.
    pub match_key: String,
    pub value_source: ValueSource,
    pub condition: Condition,
    /// Anchored pattern matched against candidate node path strings.
    pub path_pattern: Regex,
}

impl CompiledRule {
    /// Compile one `{identifier, condition, value}` triple.
    pub fn compile(raw: &RawRule) -> Result<Self, RuleError> {
        let operator = Operator::parse(&raw.condition)?;
        let scope = if raw.identifier.starts_with('#') {
            Scope::Global
        } else {
            Scope::ApiLocal
        };

        // Path-language compilation: strip the __key__ suffix, split off the
        // match key, expand the operation macro, anchor, compile.
        let mut value_source = ValueSource::Value;
        let mut path_expr = raw.identifier.as_str();
        if let Some(stripped) = path_expr.strip_suffix(KEY_SUFFIX) {
            value_source = ValueSource::Key;
            path_expr = stripped;
        }

        let (raw_match_str, match_key) = match path_expr.rsplit_once(PATH_SEPARATOR) {
            Some((head, tail)) => (head.to_string(), tail.to_string()),
            None => (path_expr.to_string(), String::new()),
        };

        // A trailing * leaves the pattern open-ended for prefix matching
        // against deeper structures; fully specified paths are anchored at
        // the end.
        let open_ended = raw_match_str.ends_with('*');
        let mut match_str = raw_match_str;
        if match_str.starts_with("operation") {
            match_str = match_str.replacen("operation", OPERATION_EXPANSION, 1);
        }
        // A lone * path segment matches any single segment (path templates
        // like /a/b contain no separator characters).
        match_str = match_str
            .split(PATH_SEPARATOR)
            .map(|seg| if seg == "*" { SEGMENT_WILDCARD } else { seg })
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR);
        if !open_ended {
            match_str.push('$');
        }
        if match_str.starts_with('#') {
            match_str.insert(0, '^');
        }

        let path_pattern = Regex::new(&match_str).map_err(|source| RuleError::BadPathPattern {
            identifier: raw.identifier.clone(),
            source,
        })?;

        // Operator/value compilation.
        let mut condition = Condition::Compare;
        let mut value_pattern = None;
        let expected = if operator.is_numeric() {
            ExpectedValue::Int(parse_int_value(&raw.value, &raw.condition)?)
        } else {
            match operator {
                Operator::EqStr | Operator::NeStr => ExpectedValue::Str(string_value(&raw.value)?),
                Operator::PatternMatch => {
                    let pattern = string_value(&raw.value)?;
                    value_pattern =
                        Some(
                            Regex::new(&pattern).map_err(|source| RuleError::BadValuePattern {
                                pattern: pattern.clone(),
                                source,
                            })?,
                        );
                    ExpectedValue::Str(pattern)
                }
                Operator::IsMissing => {
                    value_source = ValueSource::Key;
                    condition = Condition::KeyMissing;
                    ExpectedValue::Bool(parse_bool_value(&raw.value, &raw.condition)?)
                }
                Operator::IsEmpty => {
                    condition = Condition::IsEmpty;
                    ExpectedValue::Bool(parse_bool_value(&raw.value, &raw.condition)?)
                }
                _ => unreachable!("numeric operators handled above"),
            }
        };

        let rule = Self {
            identifier: raw.identifier.clone(),
            operator,
            expected,
            value_pattern,
            scope,
            match_key,
            value_source,
            condition,
            path_pattern,
        };
        rule.check_structure()?;
        Ok(rule)
    }

    /// Structural self-check: reject condition/matchKey/valueSource
    /// combinations that can never be evaluated.
    fn check_structure(&self) -> Result<(), RuleError> {
        if matches!(self.condition, Condition::KeyMissing | Condition::IsEmpty)
            && self.match_key.is_empty()
        {
            return Err(RuleError::MissingMatchKey {
                identifier: self.identifier.clone(),
            });
        }
        if self.condition == Condition::KeyMissing && self.value_source != ValueSource::Key {
            return Err(RuleError::KeyCheckOnValue {
                identifier: self.identifier.clone(),
            });
        }
        if self.value_source == ValueSource::Value && self.match_key.is_empty() {
            return Err(RuleError::ValueWithoutKey {
                identifier: self.identifier.clone(),
            });
        }
        Ok(())
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    /// Last `->` segment of the raw identifier, used in violation
    /// descriptions.
    pub fn last_segment(&self) -> &str {
        match self.identifier.rsplit_once(PATH_SEPARATOR) {
            Some((_, tail)) => tail,
            None => &self.identifier,
        }
    }

    /// Whether a candidate node's path string satisfies this rule's path
    /// pattern.
    pub fn path_matches(&self, node_path: &str) -> bool {
        self.path_pattern.is_match(node_path)
    }
}

fn string_value(value: &serde_json::Value) -> Result<String, RuleError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(RuleError::UnsupportedValue(other.to_string())),
    }
}

fn parse_int_value(value: &serde_json::Value, operator: &str) -> Result<i64, RuleError> {
    let err = || RuleError::NonNumericValue {
        operator: operator.to_string(),
        value: value.to_string().trim_matches('"').to_string(),
    };
    match value {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(err),
        serde_json::Value::String(s) => s.parse::<i64>().map_err(|_| err()),
        _ => Err(err()),
    }
}

fn parse_bool_value(value: &serde_json::Value, operator: &str) -> Result<bool, RuleError> {
    match value {
        serde_json::Value::String(s) if s == "True" => Ok(true),
        serde_json::Value::String(s) if s == "False" => Ok(false),
        other => Err(RuleError::NonBooleanValue {
            operator: operator.to_string(),
            value: other.to_string().trim_matches('"').to_string(),
        }),
    }
}

/// A named, ordered conjunction of compiled rules. Matching all members
/// against one context triggers one violation.
#[derive(Debug)]
pub struct RuleSet {
    pub id: String,
    pub severity: Severity,
    pub rules: Vec<Arc<CompiledRule>>,
}

impl RuleSet {
    /// Compile all member rules. Fail-closed: the first member error
    /// invalidates the whole set. An empty member list is rejected, since
    /// an empty conjunction would match every candidate node.
    pub fn compile(raw: &RawRuleSet) -> Result<Self, RuleError> {
        if raw.rule.is_empty() {
            return Err(RuleError::EmptyRuleSet(raw.ruleid.clone()));
        }
        let mut rules = Vec::with_capacity(raw.rule.len());
        for r in &raw.rule {
            rules.push(Arc::new(CompiledRule::compile(r)?));
        }
        Ok(Self {
            id: raw.ruleid.clone(),
            severity: raw.severity,
            rules,
        })
    }
}
