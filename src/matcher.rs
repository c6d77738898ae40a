//! Per-run match state and three-phase conjunction evaluation
//!
//! A [`Match`] binds one compiled rule to one evaluation run and holds the
//! memoized outcome for global-scope rules. A [`MatchSet`] binds the whole
//! conjunction of a rule set to a run and drives the three phases: global
//! (whole document), per-API (one candidate per operation node) and
//! per-reference (`$ref` target nodes).
//!
//! Compiled rules and rule sets are immutable and shared across runs; all
//! mutable memo state lives here and must be constructed fresh per spec
//! evaluated, or memoized global results would leak between specs.

use crate::node::{
    ApiCandidate, GlobalNodes, LineRange, Scalar, SpecNode, SpecValue, LINE_PREFIX_MARKER,
    LINE_RANGE_KEY,
};
use crate::rule::{CompiledRule, Condition, ExpectedValue, Operator, RuleSet, ValueSource};
use crate::violation::Violation;
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;

/// Evaluation-time contract violation: the rule and the spec disagree about
/// the shape of the data. Reported per rule without aborting the run.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(
        "rule '{identifier}': match key '{match_key}' used against a non-mapping value at \
         '{path}'; only '*' can match list or scalar targets"
    )]
    WildcardRequired {
        identifier: String,
        match_key: String,
        path: String,
    },

    #[error("rule '{identifier}': no match key to extract a value at '{path}'")]
    MissingKeyContext { identifier: String, path: String },
}

/// Per-run output collector threaded through all three phases.
#[derive(Debug, Default)]
pub struct EvalSink {
    /// One record per fully satisfied conjunction.
    pub violations: Vec<Violation>,

    /// Rendered conjunction descriptions, for the audit trail.
    pub descriptions: Vec<String>,

    /// Contract violations encountered while evaluating.
    pub errors: Vec<MatchError>,
}

impl EvalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One compiled rule bound to one evaluation run.
#[derive(Debug)]
pub struct Match {
    rule: Arc<CompiledRule>,

    /// Memoized outcome for global-scope rules: set once the rule succeeds
    /// against any node, never reset for the remainder of the run.
    global_result: bool,
}

impl Match {
    fn new(rule: Arc<CompiledRule>) -> Self {
        Self {
            rule,
            global_result: false,
        }
    }

    pub fn rule(&self) -> &CompiledRule {
        &self.rule
    }

    pub fn is_global(&self) -> bool {
        self.rule.is_global()
    }

    pub fn global_result(&self) -> bool {
        self.global_result
    }

    /// Evaluate this rule against a node. Global-scope rules short-circuit
    /// on their memoized result; the first success is never overwritten.
    pub fn eval(&mut self, node: &SpecNode) -> Result<bool, MatchError> {
        if self.is_global() && self.global_result {
            return Ok(true);
        }
        let matched = match_node(&self.rule, node)?;
        if matched && self.is_global() {
            self.global_result = true;
        }
        Ok(matched)
    }
}

/// One rule-set conjunction bound to one evaluation run.
#[derive(Debug)]
pub struct MatchSet {
    rule_set: Arc<RuleSet>,
    matches: Vec<Match>,

    /// True if every member rule is global; used only for diagnostics.
    all_global: bool,

    /// Whether any global conjunction fully matched this run.
    global_result: bool,

    /// Number of rule evaluations performed across all phases.
    evaluations: usize,
}

impl MatchSet {
    pub fn new(rule_set: Arc<RuleSet>) -> Self {
        let matches: Vec<Match> = rule_set
            .rules
            .iter()
            .map(|r| Match::new(Arc::clone(r)))
            .collect();
        let all_global = matches.iter().all(Match::is_global);
        Self {
            rule_set,
            matches,
            all_global,
            global_result: false,
            evaluations: 0,
        }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn global_result(&self) -> bool {
        self.global_result
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Phase 1: evaluate the global members against every global candidate
    /// node, keyed by absolute path string. Conjunctions made entirely of
    /// global rules are decided (and emitted) here; mixed conjunctions only
    /// memoize their global members for the later phases.
    pub fn run_global_phase(&mut self, globals: &GlobalNodes, sink: &mut EvalSink) {
        for (path, nodes) in globals {
            for node in nodes {
                let mut all_match = true;
                for m in self.matches.iter_mut() {
                    if !m.is_global() {
                        all_match = false;
                        continue;
                    }
                    self.evaluations += 1;
                    if !m.rule.path_matches(path) {
                        // A regex miss fails the conjunction for this node,
                        // but later global members must still evaluate so
                        // their memoized results are complete before the
                        // per-API phase.
                        all_match = false;
                        continue;
                    }
                    match m.eval(node) {
                        Ok(true) => {}
                        Ok(false) => all_match = false,
                        Err(e) => {
                            warn!("{}", e);
                            sink.errors.push(e);
                            all_match = false;
                        }
                    }
                }
                if all_match && self.all_global {
                    self.global_result = true;
                    debug!(
                        "rule set '{}': global conjunction matched at '{}'",
                        self.rule_set.id, path
                    );
                    self.emit(path, node.lines, None, sink);
                }
            }
        }
        if self.all_global && !self.global_result {
            debug!(
                "rule set '{}': no match after global check",
                self.rule_set.id
            );
        }
    }

    /// Phase 2: evaluate the conjunction once per API operation candidate.
    /// Global members short-circuit on their memoized phase-1 result;
    /// all-global conjunctions were fully decided in phase 1 and are
    /// skipped.
    pub fn run_api_phase(&mut self, candidates: &[ApiCandidate], sink: &mut EvalSink) {
        if self.all_global {
            return;
        }
        for cand in candidates {
            if self.conjunction_matches(&cand.path, &cand.node, sink) {
                debug!(
                    "rule set '{}': API conjunction matched at '{}'",
                    self.rule_set.id, cand.path
                );
                self.emit(&cand.path, cand.node.lines, Some(cand), sink);
            }
        }
    }

    /// Phase 3: evaluate the conjunction once per reference-target node,
    /// each carrying its own path string.
    pub fn run_ref_phase(&mut self, refs: &[Arc<SpecNode>], sink: &mut EvalSink) {
        if self.all_global {
            return;
        }
        for node in refs {
            let path = node.path.clone();
            if self.conjunction_matches(&path, node, sink) {
                debug!(
                    "rule set '{}': reference conjunction matched at '{}'",
                    self.rule_set.id, path
                );
                self.emit(&path, node.lines, None, sink);
            }
        }
    }

    /// Local-phase conjunction evaluation: first failure short-circuits.
    fn conjunction_matches(&mut self, path: &str, node: &SpecNode, sink: &mut EvalSink) -> bool {
        for m in self.matches.iter_mut() {
            self.evaluations += 1;
            if m.is_global() {
                if m.global_result {
                    continue;
                }
                return false;
            }
            if !m.rule.path_matches(path) {
                return false;
            }
            match m.eval(node) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!("{}", e);
                    sink.errors.push(e);
                    return false;
                }
            }
        }
        true
    }

    fn emit(
        &self,
        path: &str,
        lines: LineRange,
        api: Option<&ApiCandidate>,
        sink: &mut EvalSink,
    ) {
        let description = self.describe(path, lines);
        sink.descriptions.push(description.clone());
        let mut violation = Violation::new(
            &self.rule_set.id,
            self.rule_set.severity,
            description,
            path,
            lines,
        );
        if let Some(cand) = api {
            violation = violation.with_api(cand.api.clone());
        }
        sink.violations.push(violation);
    }

    /// Render the matched conjunction for the audit trail: one
    /// `(<path>-><lastSegment> <op> <value>)[<lines>]` term per member,
    /// joined by `and`.
    fn describe(&self, path: &str, lines: LineRange) -> String {
        self.matches
            .iter()
            .map(|m| {
                format!(
                    "({}->{} {} {})[{}]",
                    path,
                    m.rule.last_segment(),
                    m.rule.operator,
                    m.rule.expected,
                    lines
                )
            })
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

/// Match one rule against one candidate node, resolving `$ref` indirection
/// first.
fn match_node(rule: &CompiledRule, node: &SpecNode) -> Result<bool, MatchError> {
    match node.match_target() {
        SpecValue::Mapping(map) => match_mapping(rule, node, map),
        non_mapping => {
            if rule.match_key != "*" {
                return Err(MatchError::WildcardRequired {
                    identifier: rule.identifier.clone(),
                    match_key: rule.match_key.clone(),
                    path: node.path.clone(),
                });
            }
            match non_mapping {
                SpecValue::Sequence(items) => {
                    for item in items {
                        if element_matches(rule, item) {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                scalar => Ok(element_matches(rule, scalar)),
            }
        }
    }
}

fn match_mapping(
    rule: &CompiledRule,
    node: &SpecNode,
    map: &indexmap::IndexMap<String, Arc<SpecValue>>,
) -> Result<bool, MatchError> {
    if rule.condition == Condition::KeyMissing {
        if rule.match_key.is_empty() {
            return Err(MatchError::MissingKeyContext {
                identifier: rule.identifier.clone(),
                path: node.path.clone(),
            });
        }
        let missing = !map.contains_key(&rule.match_key);
        return Ok(missing == expected_bool(rule));
    }

    // Bare key-name rule: compare the node's own name (e.g. the operation
    // verb or a response code).
    if rule.value_source == ValueSource::Key && rule.match_key.is_empty() {
        return Ok(scalar_matches(rule, &Scalar::Str(node.name.clone())));
    }
    if rule.match_key.is_empty() {
        return Err(MatchError::MissingKeyContext {
            identifier: rule.identifier.clone(),
            path: node.path.clone(),
        });
    }

    if rule.match_key == "*" {
        // First match wins, in source-document insertion order.
        for (key, value) in map {
            if key == LINE_RANGE_KEY {
                continue;
            }
            let matched = match rule.value_source {
                ValueSource::Key => key_matches(rule, key),
                ValueSource::Value => element_matches(rule, value),
            };
            if matched {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    match map.get(&rule.match_key) {
        None => Ok(false),
        Some(value) => Ok(element_matches(rule, value)),
    }
}

/// Apply the rule's condition to one extracted value.
fn element_matches(rule: &CompiledRule, value: &SpecValue) -> bool {
    match rule.condition {
        Condition::IsEmpty => value.is_falsy() == expected_bool(rule),
        Condition::Compare => value.scalar().is_some_and(|s| scalar_matches(rule, s)),
        Condition::KeyMissing => {
            debug!(
                "rule '{}': key-missing check against non-mapping value",
                rule.identifier
            );
            false
        }
    }
}

/// Apply the rule's condition to one matched key name.
fn key_matches(rule: &CompiledRule, key: &str) -> bool {
    match rule.condition {
        Condition::IsEmpty => key.is_empty() == expected_bool(rule),
        Condition::Compare => scalar_matches(rule, &Scalar::Str(key.to_string())),
        Condition::KeyMissing => false,
    }
}

fn expected_bool(rule: &CompiledRule) -> bool {
    matches!(rule.expected, ExpectedValue::Bool(true))
}

/// Compare one scalar left value against the rule's expected value.
/// Coercion failures are soft: they yield no-match, never an error.
fn scalar_matches(rule: &CompiledRule, scalar: &Scalar) -> bool {
    match &rule.expected {
        ExpectedValue::Int(expected) => {
            let left = match scalar {
                Scalar::Int(i) => *i,
                Scalar::Str(s) => {
                    let s = s.strip_prefix(LINE_PREFIX_MARKER).unwrap_or(s);
                    match s.parse::<i64>() {
                        Ok(i) => i,
                        Err(_) => {
                            warn!(
                                "rule '{}': left value '{}' is not numeric, expected {} {}",
                                rule.identifier, s, rule.operator, rule.expected
                            );
                            return false;
                        }
                    }
                }
                other => {
                    warn!(
                        "rule '{}': left value '{}' is not numeric, expected {} {}",
                        rule.identifier,
                        other.comparison_str(),
                        rule.operator,
                        rule.expected
                    );
                    return false;
                }
            };
            match rule.operator {
                Operator::Lt => left < *expected,
                Operator::Le => left <= *expected,
                Operator::Gt => left > *expected,
                Operator::Ge => left >= *expected,
                Operator::EqNum => left == *expected,
                Operator::NeNum => left != *expected,
                _ => false,
            }
        }
        ExpectedValue::Str(expected) => {
            let left = scalar.comparison_str();
            match rule.operator {
                Operator::EqStr => left == *expected,
                Operator::NeStr => left != *expected,
                Operator::PatternMatch => rule
                    .value_pattern
                    .as_ref()
                    .is_some_and(|re| re.is_match(&left)),
                _ => false,
            }
        }
        // Boolean expectations belong to is-missing/is-empty and never
        // reach the comparison predicate.
        ExpectedValue::Bool(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RawRule, RawRuleSet};
    use crate::violation::Severity;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(identifier: &str, condition: &str, value: serde_json::Value) -> Arc<CompiledRule> {
        Arc::new(
            CompiledRule::compile(&RawRule {
                identifier: identifier.to_string(),
                condition: condition.to_string(),
                value,
            })
            .unwrap(),
        )
    }

    fn rule_set(id: &str, rules: Vec<Arc<CompiledRule>>) -> Arc<RuleSet> {
        Arc::new(RuleSet {
            id: id.to_string(),
            severity: Severity::Warning,
            rules,
        })
    }

    fn sstr(s: &str) -> Arc<SpecValue> {
        Arc::new(SpecValue::Scalar(
            Scalar::Str(s.to_string()),
            LineRange::UNKNOWN,
        ))
    }

    fn smap(entries: Vec<(&str, Arc<SpecValue>)>) -> Arc<SpecValue> {
        let mut map = IndexMap::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v);
        }
        Arc::new(SpecValue::Mapping(map))
    }

    fn sseq(items: Vec<Arc<SpecValue>>) -> Arc<SpecValue> {
        Arc::new(SpecValue::Sequence(items))
    }

    fn node(name: &str, path: &str, value: Arc<SpecValue>) -> Arc<SpecNode> {
        Arc::new(SpecNode::new(name, path, value, LineRange::new(3, 9)))
    }

    fn set_of(ruleset: &Arc<RuleSet>) -> MatchSet {
        MatchSet::new(Arc::clone(ruleset))
    }

    #[test]
    fn test_key_missing_match() {
        let r = rule("#->paths->*->get->security", "is-missing", json!("True"));
        let without = node(
            "get",
            "#->paths->/users->get",
            smap(vec![("responses", smap(vec![("200", sstr("ok"))]))]),
        );
        let with = node(
            "get",
            "#->paths->/users->get",
            smap(vec![("security", sseq(vec![])), ("responses", sstr("x"))]),
        );
        assert!(match_node(&r, &without).unwrap());
        assert!(!match_node(&r, &with).unwrap());
    }

    #[test]
    fn test_is_empty_scalar() {
        let r = rule("#->info->description", "is-empty", json!("True"));
        let empty = node("info", "#->info", smap(vec![("description", sstr(""))]));
        let filled = node("info", "#->info", smap(vec![("description", sstr("x"))]));
        assert!(match_node(&r, &empty).unwrap());
        assert!(!match_node(&r, &filled).unwrap());

        let r = rule("#->info->description", "is-empty", json!("False"));
        assert!(match_node(&r, &filled).unwrap());
        assert!(!match_node(&r, &empty).unwrap());
    }

    #[test]
    fn test_is_empty_list_element() {
        // A falsy element anywhere in the sequence triggers the match.
        let r = rule("#->security->*", "is-empty", json!("True"));
        let n = node("security", "#->security", sseq(vec![sstr("oauth"), sstr("")]));
        assert!(match_node(&r, &n).unwrap());

        let n = node("security", "#->security", sseq(vec![sstr("oauth")]));
        assert!(!match_node(&r, &n).unwrap());
    }

    #[test]
    fn test_wildcard_key_and_value_matching() {
        let by_value = rule("#->schemes->*", "eq", json!("http"));
        let n = node(
            "schemes",
            "#->schemes",
            smap(vec![("primary", sstr("https")), ("fallback", sstr("http"))]),
        );
        assert!(match_node(&by_value, &n).unwrap());

        let by_key = rule("#->schemes->*__key__", "eq", json!("fallback"));
        // __key__ redirects the comparison to the matched key name.
        assert_eq!(by_key.match_key, "*");
        assert!(match_node(&by_key, &n).unwrap());

        let miss = rule("#->schemes->*", "eq", json!("ftp"));
        assert!(!match_node(&miss, &n).unwrap());
    }

    #[test]
    fn test_wildcard_skips_line_range_marker() {
        let r = rule("#->responses->*__key__", "pattern-match", json!("^__"));
        let n = node(
            "responses",
            "#->responses",
            smap(vec![(LINE_RANGE_KEY, sstr("3-9")), ("200", sstr("ok"))]),
        );
        assert!(!match_node(&r, &n).unwrap());
    }

    #[test]
    fn test_numeric_coercion_soft_failure() {
        let r = rule("#->info->x-audit->score", "==", json!("5"));
        let ok = node("x-audit", "#->info->x-audit", smap(vec![("score", sstr("5"))]));
        let bad = node("x-audit", "#->info->x-audit", smap(vec![("score", sstr("5a"))]));
        assert!(match_node(&r, &ok).unwrap());
        // Non-numeric left value: no match, not an error.
        assert!(!match_node(&r, &bad).unwrap());
    }

    #[test]
    fn test_line_prefix_marker_stripped_before_comparison() {
        let r = rule("#->info->x-audit->score", "==", json!("5"));
        let n = node(
            "x-audit",
            "#->info->x-audit",
            smap(vec![("score", sstr("__line__5"))]),
        );
        assert!(match_node(&r, &n).unwrap());
    }

    #[test]
    fn test_pattern_match_tests_extracted_value() {
        let r = rule("#->info->contact->email", "pattern-match", json!("@example\\.com$"));
        let hit = node(
            "contact",
            "#->info->contact",
            smap(vec![("email", sstr("api@example.com"))]),
        );
        let miss = node(
            "contact",
            "#->info->contact",
            smap(vec![("email", sstr("api@other.org"))]),
        );
        assert!(match_node(&r, &hit).unwrap());
        assert!(!match_node(&r, &miss).unwrap());
    }

    #[test]
    fn test_concrete_key_against_non_mapping_is_contract_violation() {
        let r = rule("#->paths->*->get->security", "is-missing", json!("True"));
        let n = node("security", "#->paths->/users->get->security", sseq(vec![]));
        let err = match_node(&r, &n).unwrap_err();
        assert!(matches!(err, MatchError::WildcardRequired { .. }));
    }

    #[test]
    fn test_bare_key_rule_compares_node_name() {
        // operation->responses->__key__ style rule: the node's own name
        // (the response code) is the comparison subject.
        let n = node(
            "200",
            "#->paths->/x->get->responses->200",
            smap(vec![("description", sstr("ok"))]),
        );
        let bare = rule("operation->responses->__key__", "<", json!("500"));
        assert_eq!(bare.match_key, "");
        assert!(bare.path_matches("#->paths->/x->get->responses"));
        assert!(match_node(&bare, &n).unwrap());

        let err_node = node(
            "5xx",
            "#->paths->/x->get->responses->5xx",
            smap(vec![("description", sstr("server error"))]),
        );
        assert!(!match_node(&bare, &err_node).unwrap());
    }

    #[test]
    fn test_ref_indirection_resolves_before_matching() {
        let target = node(
            "Pet",
            "#->definitions->Pet",
            smap(vec![("required", sseq(vec![sstr("id")]))]),
        );
        let r = rule("#->paths->*->get->schema->required", "is-missing", json!("False"));
        let ref_node = Arc::new(
            SpecNode::new(
                "schema",
                "#->paths->/pets->get->schema",
                smap(vec![("$ref", sstr("#/definitions/Pet"))]),
                LineRange::UNKNOWN,
            )
            .with_ref_target(Arc::clone(&target)),
        );
        // The $ref target has "required", and the expectation is False
        // (the key must be present).
        assert!(match_node(&r, &ref_node).unwrap());
    }

    #[test]
    fn test_global_memoization_first_success_wins() {
        let rs = rule_set(
            "R-global",
            vec![rule("#->security", "is-missing", json!("True"))],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        let mut globals = GlobalNodes::new();
        // Node A fails (security present), node B succeeds, both at "#".
        let a = node("#", "#", smap(vec![("security", sseq(vec![sstr("x")]))]));
        let b = node("#", "#", smap(vec![("info", sstr("x"))]));
        globals.insert("#".to_string(), vec![a, b]);

        ms.run_global_phase(&globals, &mut sink);
        assert!(ms.global_result());
        assert_eq!(sink.violations.len(), 1);
        assert!(ms.matches[0].global_result());

        // All-global conjunctions are decided in phase 1; the per-API
        // phase never revisits them.
        let api_node = node("get", "#->paths->/q->get", smap(vec![("security", sstr("x"))]));
        let candidates = vec![ApiCandidate {
            path: "#->paths->/q->get".to_string(),
            node: api_node,
            api: crate::node::ApiContext {
                path: "/q".to_string(),
                method: "get".to_string(),
            },
        }];
        ms.run_api_phase(&candidates, &mut sink);
        assert_eq!(sink.violations.len(), 1);
    }

    #[test]
    fn test_mixed_set_uses_memoized_global_result_per_api() {
        let rs = rule_set(
            "R-mixed-memo",
            vec![
                rule("#->security", "is-missing", json!("True")),
                rule("paths->*->get->operationId", "is-missing", json!("True")),
            ],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        let mut globals = GlobalNodes::new();
        globals.insert(
            "#".to_string(),
            vec![node("#", "#", smap(vec![("info", sstr("x"))]))],
        );
        ms.run_global_phase(&globals, &mut sink);
        // Mixed conjunctions never emit from phase 1, but the global
        // member's success is memoized.
        assert!(sink.violations.is_empty());
        assert!(ms.matches[0].global_result());

        let api_node = node(
            "get",
            "#->paths->/q->get",
            smap(vec![("responses", sstr("x"))]),
        );
        let candidates = vec![ApiCandidate {
            path: "#->paths->/q->get".to_string(),
            node: api_node,
            api: crate::node::ApiContext {
                path: "/q".to_string(),
                method: "get".to_string(),
            },
        }];
        ms.run_api_phase(&candidates, &mut sink);
        assert_eq!(sink.violations.len(), 1);
        assert_eq!(sink.violations[0].api.as_ref().unwrap().method, "get");
    }

    #[test]
    fn test_global_phase_evaluates_later_members_after_failure() {
        // First member fails on the candidate, second must still memoize.
        let rs = rule_set(
            "R-two",
            vec![
                rule("#->security", "is-missing", json!("False")),
                rule("#->info->version", "eq", json!("1.0")),
            ],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        let mut globals = GlobalNodes::new();
        globals.insert(
            "#".to_string(),
            vec![node("#", "#", smap(vec![("x", sstr("y"))]))],
        );
        globals.insert(
            "#->info".to_string(),
            vec![node("info", "#->info", smap(vec![("version", sstr("1.0"))]))],
        );

        ms.run_global_phase(&globals, &mut sink);
        // The conjunction never fully matched...
        assert!(!ms.global_result());
        assert!(sink.violations.is_empty());
        // ...but the second member's success was memoized anyway.
        assert!(!ms.matches[0].global_result());
        assert!(ms.matches[1].global_result());
    }

    #[test]
    fn test_api_phase_fails_fast_on_global_miss() {
        let rs = rule_set(
            "R-mixed",
            vec![
                rule("#->security", "is-missing", json!("True")),
                rule("paths->*->get->operationId", "is-missing", json!("True")),
            ],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        // No global phase run: the global member never matched, so every
        // per-API conjunction fails immediately.
        let api_node = node("get", "#->paths->/q->get", smap(vec![("responses", sstr("x"))]));
        let candidates = vec![ApiCandidate {
            path: "#->paths->/q->get".to_string(),
            node: api_node,
            api: crate::node::ApiContext {
                path: "/q".to_string(),
                method: "get".to_string(),
            },
        }];
        ms.run_api_phase(&candidates, &mut sink);
        assert!(sink.violations.is_empty());
    }

    #[test]
    fn test_ref_phase_tags_node_only() {
        let rs = rule_set(
            "R-ref",
            vec![rule("definitions->Pet->required", "is-missing", json!("True"))],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        let target = node(
            "Pet",
            "#->definitions->Pet",
            smap(vec![("type", sstr("object"))]),
        );
        ms.run_ref_phase(&[target], &mut sink);
        assert_eq!(sink.violations.len(), 1);
        assert!(sink.violations[0].api.is_none());
        assert_eq!(sink.violations[0].path, "#->definitions->Pet");
    }

    #[test]
    fn test_contract_violation_reported_not_fatal() {
        let rs = rule_set(
            "R-contract",
            vec![rule("#->tags->name", "eq", json!("pets"))],
        );
        let mut ms = set_of(&rs);
        let mut sink = EvalSink::new();

        let mut globals = GlobalNodes::new();
        // tags is a sequence; a concrete match key is a contract violation.
        globals.insert(
            "#->tags".to_string(),
            vec![node("tags", "#->tags", sseq(vec![sstr("pets")]))],
        );

        ms.run_global_phase(&globals, &mut sink);
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.violations.is_empty());
    }

    #[test]
    fn test_description_format() {
        let rs = rule_set(
            "R-desc",
            vec![
                rule("#->paths->*->get->security", "is-missing", json!("True")),
                rule("#->info->version", "eq", json!("1.0")),
            ],
        );
        let ms = set_of(&rs);
        let desc = ms.describe("#->paths->/users->get", LineRange::new(12, 20));
        assert_eq!(
            desc,
            "(#->paths->/users->get->security is-missing True)[12-20] and \
             (#->paths->/users->get->version eq 1.0)[12-20]"
        );
    }
}
