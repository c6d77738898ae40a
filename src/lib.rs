//! Specguard - Rule-driven API spec security scanner
//!
//! A fast scanner for OpenAPI-style specification documents, driven by
//! declarative JSON rule files. Rule identifiers are `->`-separated path
//! expressions that compile to anchored regexes over spec-tree paths;
//! a rule set is a conjunction of such rules and raises one violation per
//! fully matched context.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> MatchSet -> SpecDocument candidates -> Violations
//! ```
//!
//! The engine compiles the rule file once, parses each spec into a
//! [`document::SpecDocument`] and evaluates every rule set in three phases:
//! global (whole document, memoized), per-API operation and per-`$ref`
//! target.
//!
//! # Rule files
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "ruleid": "no-open-get",
//!       "severity": "warning",
//!       "rule": [
//!         {"identifier": "#->paths->*->get->security", "condition": "is-missing", "value": "True"}
//!       ]
//!     }
//!   ]
//! }
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod matcher;
pub mod node;
pub mod output;
pub mod rule;
pub mod stats;
pub mod violation;

// Re-export main types
pub use config::{ColorMode, Config, ConfigError, OutputFormat};
pub use document::{DocumentError, SpecDocument};
pub use engine::{Engine, RuleSetDiagnostic, RuleSetTiming, ScanResult};
pub use matcher::{EvalSink, Match, MatchError, MatchSet};
pub use node::{ApiCandidate, ApiContext, GlobalNodes, LineRange, Scalar, SpecNode, SpecValue};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use rule::{CompiledRule, Condition, Operator, RuleError, RuleFile, RuleSet, Scope, ValueSource};
pub use stats::{SpecStats, SpecVersion};
pub use violation::{Severity, Violation};
