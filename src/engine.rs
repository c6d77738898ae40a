//! Core scan engine
//!
//! Compiles a rule file into rule sets, evaluates them against spec
//! documents and aggregates the results. Spec files are processed in
//! parallel when configured.

use crate::config::Config;
use crate::document::SpecDocument;
use crate::matcher::{EvalSink, MatchSet};
use crate::rule::{RuleError, RuleFile, RuleSet};
use crate::violation::{Severity, Violation};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A rule set that failed to compile, with the member error that
/// invalidated it.
#[derive(Debug)]
pub struct RuleSetDiagnostic {
    pub id: String,
    pub error: RuleError,
}

/// Per-rule-set timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleSetTiming {
    /// Rule set ID
    pub rule_set_id: String,
    /// Total time spent on this rule set
    pub total_time: Duration,
    /// Number of rule evaluations performed
    pub evaluation_count: usize,
    /// Number of violations found
    pub match_count: usize,
}

impl RuleSetTiming {
    pub fn new(rule_set_id: &str) -> Self {
        Self {
            rule_set_id: rule_set_id.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// All violations
    pub violations: Vec<Violation>,

    /// Rendered conjunction descriptions, in emission order
    pub descriptions: Vec<String>,

    /// Operational errors: unreadable files, parse failures, rule/spec
    /// contract violations
    pub errors: Vec<String>,

    /// Files processed
    pub files_processed: usize,

    /// Files with at least one violation
    pub files_with_violations: usize,

    /// Violations by severity
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule-set timing statistics (rule set id -> timing)
    pub timings: HashMap<String, RuleSetTiming>,
}

impl ScanResult {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.errors.is_empty()
    }

    /// Get exit code (0 = clean, 1 = violations, 2 = errors or
    /// error-severity violations)
    pub fn exit_code(&self) -> i32 {
        if !self.errors.is_empty() || self.error_count > 0 {
            2
        } else if self.has_violations() {
            1
        } else {
            0
        }
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ScanResult) {
        self.violations.extend(other.violations);
        self.descriptions.extend(other.descriptions);
        self.errors.extend(other.errors);
        self.files_processed += other.files_processed;
        self.files_with_violations += other.files_with_violations;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;

        for (id, timing) in other.timings {
            let entry = self
                .timings
                .entry(id)
                .or_insert_with(|| RuleSetTiming::new(&timing.rule_set_id));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.match_count += timing.match_count;
        }
    }

    /// Get timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleSetTiming> {
        let mut timings: Vec<_> = self.timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }

    /// Format timing statistics as a string
    pub fn format_timings(&self) -> String {
        let mut output = String::new();
        let timings = self.sorted_timings();

        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        output.push_str("Rule Set Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>10} {:>12}\n",
            "Rule Set", "Total", "Avg", "Evals", "Matches"
        ));
        output.push_str(&"-".repeat(90));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;

            output.push_str(&format!(
                "{:<40} {:>10.2}ms {:>10.2}µs {:>10} {:>12}\n",
                timing.rule_set_id, total_ms, avg_us, timing.evaluation_count, timing.match_count
            ));
        }

        output
    }
}

/// The main scan engine
pub struct Engine {
    /// Configuration
    config: Config,

    /// Compiled, enabled rule sets
    rule_sets: Vec<Arc<RuleSet>>,

    /// Rule sets that failed to compile
    invalid: Vec<RuleSetDiagnostic>,
}

impl Engine {
    /// Create a new engine with configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rule_sets: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Compile and register the rule sets of a rule file. Disabled sets are
    /// skipped; sets with a compile error are excluded and recorded.
    pub fn load_rules(&mut self, file: &RuleFile) {
        for raw in &file.rules {
            if !self.config.is_rule_set_enabled(&raw.ruleid) {
                debug!("rule set '{}' disabled by configuration", raw.ruleid);
                continue;
            }
            match RuleSet::compile(raw) {
                Ok(mut rule_set) => {
                    if let Some(severity) = self.config.get_severity_override(&rule_set.id) {
                        rule_set.severity = severity;
                    }
                    self.rule_sets.push(Arc::new(rule_set));
                }
                Err(error) => {
                    self.invalid.push(RuleSetDiagnostic {
                        id: raw.ruleid.clone(),
                        error,
                    });
                }
            }
        }
        info!(
            "loaded {} rule sets ({} invalid)",
            self.rule_sets.len(),
            self.invalid.len()
        );
    }

    pub fn rule_sets(&self) -> &[Arc<RuleSet>] {
        &self.rule_sets
    }

    pub fn invalid_rule_sets(&self) -> &[RuleSetDiagnostic] {
        &self.invalid
    }

    /// Scan multiple spec files
    pub fn scan(&self, files: &[PathBuf]) -> ScanResult {
        let start = Instant::now();

        let results: Vec<ScanResult> = if self.config.engine.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(if self.config.engine.jobs > 0 {
                    self.config.engine.jobs
                } else {
                    num_cpus::get()
                })
                .build()
                .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().unwrap());

            pool.install(|| files.par_iter().map(|f| self.scan_file(f)).collect())
        } else {
            files.iter().map(|f| self.scan_file(f)).collect()
        };

        let mut combined = ScanResult::default();
        for result in results {
            combined.merge(result);
        }

        combined.duration = start.elapsed();
        combined
    }

    /// Scan a single spec file
    pub fn scan_file(&self, path: &Path) -> ScanResult {
        let mut result = ScanResult {
            files_processed: 1,
            ..ScanResult::default()
        };

        let document = match SpecDocument::from_file(path) {
            Ok(d) => d,
            Err(e) => {
                result.errors.push(e.to_string());
                return result;
            }
        };

        result.merge(self.evaluate(&document));
        result
    }

    /// Evaluate all rule sets against one parsed document. Match state is
    /// created fresh per document; nothing carries over between runs.
    pub fn evaluate(&self, document: &SpecDocument) -> ScanResult {
        let mut result = ScanResult::default();

        for rule_set in &self.rule_sets {
            let start = Instant::now();
            let mut match_set = MatchSet::new(Arc::clone(rule_set));
            let mut sink = EvalSink::new();

            match_set.run_global_phase(&document.global_nodes, &mut sink);
            match_set.run_api_phase(&document.api_candidates, &mut sink);
            match_set.run_ref_phase(&document.ref_candidates, &mut sink);

            let timing = result
                .timings
                .entry(rule_set.id.clone())
                .or_insert_with(|| RuleSetTiming::new(&rule_set.id));
            timing.total_time += start.elapsed();
            timing.evaluation_count += match_set.evaluations();
            timing.match_count += sink.violations.len();

            for mut violation in sink.violations {
                violation.file = document.file.clone();
                match violation.severity {
                    Severity::Error => result.error_count += 1,
                    Severity::Warning => result.warning_count += 1,
                    Severity::Info => result.info_count += 1,
                }
                result.violations.push(violation);
            }
            result.descriptions.extend(sink.descriptions);
            result.errors.extend(sink.errors.iter().map(|e| e.to_string()));
        }

        if result.has_violations() {
            result.files_with_violations = 1;
        }
        result
    }
}
