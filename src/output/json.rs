//! JSON output formatter

use super::OutputFormatter;
use crate::engine::ScanResult;
use crate::violation::Violation;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    violations: &'a [Violation],
    errors: &'a [String],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    files_processed: usize,
    files_with_violations: usize,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &ScanResult) -> String {
        let output = JsonOutput {
            violations: &result.violations,
            errors: &result.errors,
            summary: JsonSummary {
                files_processed: result.files_processed,
                files_with_violations: result.files_with_violations,
                error_count: result.error_count,
                warning_count: result.warning_count,
                info_count: result.info_count,
                duration_ms: result.duration.as_millis(),
            },
        };

        if self.pretty {
            serde_json::to_string_pretty(&output).unwrap_or_default()
        } else {
            serde_json::to_string(&output).unwrap_or_default()
        }
    }

    fn format_violation(&self, violation: &Violation) -> String {
        if self.pretty {
            serde_json::to_string_pretty(violation).unwrap_or_default()
        } else {
            serde_json::to_string(violation).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LineRange;
    use crate::violation::Severity;

    #[test]
    fn test_json_format_violation() {
        let formatter = JsonFormatter::new();
        let violation = Violation::new(
            "no-open-get",
            Severity::Error,
            "(#->security is-missing True)[0-0]".to_string(),
            "#",
            LineRange::UNKNOWN,
        );

        let output = formatter.format_violation(&violation);
        assert!(output.contains("\"rule_set\":\"no-open-get\""));
        assert!(output.contains("\"severity\":\"error\""));
    }

    #[test]
    fn test_json_format_result() {
        let formatter = JsonFormatter::new();
        let result = ScanResult {
            files_processed: 5,
            error_count: 2,
            warning_count: 3,
            ..Default::default()
        };

        let output = formatter.format(&result);
        assert!(output.contains("\"files_processed\":5"));
        assert!(output.contains("\"error_count\":2"));
        assert!(output.contains("\"warning_count\":3"));
    }

    #[test]
    fn test_json_pretty() {
        let formatter = JsonFormatter::new().pretty();
        let violation = Violation::new(
            "r",
            Severity::Warning,
            String::new(),
            "#",
            LineRange::UNKNOWN,
        );

        let output = formatter.format_violation(&violation);
        assert!(output.contains('\n'));
    }
}
