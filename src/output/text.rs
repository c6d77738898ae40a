//! Human-readable text output formatter

use super::OutputFormatter;
use crate::engine::ScanResult;
use crate::violation::{Severity, Violation};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the matched conjunction description
    pub show_descriptions: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_descriptions: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn format_location(&self, violation: &Violation) -> String {
        if violation.lines.is_known() {
            format!("{}:{}", violation.file.display(), violation.lines.start)
        } else {
            violation.file.display().to_string()
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &ScanResult) -> String {
        let mut output = String::new();

        // Group violations by file
        let mut by_file: std::collections::BTreeMap<_, Vec<_>> = std::collections::BTreeMap::new();
        for violation in &result.violations {
            by_file
                .entry(violation.file.clone())
                .or_default()
                .push(violation);
        }

        for (file, violations) in &by_file {
            if self.colored {
                output.push_str(&format!("{}\n", file.display().to_string().underline()));
            } else {
                output.push_str(&format!("{}\n", file.display()));
            }

            for violation in violations {
                output.push_str(&self.format_violation(violation));
                output.push('\n');
            }
            output.push('\n');
        }

        // Operational errors
        for error in &result.errors {
            let prefix = if self.colored {
                "error".red().bold().to_string()
            } else {
                "error".to_string()
            };
            output.push_str(&format!("{}: {}\n", prefix, error));
        }

        // Statistics
        if self.show_stats {
            output.push_str(&format!(
                "\n{} {} processed",
                result.files_processed,
                if result.files_processed == 1 {
                    "spec"
                } else {
                    "specs"
                }
            ));

            let mut counts = Vec::new();
            if result.error_count > 0 {
                let s = format!(
                    "{} {}",
                    result.error_count,
                    if result.error_count == 1 {
                        "error"
                    } else {
                        "errors"
                    }
                );
                counts.push(if self.colored {
                    s.red().to_string()
                } else {
                    s
                });
            }
            if result.warning_count > 0 {
                let s = format!(
                    "{} {}",
                    result.warning_count,
                    if result.warning_count == 1 {
                        "warning"
                    } else {
                        "warnings"
                    }
                );
                counts.push(if self.colored {
                    s.yellow().to_string()
                } else {
                    s
                });
            }
            if result.info_count > 0 {
                let s = format!(
                    "{} {}",
                    result.info_count,
                    if result.info_count == 1 { "info" } else { "infos" }
                );
                counts.push(if self.colored {
                    s.blue().to_string()
                } else {
                    s
                });
            }

            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                result.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let mut output = String::new();

        let rule_set = if self.colored {
            violation.rule_set.cyan().to_string()
        } else {
            violation.rule_set.clone()
        };

        output.push_str(&format!(
            "{}: {}[{}]: {}\n",
            self.format_location(violation),
            self.severity_str(violation.severity),
            rule_set,
            violation.path
        ));

        if let Some(api) = &violation.api {
            output.push_str(&format!(
                "   {} api: {}\n",
                if self.colored {
                    "=".blue().to_string()
                } else {
                    "=".to_string()
                },
                api
            ));
        }

        if self.show_descriptions {
            output.push_str(&format!(
                "   {} matched: {}\n",
                if self.colored {
                    "=".blue().to_string()
                } else {
                    "=".to_string()
                },
                violation.description
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ApiContext, LineRange};

    fn violation() -> Violation {
        let mut v = Violation::new(
            "no-open-get",
            Severity::Warning,
            "(#->paths->/users->get->security is-missing True)[12-20]".to_string(),
            "#->paths->/users->get",
            LineRange::new(12, 20),
        )
        .with_api(ApiContext {
            path: "/users".to_string(),
            method: "get".to_string(),
        });
        v.file = "api.json".into();
        v
    }

    #[test]
    fn test_format_violation() {
        let formatter = TextFormatter::new().without_color();
        let output = formatter.format_violation(&violation());
        assert!(output.contains("api.json:12"));
        assert!(output.contains("warning"));
        assert!(output.contains("no-open-get"));
        assert!(output.contains("#->paths->/users->get"));
        assert!(output.contains("api: get /users"));
        assert!(output.contains("matched: (#->paths->/users->get->security is-missing True)"));
    }

    #[test]
    fn test_format_result() {
        let formatter = TextFormatter::new().without_color();
        let result = ScanResult {
            violations: vec![violation()],
            files_processed: 1,
            warning_count: 1,
            ..Default::default()
        };

        let output = formatter.format(&result);
        assert!(output.contains("1 spec processed"));
        assert!(output.contains("1 warning"));
    }

    #[test]
    fn test_operational_errors_reported() {
        let formatter = TextFormatter::new().without_color();
        let result = ScanResult {
            errors: vec!["failed to read 'missing.json'".to_string()],
            files_processed: 1,
            ..Default::default()
        };

        let output = formatter.format(&result);
        assert!(output.contains("error: failed to read 'missing.json'"));
    }
}
