//! Violation records emitted by matched rule conjunctions

use crate::node::{ApiContext, LineRange};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity level of a violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding
    Info,
    /// Potential security/design issue
    #[default]
    Warning,
    /// Definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// One record per fully satisfied rule conjunction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Id of the rule set whose conjunction matched.
    pub rule_set: String,

    /// Severity configured on the rule set.
    pub severity: Severity,

    /// Rendered conjunction description for audit purposes, e.g.
    /// `(#->paths->/users->get->security is-missing True)[12-20]`.
    pub description: String,

    /// Path string of the matched node.
    pub path: String,

    /// Source line range of the matched node.
    pub lines: LineRange,

    /// Owning API operation, present for per-API phase matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiContext>,

    /// Spec file this violation was found in, stamped by the engine.
    #[serde(default)]
    pub file: PathBuf,
}

impl Violation {
    pub fn new(
        rule_set: &str,
        severity: Severity,
        description: String,
        path: &str,
        lines: LineRange,
    ) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            severity,
            description,
            path: path.to_string(),
            lines,
            api: None,
            file: PathBuf::new(),
        }
    }

    pub fn with_api(mut self, api: ApiContext) -> Self {
        self.api = Some(api);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_and_display() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("ERROR".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("note".parse::<Severity>().unwrap(), Severity::Info);
        assert!("loud".parse::<Severity>().is_err());
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_violation_serialization_skips_missing_api() {
        let v = Violation::new(
            "R1",
            Severity::Warning,
            "(#->security is-missing True)[0-0]".to_string(),
            "#",
            LineRange::UNKNOWN,
        );
        let json = serde_json::to_string(&v).unwrap();
        assert!(!json.contains("\"api\""));

        let v = v.with_api(ApiContext {
            path: "/users".to_string(),
            method: "get".to_string(),
        });
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"api\""));
    }
}
