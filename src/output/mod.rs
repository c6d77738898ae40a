//! Output formatters for scan results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::engine::ScanResult;
use crate::violation::Violation;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire scan result
    fn format(&self, result: &ScanResult) -> String;

    /// Format a single violation
    fn format_violation(&self, violation: &Violation) -> String;
}
