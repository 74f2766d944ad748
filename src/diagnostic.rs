//! Diagnostic types for analysis results

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - never fails a unit
    Warning,
    /// Error - fails the owning unit
    #[default]
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

/// Source span, 1-based lines and columns (columns count characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: PathBuf,
    /// Start line
    pub line: usize,
    /// Start column
    pub column: usize,
    /// End line
    pub end_line: usize,
    /// End column (exclusive)
    pub end_column: usize,
}

impl Location {
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    pub fn with_end(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }
}

/// A finding produced by the compile gate or by a rule detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule ID (detector id, or compiler code such as `CS0246`)
    pub rule_id: String,
    /// Severity level
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Source location; `None` for name-only findings
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a positioned diagnostic
    pub fn new(rule_id: &str, severity: Severity, message: &str, location: Location) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            location: Some(location),
        }
    }

    /// Create a diagnostic that is keyed by name only and carries no position
    pub fn unlocated(rule_id: &str, severity: Severity, message: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            location: None,
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Accumulates the findings of one unit.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    keys: HashSet<String>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic unconditionally
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a diagnostic unless one with the same key was already recorded.
    /// Returns true if it was recorded.
    pub fn push_once(&mut self, key: &str, diagnostic: Diagnostic) -> bool {
        if !self.keys.insert(key.to_string()) {
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Hand the collected diagnostics over, in insertion order
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("INFO".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_diagnostic_creation() {
        let loc = Location::new(PathBuf::from("a.cs"), 3, 7).with_end(3, 11);
        let diag = Diagnostic::new("non-ascii-identifiers", Severity::Error, "bad", loc);

        assert!(diag.is_error());
        assert!(!diag.is_warning());
        let loc = diag.location.as_ref().unwrap();
        assert_eq!((loc.line, loc.column, loc.end_line, loc.end_column), (3, 7, 3, 11));
    }

    #[test]
    fn test_unlocated_diagnostic() {
        let diag = Diagnostic::unlocated("virtual-inheritance", Severity::Error, "N.IA");
        assert!(diag.location.is_none());
    }

    #[test]
    fn test_collector_push_once() {
        let mut collector = DiagnosticCollector::new();
        let d = Diagnostic::unlocated("r", Severity::Error, "IA");
        assert!(collector.push_once("IA", d.clone()));
        assert!(!collector.push_once("IA", d.clone()));
        collector.push(d);
        assert_eq!(collector.len(), 2);
        assert!(collector.has_errors());
    }

    #[test]
    fn test_collector_warnings_are_not_errors() {
        let mut collector = DiagnosticCollector::new();
        collector.push(Diagnostic::unlocated("CS0436", Severity::Warning, "shadowed"));
        assert!(!collector.is_empty());
        assert!(!collector.has_errors());
    }
}
