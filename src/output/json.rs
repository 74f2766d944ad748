//! JSON output formatter

use super::{OutputFormatter, Report};
use crate::diagnostic::Diagnostic;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|err| {
            log::error!("Failed to serialize report: {}", err);
            String::new()
        })
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    verdict: String,
    units: Vec<JsonUnit<'a>>,
    failures: &'a [String],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonUnit<'a> {
    file: String,
    verdict: String,
    diagnostics: Vec<JsonDiagnostic<'a>>,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    rule_id: &'a str,
    severity: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_column: Option<usize>,
}

#[derive(Serialize)]
struct JsonSummary {
    units_processed: usize,
    units_failed: usize,
    error_count: usize,
    warning_count: usize,
}

fn json_diagnostic(d: &Diagnostic) -> JsonDiagnostic<'_> {
    JsonDiagnostic {
        rule_id: &d.rule_id,
        severity: match d.severity {
            crate::diagnostic::Severity::Error => "error",
            crate::diagnostic::Severity::Warning => "warning",
            crate::diagnostic::Severity::Info => "info",
        },
        message: &d.message,
        file: d.location.as_ref().map(|l| l.file.display().to_string()),
        line: d.location.as_ref().map(|l| l.line),
        column: d.location.as_ref().map(|l| l.column),
        end_line: d.location.as_ref().map(|l| l.end_line),
        end_column: d.location.as_ref().map(|l| l.end_column),
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> String {
        let units = report
            .units
            .iter()
            .map(|u| JsonUnit {
                file: u.path.display().to_string(),
                verdict: u.verdict.to_string(),
                diagnostics: u.diagnostics.iter().map(json_diagnostic).collect(),
            })
            .collect();

        self.render(&JsonOutput {
            verdict: report.verdict.to_string(),
            units,
            failures: &report.failures,
            summary: JsonSummary {
                units_processed: report.units.len(),
                units_failed: report.failed_units(),
                error_count: report.error_count(),
                warning_count: report.warning_count(),
            },
        })
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.render(&json_diagnostic(diagnostic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Location, Severity};
    use crate::engine::Verdict;
    use crate::output::UnitReport;
    use std::path::PathBuf;

    #[test]
    fn test_json_format_diagnostic() {
        let formatter = JsonFormatter::new();
        let diag = Diagnostic::new(
            "non-ascii-identifiers",
            Severity::Error,
            "Found non-ASCII identifier \"é\"",
            Location::new(PathBuf::from("A.cs"), 10, 5).with_end(10, 6),
        );

        let output = formatter.format_diagnostic(&diag);
        assert!(output.contains("\"rule_id\":\"non-ascii-identifiers\""));
        assert!(output.contains("\"severity\":\"error\""));
        assert!(output.contains("\"line\":10"));
        assert!(output.contains("\"end_column\":6"));
    }

    #[test]
    fn test_unlocated_diagnostic_has_no_position() {
        let diag = Diagnostic::unlocated("virtual-inheritance", Severity::Error, "IA");
        let output = JsonFormatter::new().format_diagnostic(&diag);
        assert!(!output.contains("\"line\""));
        assert!(!output.contains("\"file\""));
    }

    #[test]
    fn test_json_format_report() {
        let report = Report {
            units: vec![
                UnitReport {
                    path: PathBuf::from("A.cs"),
                    verdict: Verdict::PASS,
                    diagnostics: Vec::new(),
                },
                UnitReport {
                    path: PathBuf::from("B.cs"),
                    verdict: Verdict::FAIL,
                    diagnostics: vec![Diagnostic::unlocated("virtual-inheritance", Severity::Error, "IA")],
                },
            ],
            failures: Vec::new(),
            verdict: Verdict::FAIL,
        };

        let value: serde_json::Value = serde_json::from_str(&JsonFormatter::new().format(&report)).unwrap();
        assert_eq!(value["verdict"], "failed");
        assert_eq!(value["units"][0]["verdict"], "succeeded");
        assert_eq!(value["summary"]["units_processed"], 2);
        assert_eq!(value["summary"]["units_failed"], 1);
        assert_eq!(value["summary"]["error_count"], 1);
    }

    #[test]
    fn test_json_pretty() {
        let output = JsonFormatter::new().pretty().format(&Report::default());
        assert!(output.contains('\n'));
    }
}
