//! Line-oriented text output
//!
//! The line shapes are a stable contract:
//!
//! ```text
//! [ERROR]: <file>(<line>,<column>): <message>
//! [ERROR]: <message>
//! Result of analysis: analysis is succeeded|failed
//! ```

use super::{OutputFormatter, Report};
use crate::diagnostic::{Diagnostic, Severity};
use colored::*;

/// Text formatter with optional color support
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter {
    /// Color the severity tag
    pub colored: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&self, severity: Severity) -> ColoredString {
        let s = format!("[{}]", severity.to_string().to_uppercase());
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    /// `[SEVERITY]: message`
    pub fn tagged(&self, severity: Severity, message: &str) -> String {
        format!("{}: {}", self.tag(severity), message)
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &Report) -> String {
        format!("Result of analysis: analysis is {}", report.verdict)
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        match &diag.location {
            Some(loc) => format!(
                "{}: {}({},{}): {}",
                self.tag(diag.severity),
                loc.file.display(),
                loc.line,
                loc.column,
                diag.message
            ),
            None => self.tagged(diag.severity, &diag.message),
        }
    }
}
