//! Reporting of unit outcomes and the final verdict
//!
//! A [`Reporter`] owns the output and error sinks together with the
//! verbosity level, format and color mode, and is passed explicitly through
//! the processors.

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::{OutputConfig, OutputFormat, OutputLevel};
use crate::diagnostic::{Diagnostic, Severity};
use crate::engine::{Event, UnitOutcome, Verdict};
use std::io::Write;
use std::path::PathBuf;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the whole run, written once at the end
    fn format(&self, report: &Report) -> String;

    /// Format a single diagnostic line
    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String;
}

/// Per-unit record kept for the final report
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub path: PathBuf,
    pub verdict: Verdict,
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything flushed so far
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub units: Vec<UnitReport>,
    /// Failures not tied to a unit (unreadable projects and the like)
    pub failures: Vec<String>,
    pub verdict: Verdict,
}

impl Report {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn failed_units(&self) -> usize {
        self.units.iter().filter(|u| !u.verdict.is_pass()).count()
    }

    fn count(&self, severity: Severity) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    }
}

pub struct Reporter {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    level: OutputLevel,
    format: OutputFormat,
    text: TextFormatter,
    report: Report,
}

impl Reporter {
    pub fn new(
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
        config: &OutputConfig,
        colored: bool,
    ) -> Self {
        Self {
            out,
            err,
            level: config.level,
            format: config.format,
            text: TextFormatter { colored },
            report: Report::default(),
        }
    }

    /// Reporter on the process's standard streams
    pub fn stdio(config: &OutputConfig, colored: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()), config, colored)
    }

    pub fn level(&self) -> OutputLevel {
        self.level
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    fn streaming(&self) -> bool {
        self.format == OutputFormat::Text
    }

    fn write_out(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{}", line) {
            log::warn!("Failed to write output: {}", err);
        }
    }

    pub fn info(&mut self, message: &str) {
        if self.streaming() && self.level.shows(Severity::Info) {
            let line = self.text.tagged(Severity::Info, message);
            self.write_out(&line);
        }
    }

    /// Failure notice; always shown
    pub fn failure(&mut self, message: &str) {
        self.report.failures.push(message.to_string());
        if self.streaming() {
            let line = self.text.tagged(Severity::Error, message);
            self.write_out(&line);
        }
    }

    pub fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        if self.streaming() && self.level.shows(diagnostic.severity) {
            let line = self.text.format_diagnostic(diagnostic);
            self.write_out(&line);
        }
    }

    pub fn emit(&mut self, event: &Event) {
        match event {
            Event::Info(message) => self.info(message),
            Event::Diagnostic(diagnostic) => self.diagnostic(diagnostic),
            Event::Failure(message) => {
                if self.streaming() {
                    let line = self.text.tagged(Severity::Error, message);
                    self.write_out(&line);
                }
            }
        }
    }

    /// Flush one unit's events and record it for the final report
    pub fn unit(&mut self, outcome: &UnitOutcome) {
        for event in &outcome.events {
            self.emit(event);
        }
        self.report.units.push(UnitReport {
            path: outcome.path.clone(),
            verdict: outcome.verdict,
            diagnostics: outcome.diagnostics().cloned().collect(),
        });
    }

    /// Write the final summary (text) or the whole document (JSON)
    pub fn finish(&mut self, verdict: Verdict) {
        self.report.verdict = verdict;
        let rendered = match self.format {
            OutputFormat::Text => self.text.format(&self.report),
            OutputFormat::Json => JsonFormatter::new().pretty().format(&self.report),
        };
        self.write_out(&rendered);
        if let Err(err) = self.out.flush() {
            log::warn!("Failed to flush output: {}", err);
        }
    }

    /// Fatal error on the error stream; bypasses level and format
    pub fn fatal(&mut self, message: &str) {
        let line = self.text.tagged(Severity::Error, message);
        if let Err(err) = writeln!(self.err, "{}", line) {
            log::warn!("Failed to write error output: {}", err);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::reporter;
    use super::*;
    use crate::diagnostic::Location;
    use pretty_assertions::assert_eq;

    fn outcome() -> UnitOutcome {
        UnitOutcome {
            path: PathBuf::from("A.cs"),
            verdict: Verdict::FAIL,
            events: vec![
                Event::Info("Processing of the file A.cs is started".to_string()),
                Event::Diagnostic(Diagnostic::new(
                    "CS1030",
                    Severity::Warning,
                    "CS1030: #warning: 'check'",
                    Location::new(PathBuf::from("A.cs"), 1, 1),
                )),
                Event::Diagnostic(Diagnostic::new(
                    "non-ascii-identifiers",
                    Severity::Error,
                    "Found non-ASCII identifier \"é\"",
                    Location::new(PathBuf::from("A.cs"), 2, 7),
                )),
                Event::Info("Processing of the file A.cs is finished".to_string()),
            ],
        }
    }

    #[test]
    fn test_error_level_shows_errors_only() {
        let (mut reporter, out, err) = reporter(OutputLevel::Error, OutputFormat::Text);
        reporter.unit(&outcome());
        reporter.finish(Verdict::FAIL);
        assert_eq!(
            out.contents(),
            "[ERROR]: A.cs(2,7): Found non-ASCII identifier \"é\"\nResult of analysis: analysis is failed\n"
        );
        assert_eq!(err.contents(), "");
    }

    #[test]
    fn test_info_level_shows_narration() {
        let (mut reporter, out, _) = reporter(OutputLevel::Info, OutputFormat::Text);
        reporter.unit(&outcome());
        reporter.finish(Verdict::FAIL);
        let text = out.contents();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[INFO]: Processing of the file A.cs is started");
        assert_eq!(lines[1], "[WARNING]: A.cs(1,1): CS1030: #warning: 'check'");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_json_defers_everything() {
        let (mut reporter, out, _) = reporter(OutputLevel::Info, OutputFormat::Json);
        reporter.info("narration");
        reporter.unit(&outcome());
        assert_eq!(out.contents(), "");
        reporter.finish(Verdict::FAIL);

        let value: serde_json::Value = serde_json::from_str(&out.contents()).unwrap();
        assert_eq!(value["verdict"], "failed");
        assert_eq!(value["units"][0]["diagnostics"].as_array().unwrap().len(), 2);
        assert_eq!(value["summary"]["error_count"], 1);
    }

    #[test]
    fn test_fatal_goes_to_error_stream() {
        let (mut reporter, out, err) = reporter(OutputLevel::Error, OutputFormat::Json);
        reporter.fatal("Bad (unknown) target nowhere.cs");
        assert_eq!(out.contents(), "");
        assert_eq!(err.contents(), "[ERROR]: Bad (unknown) target nowhere.cs\n");
    }

    #[test]
    fn test_report_counts() {
        let (mut reporter, _, _) = reporter(OutputLevel::Error, OutputFormat::Text);
        reporter.unit(&outcome());
        reporter.failure("Bad (unknown) target B.csproj");
        let report = reporter.report();
        assert_eq!((report.error_count(), report.warning_count()), (1, 1));
        assert_eq!(report.failed_units(), 1);
        assert_eq!(report.failures.len(), 1);
    }
}
