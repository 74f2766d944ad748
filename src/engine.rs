//! Unit processing: compile gate, then every enabled detector

use crate::config::Config;
use crate::csharp::{Compilation, TreeId};
use crate::diagnostic::{Diagnostic, DiagnosticCollector, Severity};
use crate::model::{ParsedUnit, SemanticModel};
use crate::rules::{Detector, RuleSettings};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pass/fail result of a unit, project or solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict(bool);

impl Verdict {
    pub const PASS: Verdict = Verdict(true);
    pub const FAIL: Verdict = Verdict(false);

    pub fn is_pass(self) -> bool {
        self.0
    }

    /// Conjunction over any number of verdicts; every item is consumed
    pub fn all(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
        verdicts.into_iter().fold(Verdict::PASS, |acc, v| acc & v)
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::PASS
    }
}

impl From<bool> for Verdict {
    fn from(pass: bool) -> Self {
        Verdict(pass)
    }
}

impl std::ops::BitAnd for Verdict {
    type Output = Verdict;

    fn bitand(self, rhs: Verdict) -> Verdict {
        Verdict(self.0 & rhs.0)
    }
}

impl std::ops::BitAndAssign for Verdict {
    fn bitand_assign(&mut self, rhs: Verdict) {
        self.0 &= rhs.0;
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if self.0 { "succeeded" } else { "failed" })
    }
}

/// Something a unit run wants reported, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Progress narration
    Info(String),
    Diagnostic(Diagnostic),
    /// Notice that a unit or target failed without a finding of its own
    Failure(String),
}

/// Result of one unit, ready to be flushed to a reporter
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub path: PathBuf,
    pub verdict: Verdict,
    pub events: Vec<Event>,
}

impl UnitOutcome {
    /// Outcome of a unit whose text could not be read
    pub fn unreadable(path: &Path, error: &std::io::Error) -> Self {
        let message = format!(
            "CS2001: Source file '{}' could not be read: {}",
            path.display(),
            error
        );
        Self {
            path: path.to_path_buf(),
            verdict: Verdict::FAIL,
            events: vec![
                Event::Info(format!("Processing of the file {} is started", path.display())),
                Event::Diagnostic(Diagnostic::unlocated("CS2001", Severity::Error, &message)),
                Event::Failure(format!("Bad (unknown) target {}", path.display())),
            ],
        }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter_map(|e| match e {
            Event::Diagnostic(d) => Some(d),
            _ => None,
        })
    }
}

/// Runs the compile gate and the detectors over units
#[derive(Debug, Clone)]
pub struct Engine {
    detectors: Vec<Detector>,
    settings: RuleSettings,
    parallel: bool,
    jobs: usize,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self {
            detectors: Detector::enabled(config),
            settings: RuleSettings::from_config(config),
            parallel: config.engine.parallel,
            jobs: config.engine.worker_count(),
        }
    }

    /// Engine with an explicit detector list and settings, run sequentially
    pub fn with_detectors(detectors: Vec<Detector>, settings: RuleSettings) -> Self {
        Self {
            detectors,
            settings,
            parallel: false,
            jobs: 1,
        }
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Gate then analyze one unit. Detectors all run, whatever the
    /// earlier ones found.
    pub fn process_unit<M: SemanticModel>(&self, unit: &ParsedUnit<'_, M>) -> UnitOutcome {
        let path = unit.path().display().to_string();
        let mut events = vec![Event::Info(format!("Processing of the file {} is started", path))];

        events.extend(
            unit.diagnostics
                .iter()
                .filter(|d| d.severity != Severity::Info)
                .cloned()
                .map(Event::Diagnostic),
        );
        if unit.has_compile_errors() {
            let errors = unit.diagnostics.iter().filter(|d| d.is_error()).count();
            log::debug!("{}: gated by {} compile error(s)", path, errors);
            events.push(Event::Failure(format!(
                "Compilation of the file {} failed with {} error(s)",
                path, errors
            )));
            return UnitOutcome {
                path: unit.path().to_path_buf(),
                verdict: Verdict::FAIL,
                events,
            };
        }

        let mut verdict = Verdict::PASS;
        for detector in &self.detectors {
            events.push(Event::Info(format!("Execution of {} started", detector)));
            let started = Instant::now();

            let mut collector = DiagnosticCollector::new();
            let found = detector.run(unit, &self.settings, &mut collector);
            verdict &= Verdict::from(collector.is_empty());

            events.push(Event::Info(detector.summary(found)));
            events.extend(collector.into_diagnostics().into_iter().map(Event::Diagnostic));
            events.push(Event::Info(format!("Execution of {} finished", detector)));
            log::trace!("{}: {} took {:?}", path, detector, started.elapsed());
        }

        events.push(Event::Info(format!("Processing of the file {} is finished", path)));
        UnitOutcome {
            path: unit.path().to_path_buf(),
            verdict,
            events,
        }
    }

    /// Analyze every unit of a compilation. Outcomes come back in unit
    /// order whether or not the work ran in parallel.
    pub fn process_compilation(&self, compilation: &Compilation) -> Vec<UnitOutcome> {
        let analyze = |tree: TreeId| {
            let unit = ParsedUnit {
                tree: compilation.tree(tree),
                model: compilation.model(tree),
                diagnostics: compilation.unit_diagnostics(tree),
            };
            self.process_unit(&unit)
        };

        let units: Vec<TreeId> = (0..compilation.unit_count()).collect();
        if self.parallel && units.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => return pool.install(|| units.par_iter().map(|&t| analyze(t)).collect()),
                Err(err) => log::warn!("Falling back to sequential analysis: {}", err),
            }
        }
        units.into_iter().map(analyze).collect()
    }
}
