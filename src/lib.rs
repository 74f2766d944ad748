//! Portcheck - porting compatibility checker for C# sources
//!
//! Inspects C# code that is going to be translated mechanically into C++
//! and reports constructs that would change meaning or fail to compile
//! there: interface diamonds not marked for virtual inheritance, and
//! identifiers outside the ASCII character set.
//!
//! # Architecture
//!
//! ```text
//! CLI -> Processor (solution -> project -> file) -> Compilation -> Engine -> Detector
//! ```
//!
//! A unit that does not compile is reported and skipped by the detectors.
//! Verdicts are conjoined upward without short-circuiting, so one run shows
//! every finding.

pub mod config;
pub mod csharp;
pub mod diagnostic;
pub mod engine;
pub mod model;
pub mod output;
pub mod processor;
pub mod project;
pub mod rules;
pub mod solution;

// Re-export main types
pub use config::Config;
pub use diagnostic::{Diagnostic, DiagnosticCollector, Location, Severity};
pub use engine::{Engine, Event, UnitOutcome, Verdict};
pub use model::{ParsedUnit, SemanticModel, SourceUnit, TypeSymbol};
pub use output::{Report, Reporter};
pub use processor::{ProcessError, Processor, Target};
pub use project::Project;
pub use rules::{Detector, RuleSettings};
pub use solution::Solution;
