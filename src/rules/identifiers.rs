//! Identifiers the ported code cannot spell

use crate::diagnostic::{Diagnostic, DiagnosticCollector, Severity};
use crate::model::{ParsedUnit, SemanticModel};
use regex::Regex;
use std::sync::LazyLock;

pub const RULE_ID: &str = "non-ascii-identifiers";

static ASCII_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("identifier pattern"));

/// Every identifier token whose value is not plain ASCII is reported at its
/// own span, repeats included.
pub(super) fn check<M: SemanticModel>(unit: &ParsedUnit<'_, M>, collector: &mut DiagnosticCollector) -> usize {
    let mut found = 0;
    for token in unit.tree.identifier_tokens() {
        let text = token.value_text();
        if ASCII_IDENTIFIER.is_match(text) {
            continue;
        }
        collector.push(Diagnostic::new(
            RULE_ID,
            Severity::Error,
            &format!("Found non-ASCII identifier \"{}\"", text),
            unit.tree.location(token.start, token.end),
        ));
        found += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csharp::{Compilation, SyntaxTree};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Arc;

    fn findings(text: &str) -> Vec<(String, usize, usize, usize, usize)> {
        let tree = SyntaxTree::parse(Path::new("Test.cs"), Arc::from(text), &HashSet::new());
        let compilation = Compilation::new(vec![tree], Vec::new());
        let unit = ParsedUnit {
            tree: compilation.tree(0),
            model: compilation.model(0),
            diagnostics: compilation.unit_diagnostics(0),
        };
        let mut collector = DiagnosticCollector::new();
        let count = check(&unit, &mut collector);
        let diagnostics = collector.into_diagnostics();
        assert_eq!(count, diagnostics.len());
        diagnostics
            .into_iter()
            .map(|d| {
                let loc = d.location.expect("identifier findings are located");
                (d.message, loc.line, loc.column, loc.end_line, loc.end_column)
            })
            .collect()
    }

    #[test]
    fn test_ascii_identifiers_pass() {
        assert!(findings("class Plain_Name1 { int _x2; void M() { var y = _x2; } }").is_empty());
    }

    #[test]
    fn test_non_ascii_identifier_span() {
        assert_eq!(
            findings("class A\n{\n    int café;\n}\n"),
            vec![("Found non-ASCII identifier \"café\"".to_string(), 3, 9, 3, 13)]
        );
    }

    #[test]
    fn test_every_occurrence_is_reported() {
        let text = "class Ω { Ω Make() { return new Ω(); } }";
        let found = findings(text);
        assert_eq!(found.len(), 3);
        assert_eq!(
            found.iter().map(|f| f.2).collect::<Vec<_>>(),
            vec![7, 11, 33]
        );
    }

    #[test]
    fn test_escaped_identifier_uses_value_text() {
        let found = findings("class A { int caf\\u00e9; int @class; int \\u0061bc; }");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Found non-ASCII identifier \"café\"");
    }

    #[test]
    fn test_strings_and_comments_are_ignored() {
        assert!(findings("// naïve\nclass A { string s = \"naïve\"; /* é */ }").is_empty());
    }

    #[test]
    fn test_interpolation_holes_are_scanned() {
        let found = findings("class A { string M(int ü) => $\"value {ü}\"; }");
        assert_eq!(found.len(), 2);
    }
}
