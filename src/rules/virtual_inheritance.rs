//! Diamond inheritance from user interfaces
//!
//! A type whose base interfaces bottom out in more than one user interface
//! (or in a user interface next to platform ones) needs those interfaces
//! inherited virtually once ported. Unless the marker attribute says so, each
//! such leaf interface is reported once per unit.

use super::RuleSettings;
use crate::diagnostic::{Diagnostic, DiagnosticCollector, Severity};
use crate::model::{ParsedUnit, SemanticModel, TypeSymbol};
use std::collections::HashSet;

pub const RULE_ID: &str = "virtual-inheritance";

/// Interfaces without further bases reachable from `roots`. A root without
/// bases is a leaf itself. Leaves are deduplicated by display name and
/// returned in discovery order.
pub fn collect_leaves<M: SemanticModel>(model: &M, roots: Vec<TypeSymbol>) -> Vec<TypeSymbol> {
    let mut leaves = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<TypeSymbol> = roots.into_iter().rev().collect();

    while let Some(ty) = stack.pop() {
        if !visited.insert(model.display_name(&ty)) {
            continue;
        }
        let bases = model.base_interfaces(&ty);
        if bases.is_empty() {
            leaves.push(ty);
        } else {
            stack.extend(bases.into_iter().rev());
        }
    }
    leaves
}

fn message(name: &str) -> String {
    format!(
        "Found base non-system interface named {} not marked for virtual inheritance in the ported C++ code",
        name
    )
}

pub(super) fn check<M: SemanticModel>(
    unit: &ParsedUnit<'_, M>,
    settings: &RuleSettings,
    collector: &mut DiagnosticCollector,
) -> usize {
    let model = &unit.model;
    let marked = |ty: &TypeSymbol| model.markers(ty).iter().any(|m| *m == settings.marker);
    let mut found = 0;

    for (decl_id, decl) in unit.tree.types.iter().enumerate() {
        if !decl.kind.has_bases() {
            continue;
        }
        let Some(ty) = model.declared_type(decl_id) else {
            continue;
        };
        if marked(&ty) {
            continue;
        }

        let roots = if model.is_interface(&ty) {
            vec![ty]
        } else {
            model.base_interfaces(&ty)
        };
        let (platform, user): (Vec<_>, Vec<_>) = collect_leaves(model, roots)
            .into_iter()
            .map(|leaf| (model.display_name(&leaf), leaf))
            .partition(|(name, _)| name.starts_with(&settings.platform_prefix));

        if user.is_empty() || (platform.is_empty() && user.len() == 1) {
            continue;
        }

        for (name, leaf) in user {
            if marked(&leaf) {
                continue;
            }
            let diagnostic = Diagnostic::unlocated(RULE_ID, Severity::Error, &message(&name));
            if collector.push_once(&name, diagnostic) {
                log::debug!("{}: {} reached from {}", unit.path().display(), name, decl.name);
                found += 1;
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csharp::{Compilation, SyntaxTree};
    use crate::model::TypeArg;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    fn findings(text: &str) -> Vec<String> {
        findings_with(text, &RuleSettings::default())
    }

    fn findings_with(text: &str, settings: &RuleSettings) -> Vec<String> {
        let tree = SyntaxTree::parse(Path::new("Test.cs"), Arc::from(text), &HashSet::new());
        let compilation = Compilation::new(vec![tree], Vec::new());
        let unit = ParsedUnit {
            tree: compilation.tree(0),
            model: compilation.model(0),
            diagnostics: compilation.unit_diagnostics(0),
        };
        assert!(!unit.has_compile_errors(), "{:?}", unit.diagnostics);

        let mut collector = DiagnosticCollector::new();
        let count = check(&unit, settings, &mut collector);
        let diagnostics = collector.into_diagnostics();
        assert_eq!(count, diagnostics.len());
        assert!(diagnostics.iter().all(|d| d.location.is_none() && d.rule_id == RULE_ID));
        diagnostics.into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn test_two_user_interfaces() {
        assert_eq!(
            findings("interface IA {} interface IB {} class C : IA, IB {}"),
            vec![message("IA"), message("IB")]
        );
    }

    #[test]
    fn test_marker_on_declaring_type() {
        let text = "using CsToCppPorter;\ninterface IA {} interface IB {}\n[CppVirtualInheritance] class C : IA, IB {}";
        assert!(findings(text).is_empty());
    }

    #[test]
    fn test_marker_on_leaf() {
        let text = "[CsToCppPorter.CppVirtualInheritance] interface IA {}\ninterface IB {}\nclass C : IA, IB {}";
        assert_eq!(findings(text), vec![message("IB")]);
    }

    #[test]
    fn test_custom_marker_name() {
        let settings = RuleSettings {
            marker: "Porting.Virtual".to_string(),
            ..RuleSettings::default()
        };
        let text = "namespace Porting { class Virtual : System.Attribute {} }\n[Porting.Virtual] interface IA {}\ninterface IB {}\nclass C : IA, IB {}";
        assert_eq!(findings_with(text, &settings), vec![message("IB")]);
    }

    #[test]
    fn test_single_unambiguous_base_is_exempt() {
        assert!(findings("interface IA {} class C : IA {}").is_empty());
        assert!(findings("interface IA {} interface IB : IA {} interface IC : IB {} class C : IC {}").is_empty());
        assert!(findings("class C {} struct S {} enum E { A }").is_empty());
    }

    #[test]
    fn test_platform_only_leaves_are_exempt() {
        assert!(findings("using System;\nclass C : IDisposable, ICloneable {}").is_empty());
    }

    #[test]
    fn test_library_interfaces_next_to_platform_import() {
        let text = "using System;\nusing Foo.Bar;\nclass X : IWidget, IGadget {}";
        assert_eq!(findings(text), vec![message("Foo.Bar.IWidget"), message("Foo.Bar.IGadget")]);
    }

    #[test]
    fn test_interface_declaration_is_a_root() {
        let text = "interface IA {} interface IB {}\ninterface IC : IA, IB {}";
        assert_eq!(findings(text), vec![message("IA"), message("IB")]);
    }

    #[test]
    fn test_user_leaf_next_to_platform_leaf() {
        let text = "using System;\ninterface IA {}\nclass C : IA, IDisposable {}";
        assert_eq!(findings(text), vec![message("IA")]);
    }

    #[test]
    fn test_reported_once_per_unit() {
        let text = "namespace N {\ninterface IA {} interface IB {}\nclass C1 : IA, IB {}\nstruct S : IB, IA {}\ninterface IC : IA, IB {}\n}";
        assert_eq!(findings(text), vec![message("N.IA"), message("N.IB")]);
    }

    #[test]
    fn test_leaf_reached_twice_counts_once() {
        let shared = "interface IX {} interface IA : IX {} interface IB : IX {}";
        assert!(findings(&format!("{} class C : IA, IB {{}}", shared)).is_empty());
        assert_eq!(
            findings(&format!("{} class C : IA, IB, System.IDisposable {{}}", shared)),
            vec![message("IX")]
        );
    }

    #[test]
    fn test_constructed_generic_leaves() {
        let text = "interface IG<T> {}\nclass C : IG<int>, IG<string> {}\nrecord R : IG<int>, IG<string>;";
        assert_eq!(findings(text), vec![message("IG<int>"), message("IG<string>")]);
    }

    #[test]
    fn test_catalog_hierarchy_is_platform() {
        let text = "using System.Collections.Generic;\ninterface IA {}\nclass C : List<int>, IA {}";
        assert_eq!(findings(text), Vec::<String>::new());
        let text = "using System.Collections.Generic;\ninterface IA {}\nclass C : IList<int>, IA {}";
        assert_eq!(findings(text), vec![message("IA")]);
    }

    /// Interfaces `I0 .. In`; `edges[i]` lists the bases of `Ii`
    struct Lattice {
        edges: Vec<Vec<usize>>,
    }

    impl SemanticModel for Lattice {
        fn declared_type(&self, decl: usize) -> Option<TypeSymbol> {
            (decl < self.edges.len()).then(|| TypeSymbol::new(decl, Vec::new()))
        }

        fn base_interfaces(&self, ty: &TypeSymbol) -> Vec<TypeSymbol> {
            self.edges[ty.def]
                .iter()
                .map(|&b| TypeSymbol::new(b, Vec::new()))
                .collect()
        }

        fn markers(&self, _ty: &TypeSymbol) -> Vec<String> {
            Vec::new()
        }

        fn display_name(&self, ty: &TypeSymbol) -> String {
            let args: Vec<String> = ty
                .args
                .iter()
                .map(|a| match a {
                    TypeArg::Param(p) => p.clone(),
                    _ => "?".to_string(),
                })
                .collect();
            if args.is_empty() {
                format!("I{}", ty.def)
            } else {
                format!("I{}<{}>", ty.def, args.join(", "))
            }
        }

        fn is_interface(&self, _ty: &TypeSymbol) -> bool {
            true
        }
    }

    fn names(model: &Lattice, leaves: &[TypeSymbol]) -> Vec<String> {
        leaves.iter().map(|l| model.display_name(l)).collect()
    }

    #[test]
    fn test_collect_leaves_deep_chain() {
        let depth = 200_000;
        let mut edges: Vec<Vec<usize>> = (1..depth).map(|i| vec![i]).collect();
        edges.push(Vec::new());
        let model = Lattice { edges };

        let leaves = collect_leaves(&model, vec![TypeSymbol::new(0, Vec::new())]);
        assert_eq!(names(&model, &leaves), vec![format!("I{}", depth - 1)]);
    }

    #[test]
    fn test_collect_leaves_wide_lattice() {
        // I0 -> I1, I2; I1 -> I3, I4; I2 -> I4, I5
        let model = Lattice {
            edges: vec![vec![1, 2], vec![3, 4], vec![4, 5], vec![], vec![], vec![]],
        };
        let leaves = collect_leaves(&model, vec![TypeSymbol::new(0, Vec::new())]);
        assert_eq!(names(&model, &leaves), vec!["I3", "I4", "I5"]);

        let leaves = collect_leaves(&model, vec![TypeSymbol::new(3, Vec::new())]);
        assert_eq!(names(&model, &leaves), vec!["I3"]);

        assert!(collect_leaves(&model, Vec::new()).is_empty());
    }

    #[test]
    fn test_collect_leaves_keeps_distinct_constructions() {
        let model = Lattice {
            edges: vec![vec![]],
        };
        let roots = vec![
            TypeSymbol::new(0, vec![TypeArg::Param("A".to_string())]),
            TypeSymbol::new(0, vec![TypeArg::Param("B".to_string())]),
            TypeSymbol::new(0, vec![TypeArg::Param("A".to_string())]),
        ];
        let leaves = collect_leaves(&model, roots);
        assert_eq!(names(&model, &leaves), vec!["I0<A>", "I0<B>"]);
    }
}
