//! Syntax tree for one C# unit
//!
//! The tree keeps the declaration skeleton only: using directives, namespaces
//! and type declarations. Member bodies are not modelled.

use super::lexer::{LineMap, SyntaxDiagnostic, Token, TokenKind};
use super::parser;
use crate::diagnostic::{Location, Severity};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type NamespaceId = usize;
pub type TypeDeclId = usize;

/// The compilation-unit scope; always present at index 0
pub const GLOBAL_NAMESPACE: NamespaceId = 0;

/// A type as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSyntax {
    Named(TypeName),
    /// Keyword type such as `int` or `string`
    Predefined { keyword: String, start: usize, end: usize },
    Array(Box<TypeSyntax>, usize),
    Nullable(Box<TypeSyntax>),
    Pointer(Box<TypeSyntax>),
    Tuple(Vec<TypeSyntax>),
}

impl TypeSyntax {
    pub fn span(&self) -> (usize, usize) {
        match self {
            TypeSyntax::Named(name) => (name.start, name.end),
            TypeSyntax::Predefined { start, end, .. } => (*start, *end),
            TypeSyntax::Array(inner, _) | TypeSyntax::Nullable(inner) | TypeSyntax::Pointer(inner) => {
                inner.span()
            }
            TypeSyntax::Tuple(items) => {
                let start = items.first().map_or(0, |t| t.span().0);
                let end = items.last().map_or(start, |t| t.span().1);
                (start, end)
            }
        }
    }
}

/// One dotted segment of a name, with its type arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePart {
    pub name: String,
    pub args: Vec<TypeSyntax>,
}

/// A possibly qualified, possibly generic name: `global::A.B<T>.C`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// `X` in `X::A.B` (`global` for the global namespace)
    pub alias: Option<String>,
    pub parts: Vec<NamePart>,
    pub start: usize,
    pub end: usize,
}

impl TypeName {
    /// Dotted text without type arguments
    pub fn dotted(&self) -> String {
        let body = self
            .parts
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(".");
        match &self.alias {
            Some(alias) => format!("{}::{}", alias, body),
            None => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsingKind {
    Namespace,
    Static,
    Alias(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDirective {
    pub kind: UsingKind,
    pub target: TypeSyntax,
    pub global: bool,
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    /// Full name segments, parents included
    pub segments: Vec<String>,
    pub parent: Option<NamespaceId>,
    pub usings: Vec<UsingDirective>,
}

impl NamespaceDecl {
    pub fn qualified_name(&self) -> String {
        self.segments.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Record,
    RecordStruct,
}

impl TypeKind {
    /// Kinds that carry an interface list
    pub fn has_bases(self) -> bool {
        !matches!(self, TypeKind::Enum | TypeKind::Delegate)
    }

    pub fn is_value_type(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::RecordStruct | TypeKind::Enum)
    }

    /// Kinds whose first base may be a class
    pub fn allows_base_class(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::Record)
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
            TypeKind::Record => "record",
            TypeKind::RecordStruct => "record struct",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub name_start: usize,
    pub name_end: usize,
    pub type_params: Vec<String>,
    pub attributes: Vec<TypeName>,
    pub bases: Vec<TypeSyntax>,
    pub partial: bool,
    pub namespace: NamespaceId,
    /// Enclosing type for nested declarations
    pub container: Option<TypeDeclId>,
}

impl TypeDecl {
    /// Metadata-style arity suffix, `` `2 `` for two type parameters
    pub fn arity(&self) -> usize {
        self.type_params.len()
    }
}

/// Parsed form of one unit
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub line_map: LineMap,
    pub tokens: Vec<Token>,
    pub namespaces: Vec<NamespaceDecl>,
    pub types: Vec<TypeDecl>,
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

impl SyntaxTree {
    /// Lex and parse `text`
    pub fn parse(path: &Path, text: Arc<str>, defines: &HashSet<String>) -> Self {
        let line_map = LineMap::new(text.clone());
        let lexed = super::lexer::lex(&text, defines);
        let parsed = parser::parse(&lexed.tokens);

        let mut diagnostics = lexed.diagnostics;
        diagnostics.extend(parsed.diagnostics);

        log::trace!(
            "{}: {} tokens, {} namespaces, {} types",
            path.display(),
            lexed.tokens.len(),
            parsed.namespaces.len(),
            parsed.types.len()
        );

        Self {
            path: path.to_path_buf(),
            line_map,
            tokens: lexed.tokens,
            namespaces: parsed.namespaces,
            types: parsed.types,
            diagnostics,
        }
    }

    pub fn identifier_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.kind == TokenKind::Identifier)
    }

    pub fn location(&self, start: usize, end: usize) -> Location {
        self.line_map.location(&self.path, start, end)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Namespace chain from `ns` outwards to the global scope
    pub fn namespace_chain(&self, ns: NamespaceId) -> Vec<NamespaceId> {
        let mut chain = vec![ns];
        let mut current = ns;
        while let Some(parent) = self.namespaces[current].parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Containing types from the innermost outwards, `id` included
    pub fn container_chain(&self, id: TypeDeclId) -> Vec<TypeDeclId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.types[current].container {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SyntaxTree {
        SyntaxTree::parse(Path::new("Test.cs"), Arc::from(text), &HashSet::new())
    }

    #[test]
    fn test_type_name_dotted() {
        let tree = parse("class C : global::System.Collections.Generic.IList<int> { }");
        let TypeSyntax::Named(name) = &tree.types[0].bases[0] else {
            panic!("expected named base");
        };
        assert_eq!(name.dotted(), "global::System.Collections.Generic.IList");
        assert_eq!(name.parts[3].args.len(), 1);
    }

    #[test]
    fn test_namespace_chain() {
        let tree = parse("namespace A { namespace B.C { class X { class Y { } } } }");
        assert_eq!(tree.namespaces.len(), 3);
        assert_eq!(tree.namespaces[2].qualified_name(), "A.B.C");
        let y = tree.types.iter().position(|t| t.name == "Y").unwrap();
        assert_eq!(tree.namespace_chain(tree.types[y].namespace), vec![2, 1, 0]);
        assert_eq!(tree.container_chain(y).len(), 2);
    }

    #[test]
    fn test_location_of_span() {
        let tree = parse("class A\n{\n  int café;\n}\n");
        let token = tree.identifier_tokens().find(|t| t.text == "café").unwrap();
        let loc = tree.location(token.start, token.end);
        assert_eq!((loc.line, loc.column, loc.end_line, loc.end_column), (3, 7, 3, 11));
    }

    #[test]
    fn test_type_kind_predicates() {
        assert!(TypeKind::Class.allows_base_class());
        assert!(!TypeKind::Struct.allows_base_class());
        assert!(TypeKind::RecordStruct.is_value_type());
        assert!(!TypeKind::Delegate.has_bases());
        assert_eq!(TypeKind::RecordStruct.to_string(), "record struct");
    }
}
