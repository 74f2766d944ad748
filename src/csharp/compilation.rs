//! Compilation: declares and binds the types of a set of syntax trees
//!
//! A compilation holds the units under analysis, the trees of referenced
//! projects and the built-in catalog. Everything is resolved up front; the
//! finished compilation is immutable and can be shared across threads.

use super::lexer::SyntaxDiagnostic;
use super::parser::parse_type_text;
use super::platform::{self, CATALOG};
use super::syntax::{
    NamePart, NamespaceId, SyntaxTree, TypeDeclId, TypeKind, TypeName, TypeSyntax, UsingDirective,
    UsingKind, GLOBAL_NAMESPACE,
};
use crate::diagnostic::Diagnostic;
use crate::model::{SemanticModel, SymbolId, TypeArg, TypeSymbol};
use std::collections::{HashMap, HashSet};

pub type TreeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Container {
    Namespace(String),
    Type(SymbolId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Declared in source; one entry per (partial) declaration
    Source(Vec<(TreeId, TypeDeclId)>),
    Catalog,
    /// Assumed to live in a library the compilation cannot see
    External,
}

#[derive(Debug, Clone)]
pub struct SymbolDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub kind: TypeKind,
    pub container: Container,
    pub origin: Origin,
    pub partial: bool,
    pub keyword: Option<&'static str>,
    pub base_class: Option<TypeSymbol>,
    pub interfaces: Vec<TypeSymbol>,
    pub markers: Vec<String>,
}

impl SymbolDef {
    fn new(name: &str, type_params: Vec<String>, kind: TypeKind, container: Container, origin: Origin) -> Self {
        Self {
            name: name.to_string(),
            type_params,
            kind,
            container,
            origin,
            partial: false,
            keyword: None,
            base_class: None,
            interfaces: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.type_params.len()
    }
}

#[derive(Debug, Default)]
struct SymbolTable {
    symbols: Vec<SymbolDef>,
    members: HashMap<Container, Vec<SymbolId>>,
    source_namespaces: HashSet<String>,
    catalog_namespaces: HashSet<String>,
}

impl SymbolTable {
    /// Add a symbol; `visible` symbols take part in name lookup
    fn add(&mut self, def: SymbolDef, visible: bool) -> SymbolId {
        let id = self.symbols.len();
        if visible {
            self.members.entry(def.container.clone()).or_default().push(id);
        }
        self.symbols.push(def);
        id
    }

    fn find(&self, container: &Container, name: &str, arity: usize) -> Option<SymbolId> {
        self.members.get(container)?.iter().copied().find(|&id| {
            let def = &self.symbols[id];
            def.name == name && def.arity() == arity
        })
    }

    fn find_qualified(&self, qualified: &str, arity: usize) -> Option<SymbolId> {
        let (ns, name) = qualified.rsplit_once('.').unwrap_or(("", qualified));
        self.find(&Container::Namespace(ns.to_string()), name, arity)
    }

    fn hide(&mut self, container: &Container, id: SymbolId) {
        if let Some(members) = self.members.get_mut(container) {
            members.retain(|&m| m != id);
        }
    }

    fn is_known_namespace(&self, ns: &str) -> bool {
        ns.is_empty() || self.source_namespaces.contains(ns) || self.catalog_namespaces.contains(ns)
    }

    /// A namespace whose full contents the compilation cannot see
    fn is_open(&self, ns: &str) -> bool {
        !ns.is_empty() && (self.catalog_namespaces.contains(ns) || !self.source_namespaces.contains(ns))
    }

    /// Shares its root segment with a catalog namespace such as `System`
    fn is_catalog_rooted(&self, ns: &str) -> bool {
        let root = |n: &str| n.split('.').next().unwrap_or_default().to_string();
        let ns_root = root(ns);
        self.catalog_namespaces.iter().any(|c| root(c) == ns_root)
    }

    fn definition(&self, id: SymbolId) -> TypeSymbol {
        let params = self
            .symbols
            .get(id)
            .map(|def| def.type_params.iter().cloned().map(TypeArg::Param).collect())
            .unwrap_or_default();
        TypeSymbol::new(id, params)
    }

    fn external(&mut self, container: Container, name: &str, arity: usize, kind: TypeKind) -> SymbolId {
        if let Some(id) = self.find(&container, name, arity) {
            return id;
        }
        let type_params = match arity {
            0 => Vec::new(),
            1 => vec!["T".to_string()],
            n => (1..=n).map(|i| format!("T{}", i)).collect(),
        };
        let def = SymbolDef::new(name, type_params, kind, container, Origin::External);
        let id = self.add(def, true);
        log::debug!("Assuming external {} {}", kind, self.display(&self.definition(id)));
        id
    }

    fn display(&self, ty: &TypeSymbol) -> String {
        let Some(def) = self.symbols.get(ty.def) else {
            return "?".to_string();
        };
        if let Some(keyword) = def.keyword {
            if ty.args.is_empty() {
                return keyword.to_string();
            }
        }
        let mut out = match &def.container {
            Container::Namespace(ns) if ns.is_empty() => String::new(),
            Container::Namespace(ns) => format!("{}.", ns),
            Container::Type(outer) => format!("{}.", self.display(&self.definition(*outer))),
        };
        out.push_str(&def.name);
        if !ty.args.is_empty() {
            let args: Vec<String> = ty.args.iter().map(|a| self.display_arg(a)).collect();
            out.push('<');
            out.push_str(&args.join(", "));
            out.push('>');
        }
        out
    }

    fn display_arg(&self, arg: &TypeArg) -> String {
        match arg {
            TypeArg::Type(ty) => self.display(ty),
            TypeArg::Param(name) => name.clone(),
            TypeArg::Array(inner, rank) => {
                format!("{}[{}]", self.display_arg(inner), ",".repeat(rank.saturating_sub(1)))
            }
            TypeArg::Nullable(inner) => format!("{}?", self.display_arg(inner)),
            TypeArg::Pointer(inner) => format!("{}*", self.display_arg(inner)),
            TypeArg::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|i| self.display_arg(i)).collect();
                format!("({})", items.join(", "))
            }
        }
    }
}

fn substitute(ty: &TypeSymbol, params: &[String], args: &[TypeArg]) -> TypeSymbol {
    TypeSymbol::new(
        ty.def,
        ty.args.iter().map(|a| substitute_arg(a, params, args)).collect(),
    )
}

fn substitute_arg(arg: &TypeArg, params: &[String], args: &[TypeArg]) -> TypeArg {
    match arg {
        TypeArg::Param(name) => params
            .iter()
            .position(|p| p == name)
            .and_then(|i| args.get(i))
            .cloned()
            .unwrap_or_else(|| arg.clone()),
        TypeArg::Type(ty) => TypeArg::Type(substitute(ty, params, args)),
        TypeArg::Array(inner, rank) => TypeArg::Array(Box::new(substitute_arg(inner, params, args)), *rank),
        TypeArg::Nullable(inner) => TypeArg::Nullable(Box::new(substitute_arg(inner, params, args))),
        TypeArg::Pointer(inner) => TypeArg::Pointer(Box::new(substitute_arg(inner, params, args))),
        TypeArg::Tuple(items) => TypeArg::Tuple(items.iter().map(|i| substitute_arg(i, params, args)).collect()),
    }
}

fn join(ns: &str, name: &str) -> String {
    if ns.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", ns, name)
    }
}

fn looks_like_interface(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(char::is_uppercase)
}

fn infer_kind(name: &str) -> TypeKind {
    if looks_like_interface(name) {
        TypeKind::Interface
    } else {
        TypeKind::Class
    }
}

/// Kind assumed for an unresolvable base: only the first entry of a class
/// base list can be a class.
fn base_hint(kind: TypeKind, index: usize, base: &TypeSyntax) -> TypeKind {
    if kind.allows_base_class() && index == 0 {
        if let TypeSyntax::Named(name) = base {
            if name.parts.last().is_some_and(|last| !looks_like_interface(&last.name)) {
                return TypeKind::Class;
            }
        }
    }
    TypeKind::Interface
}

fn dotted_parts(name: &TypeName) -> String {
    name.parts
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    /// Inside a source tree; `decl` is the declaration whose header is bound
    Source {
        tree: TreeId,
        ns: NamespaceId,
        decl: Option<TypeDeclId>,
    },
    /// Fully qualified context with no usings
    Global { type_params: &'static [&'static str] },
}

const GLOBAL_SCOPE: Scope = Scope::Global { type_params: &[] };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Only what the compilation knows
    Known,
    /// Unknown names in open namespaces become external symbols of the hinted kind
    Opaque(Option<TypeKind>),
}

impl Mode {
    fn for_args(self) -> Mode {
        match self {
            Mode::Known => Mode::Known,
            Mode::Opaque(_) => Mode::Opaque(None),
        }
    }
}

#[derive(Debug, Clone)]
enum Resolved {
    Type(TypeArg),
    Namespace(String),
}

/// One namespace level of a lookup, innermost first
struct Level<'a> {
    namespace: String,
    usings: Vec<&'a UsingDirective>,
}

type BindResult<T> = Result<T, SyntaxDiagnostic>;

struct Binder<'a> {
    trees: &'a [SyntaxTree],
    /// Project group of each tree; global usings apply within a group
    groups: &'a [usize],
    decl_symbols: &'a [Vec<Option<SymbolId>>],
    table: &'a mut SymbolTable,
}

impl<'a> Binder<'a> {
    fn bind_type(&mut self, scope: Scope, syntax: &TypeSyntax, mode: Mode) -> BindResult<TypeArg> {
        match syntax {
            TypeSyntax::Predefined { keyword, start, end } => {
                if keyword == "void" {
                    return Err(SyntaxDiagnostic::error(
                        "CS1547",
                        "Keyword 'void' cannot be used in this context",
                        *start,
                        *end,
                    ));
                }
                let id = platform::keyword_type(keyword)
                    .and_then(|q| self.table.find_qualified(q, 0))
                    .ok_or_else(|| {
                        SyntaxDiagnostic::error(
                            "CS0518",
                            format!("Predefined type '{}' is not defined or imported", keyword),
                            *start,
                            *end,
                        )
                    })?;
                Ok(TypeArg::Type(TypeSymbol::new(id, Vec::new())))
            }
            TypeSyntax::Array(inner, rank) => Ok(TypeArg::Array(
                Box::new(self.bind_type(scope, inner, mode.for_args())?),
                *rank,
            )),
            TypeSyntax::Nullable(inner) => Ok(TypeArg::Nullable(Box::new(
                self.bind_type(scope, inner, mode.for_args())?,
            ))),
            TypeSyntax::Pointer(inner) => Ok(TypeArg::Pointer(Box::new(
                self.bind_type(scope, inner, mode.for_args())?,
            ))),
            TypeSyntax::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.bind_type(scope, item, mode.for_args()))
                    .collect::<BindResult<Vec<_>>>()?;
                Ok(TypeArg::Tuple(items))
            }
            TypeSyntax::Named(name) => match self.bind_name(scope, name, mode)? {
                Resolved::Type(ty) => Ok(ty),
                Resolved::Namespace(ns) => Err(SyntaxDiagnostic::error(
                    "CS0118",
                    format!("'{}' is a namespace but is used like a type", ns),
                    name.start,
                    name.end,
                )),
            },
        }
    }

    fn bind_name(&mut self, scope: Scope, name: &TypeName, mode: Mode) -> BindResult<Resolved> {
        let span = (name.start, name.end);
        let Some(last) = name.parts.len().checked_sub(1) else {
            return Err(SyntaxDiagnostic::error("CS1001", "Identifier expected", span.0, span.1));
        };

        let (mut current, first) = match name.alias.as_deref() {
            Some("global") => (Resolved::Namespace(String::new()), 0),
            Some(alias) => match self.lookup_alias(scope, alias)? {
                Some(Resolved::Namespace(ns)) => (Resolved::Namespace(ns), 0),
                Some(Resolved::Type(_)) => {
                    return Err(SyntaxDiagnostic::error(
                        "CS0431",
                        format!(
                            "Cannot use alias '{}' with '::' since the alias references a type. Use '.' instead.",
                            alias
                        ),
                        span.0,
                        span.1,
                    ))
                }
                None => {
                    return Err(SyntaxDiagnostic::error(
                        "CS0432",
                        format!("Alias '{}' not found", alias),
                        span.0,
                        span.1,
                    ))
                }
            },
            None => (
                self.lookup_simple(scope, &name.parts[0], last == 0, mode, span)?,
                1,
            ),
        };

        for (index, part) in name.parts.iter().enumerate().skip(first) {
            current = self.lookup_member(scope, current, part, index == last, mode, span)?;
        }
        Ok(current)
    }

    fn bind_args(&mut self, scope: Scope, part: &NamePart, mode: Mode) -> BindResult<Vec<TypeArg>> {
        part.args
            .iter()
            .map(|arg| self.bind_type(scope, arg, mode.for_args()))
            .collect()
    }

    fn typed(&mut self, scope: Scope, id: SymbolId, part: &NamePart, mode: Mode) -> BindResult<Resolved> {
        let args = self.bind_args(scope, part, mode)?;
        Ok(Resolved::Type(TypeArg::Type(TypeSymbol::new(id, args))))
    }

    fn type_params(&self, scope: Scope) -> Vec<String> {
        match scope {
            Scope::Global { type_params } => type_params.iter().map(|p| p.to_string()).collect(),
            Scope::Source { decl: None, .. } => Vec::new(),
            Scope::Source {
                tree,
                decl: Some(decl),
                ..
            } => {
                let syntax = &self.trees[tree];
                syntax
                    .container_chain(decl)
                    .into_iter()
                    .flat_map(|id| syntax.types[id].type_params.iter().cloned())
                    .collect()
            }
        }
    }

    /// Symbols of the types enclosing the declaration, innermost first
    fn containers(&self, scope: Scope) -> Vec<SymbolId> {
        match scope {
            Scope::Source {
                tree,
                decl: Some(decl),
                ..
            } => self.trees[tree]
                .container_chain(decl)
                .into_iter()
                .skip(1)
                .filter_map(|id| self.decl_symbols[tree][id])
                .collect(),
            _ => Vec::new(),
        }
    }

    fn levels(&self, scope: Scope) -> Vec<Level<'a>> {
        let trees = self.trees;
        let Scope::Source { tree, ns, .. } = scope else {
            return vec![Level {
                namespace: String::new(),
                usings: Vec::new(),
            }];
        };

        let syntax = &trees[tree];
        let mut levels = Vec::new();
        for id in syntax.namespace_chain(ns) {
            let decl = &syntax.namespaces[id];
            if id == GLOBAL_NAMESPACE {
                let mut usings: Vec<&'a UsingDirective> = decl.usings.iter().collect();
                for (other_id, other) in trees.iter().enumerate() {
                    if other_id != tree && self.groups[other_id] == self.groups[tree] {
                        usings.extend(other.namespaces[GLOBAL_NAMESPACE].usings.iter().filter(|u| u.global));
                    }
                }
                levels.push(Level {
                    namespace: String::new(),
                    usings,
                });
                continue;
            }
            let parent_len = decl.parent.map_or(0, |p| syntax.namespaces[p].segments.len());
            let len = decl.segments.len();
            for k in (parent_len + 1..=len).rev() {
                let usings = if k == len {
                    decl.usings.iter().collect()
                } else {
                    Vec::new()
                };
                levels.push(Level {
                    namespace: decl.segments[..k].join("."),
                    usings,
                });
            }
        }
        levels
    }

    /// Namespace a relative name refers to from inside `base`, if known
    fn resolve_namespace_relative(&self, base: &str, dotted: &str) -> Option<String> {
        let mut prefix = base.to_string();
        loop {
            let candidate = join(&prefix, dotted);
            if self.table.is_known_namespace(&candidate) {
                return Some(candidate);
            }
            if prefix.is_empty() {
                return None;
            }
            prefix = prefix.rsplit_once('.').map_or(String::new(), |(p, _)| p.to_string());
        }
    }

    /// Namespace imported by a `using N;` directive declared inside `base`
    fn using_namespace(&self, base: &str, using: &UsingDirective) -> Option<String> {
        let TypeSyntax::Named(name) = &using.target else {
            return None;
        };
        let dotted = dotted_parts(name);
        if name.alias.as_deref() == Some("global") {
            return Some(dotted);
        }
        Some(self.resolve_namespace_relative(base, &dotted).unwrap_or(dotted))
    }

    fn resolve_alias(&mut self, base: &str, using: &UsingDirective) -> BindResult<Resolved> {
        if let TypeSyntax::Named(name) = &using.target {
            if name.parts.iter().all(|p| p.args.is_empty()) {
                let dotted = dotted_parts(name);
                let known = if name.alias.as_deref() == Some("global") {
                    self.table.is_known_namespace(&dotted).then(|| dotted.clone())
                } else {
                    self.resolve_namespace_relative(base, &dotted)
                };
                if let Some(ns) = known {
                    return Ok(Resolved::Namespace(ns));
                }
            }
            return self.bind_name(GLOBAL_SCOPE, name, Mode::Opaque(None));
        }
        self.bind_type(GLOBAL_SCOPE, &using.target, Mode::Opaque(None))
            .map(Resolved::Type)
    }

    fn lookup_alias(&mut self, scope: Scope, alias: &str) -> BindResult<Option<Resolved>> {
        for level in self.levels(scope) {
            for using in &level.usings {
                if matches!(&using.kind, UsingKind::Alias(a) if a == alias) {
                    return self.resolve_alias(&level.namespace, using).map(Some);
                }
            }
        }
        Ok(None)
    }

    fn lookup_simple(
        &mut self,
        scope: Scope,
        part: &NamePart,
        is_last: bool,
        mode: Mode,
        span: (usize, usize),
    ) -> BindResult<Resolved> {
        let arity = part.args.len();
        let name = part.name.as_str();

        if arity == 0 && self.type_params(scope).iter().any(|p| p == name) {
            return Ok(Resolved::Type(TypeArg::Param(name.to_string())));
        }

        for container in self.containers(scope) {
            if let Some(id) = self.table.find(&Container::Type(container), name, arity) {
                return self.typed(scope, id, part, mode);
            }
        }

        // Open imports of the innermost level that has any; catalog roots never own unknowns
        let mut owners: Option<Vec<String>> = None;
        for level in self.levels(scope) {
            let mut level_owners: Vec<String> = Vec::new();
            if let Some(id) = self.table.find(&Container::Namespace(level.namespace.clone()), name, arity) {
                return self.typed(scope, id, part, mode);
            }
            let nested = join(&level.namespace, name);
            if arity == 0 && self.table.is_known_namespace(&nested) {
                return Ok(Resolved::Namespace(nested));
            }

            if arity == 0 {
                if let Some(using) = level
                    .usings
                    .iter()
                    .find(|u| matches!(&u.kind, UsingKind::Alias(a) if a == name))
                {
                    return self.resolve_alias(&level.namespace, using);
                }
            }

            let mut candidates: Vec<SymbolId> = Vec::new();
            for using in &level.usings {
                match &using.kind {
                    UsingKind::Namespace => {
                        let Some(ns) = self.using_namespace(&level.namespace, using) else {
                            continue;
                        };
                        match self.table.find(&Container::Namespace(ns.clone()), name, arity) {
                            Some(id) if !candidates.contains(&id) => candidates.push(id),
                            Some(_) => {}
                            None if self.table.is_open(&ns)
                                && !self.table.is_catalog_rooted(&ns)
                                && !level_owners.contains(&ns) =>
                            {
                                level_owners.push(ns);
                            }
                            None => {}
                        }
                    }
                    UsingKind::Static => {
                        if let Ok(TypeArg::Type(owner)) = self.bind_type(GLOBAL_SCOPE, &using.target, Mode::Known) {
                            if let Some(id) = self.table.find(&Container::Type(owner.def), name, arity) {
                                if !candidates.contains(&id) {
                                    candidates.push(id);
                                }
                            }
                        }
                    }
                    UsingKind::Alias(_) => {}
                }
            }
            if owners.is_none() && !level_owners.is_empty() {
                owners = Some(level_owners);
            }
            match candidates.as_slice() {
                [] => {}
                [id] => return self.typed(scope, *id, part, mode),
                [a, b, ..] => {
                    return Err(SyntaxDiagnostic::error(
                        "CS0104",
                        format!(
                            "'{}' is an ambiguous reference between '{}' and '{}'",
                            name,
                            self.table.display(&self.table.definition(*a)),
                            self.table.display(&self.table.definition(*b))
                        ),
                        span.0,
                        span.1,
                    ))
                }
            }
        }

        // A leading unknown segment names a namespace of some library
        if !is_last && arity == 0 {
            return Ok(Resolved::Namespace(name.to_string()));
        }

        match (mode, owners.as_deref()) {
            (Mode::Opaque(hint), Some([ns])) => {
                let kind = hint.unwrap_or_else(|| infer_kind(name));
                let id = self.table.external(Container::Namespace(ns.clone()), name, arity, kind);
                self.typed(scope, id, part, mode)
            }
            (Mode::Opaque(_), Some(several)) => {
                log::debug!("Owner of '{}' is ambiguous between {}", name, several.join(", "));
                Err(Self::not_found(name, span))
            }
            _ => Err(Self::not_found(name, span)),
        }
    }

    fn not_found(name: &str, span: (usize, usize)) -> SyntaxDiagnostic {
        SyntaxDiagnostic::error(
            "CS0246",
            format!(
                "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                name
            ),
            span.0,
            span.1,
        )
    }

    fn lookup_member(
        &mut self,
        scope: Scope,
        current: Resolved,
        part: &NamePart,
        is_last: bool,
        mode: Mode,
        span: (usize, usize),
    ) -> BindResult<Resolved> {
        let arity = part.args.len();
        let name = part.name.as_str();
        match current {
            Resolved::Namespace(ns) => {
                if let Some(id) = self.table.find(&Container::Namespace(ns.clone()), name, arity) {
                    return self.typed(scope, id, part, mode);
                }
                let full = join(&ns, name);
                if arity == 0 && self.table.is_known_namespace(&full) {
                    return Ok(Resolved::Namespace(full));
                }
                if self.table.is_open(&ns) {
                    if !is_last && arity == 0 {
                        return Ok(Resolved::Namespace(full));
                    }
                    if let Mode::Opaque(hint) = mode {
                        let kind = hint.filter(|_| is_last).unwrap_or_else(|| infer_kind(name));
                        let id = self.table.external(Container::Namespace(ns), name, arity, kind);
                        return self.typed(scope, id, part, mode);
                    }
                }
                Err(SyntaxDiagnostic::error(
                    "CS0234",
                    format!(
                        "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing an assembly reference?)",
                        name,
                        if ns.is_empty() { "<global namespace>" } else { &ns }
                    ),
                    span.0,
                    span.1,
                ))
            }
            Resolved::Type(TypeArg::Type(owner)) => {
                if let Some(id) = self.table.find(&Container::Type(owner.def), name, arity) {
                    return self.typed(scope, id, part, mode);
                }
                let external = self
                    .table
                    .symbols
                    .get(owner.def)
                    .is_some_and(|def| def.origin == Origin::External);
                if let (true, Mode::Opaque(hint)) = (external, mode) {
                    let kind = hint.filter(|_| is_last).unwrap_or_else(|| infer_kind(name));
                    let id = self.table.external(Container::Type(owner.def), name, arity, kind);
                    return self.typed(scope, id, part, mode);
                }
                Err(SyntaxDiagnostic::error(
                    "CS0426",
                    format!(
                        "The type name '{}' does not exist in the type '{}'",
                        name,
                        self.table.display(&owner)
                    ),
                    span.0,
                    span.1,
                ))
            }
            Resolved::Type(TypeArg::Param(param)) => Err(SyntaxDiagnostic::error(
                "CS0704",
                format!(
                    "Cannot do non-virtual member lookup in '{}' because it is a type parameter",
                    param
                ),
                span.0,
                span.1,
            )),
            Resolved::Type(other) => Err(SyntaxDiagnostic::error(
                "CS0426",
                format!(
                    "The type name '{}' does not exist in the type '{}'",
                    name,
                    self.table.display_arg(&other)
                ),
                span.0,
                span.1,
            )),
        }
    }

    /// Attribute names try `X`, then `XAttribute`, before assuming an
    /// external attribute class.
    fn bind_attribute(&mut self, scope: Scope, name: &TypeName) -> BindResult<TypeSymbol> {
        if let Ok(Resolved::Type(TypeArg::Type(ty))) = self.bind_name(scope, name, Mode::Known) {
            return Ok(ty);
        }
        let mut suffixed = name.clone();
        if let Some(last) = suffixed.parts.last_mut() {
            last.name.push_str("Attribute");
        }
        if let Ok(Resolved::Type(TypeArg::Type(ty))) = self.bind_name(scope, &suffixed, Mode::Known) {
            return Ok(ty);
        }
        match self.bind_name(scope, name, Mode::Opaque(Some(TypeKind::Class)))? {
            Resolved::Type(TypeArg::Type(ty)) => Ok(ty),
            _ => Err(SyntaxDiagnostic::error(
                "CS0616",
                format!("'{}' is not an attribute class", name.dotted()),
                name.start,
                name.end,
            )),
        }
    }

    fn bind_catalog(&mut self) {
        for (id, entry) in CATALOG.iter().enumerate() {
            let scope = Scope::Global {
                type_params: entry.type_params,
            };
            let mut interfaces = Vec::new();
            let mut base_class = None;
            for base in entry.bases {
                let bound = parse_type_text(base).map(|syntax| self.bind_type(scope, &syntax, Mode::Known));
                match bound {
                    Some(Ok(TypeArg::Type(ty))) if self.table.symbols[ty.def].kind == TypeKind::Interface => {
                        interfaces.push(ty)
                    }
                    Some(Ok(TypeArg::Type(ty))) => base_class = Some(ty),
                    _ => log::warn!("Unresolved catalog base {} of {}", base, entry.qualified_name()),
                }
            }
            let def = &mut self.table.symbols[id];
            def.interfaces = interfaces;
            def.base_class = base_class;
        }
    }

    fn bind_sources(&mut self, diagnostics: &mut [Vec<SyntaxDiagnostic>]) {
        let trees = self.trees;
        let count = self.table.symbols.len();
        for id in 0..count {
            let Origin::Source(parts) = &self.table.symbols[id].origin else {
                continue;
            };
            let parts = parts.clone();
            let type_name = self.table.display(&self.table.definition(id));

            let mut base_class: Option<TypeSymbol> = None;
            let mut interfaces: Vec<TypeSymbol> = Vec::new();
            let mut markers: Vec<String> = Vec::new();

            for (tree_id, decl_id) in parts {
                let decl = &trees[tree_id].types[decl_id];
                let scope = Scope::Source {
                    tree: tree_id,
                    ns: decl.namespace,
                    decl: Some(decl_id),
                };
                let mut listed: Vec<TypeSymbol> = Vec::new();

                for (index, base) in decl.bases.iter().enumerate() {
                    let (start, end) = base.span();
                    let hint = base_hint(decl.kind, index, base);
                    let error = |code: &'static str, message: String| SyntaxDiagnostic::error(code, message, start, end);
                    match self.bind_type(scope, base, Mode::Opaque(Some(hint))) {
                        Err(err) => diagnostics[tree_id].push(err),
                        Ok(TypeArg::Type(ty)) => {
                            let base_kind = self.table.symbols[ty.def].kind;
                            let base_name = self.table.display(&ty);
                            if base_kind == TypeKind::Interface {
                                if listed.contains(&ty) {
                                    diagnostics[tree_id].push(error(
                                        "CS0528",
                                        format!("'{}' is already listed in interface list", base_name),
                                    ));
                                    continue;
                                }
                                listed.push(ty.clone());
                                if !interfaces.contains(&ty) {
                                    interfaces.push(ty);
                                }
                            } else if !decl.kind.allows_base_class() {
                                diagnostics[tree_id].push(error(
                                    "CS0527",
                                    format!("Type '{}' in interface list is not an interface", base_name),
                                ));
                            } else if index > 0 {
                                diagnostics[tree_id].push(error(
                                    "CS1722",
                                    format!(
                                        "'{}': base class '{}' must come before any interfaces",
                                        type_name, base_name
                                    ),
                                ));
                            } else if !matches!(base_kind, TypeKind::Class | TypeKind::Record) {
                                diagnostics[tree_id].push(error(
                                    "CS0509",
                                    format!("'{}': cannot derive from sealed type '{}'", type_name, base_name),
                                ));
                            } else {
                                match &base_class {
                                    Some(existing) if existing != &ty => diagnostics[tree_id].push(error(
                                        "CS0263",
                                        format!(
                                            "Partial declarations of '{}' must not specify different base classes",
                                            type_name
                                        ),
                                    )),
                                    _ => base_class = Some(ty),
                                }
                            }
                        }
                        Ok(TypeArg::Param(param)) => diagnostics[tree_id].push(error(
                            "CS0689",
                            format!("Cannot derive from '{}' because it is a type parameter", param),
                        )),
                        Ok(other) => {
                            let base_name = self.table.display_arg(&other);
                            diagnostics[tree_id].push(error(
                                "CS0527",
                                format!("Type '{}' in interface list is not an interface", base_name),
                            ));
                        }
                    }
                }

                for attribute in &decl.attributes {
                    match self.bind_attribute(scope, attribute) {
                        Ok(ty) => {
                            let name = self.table.display(&TypeSymbol::new(ty.def, Vec::new()));
                            if !markers.contains(&name) {
                                markers.push(name);
                            }
                        }
                        Err(err) => diagnostics[tree_id].push(err),
                    }
                }
            }

            let def = &mut self.table.symbols[id];
            def.base_class = base_class;
            def.interfaces = interfaces;
            def.markers = markers;
        }
    }

    fn check_usings(&mut self, unit_count: usize, diagnostics: &mut [Vec<SyntaxDiagnostic>]) {
        let trees = self.trees;
        for (tree_id, tree) in trees.iter().enumerate().take(unit_count) {
            for decl in &tree.namespaces {
                let base = decl.qualified_name();
                for using in &decl.usings {
                    let result = match &using.kind {
                        UsingKind::Namespace => self.check_namespace_using(&base, using),
                        UsingKind::Static => self
                            .bind_type(GLOBAL_SCOPE, &using.target, Mode::Opaque(Some(TypeKind::Class)))
                            .map(|_| ()),
                        UsingKind::Alias(_) => self.resolve_alias(&base, using).map(|_| ()),
                    };
                    if let Err(err) = result {
                        diagnostics[tree_id].push(err);
                    }
                }
            }
        }
    }

    fn check_namespace_using(&self, base: &str, using: &UsingDirective) -> BindResult<()> {
        let (start, end) = using.target.span();
        let not_namespace = |what: String| {
            SyntaxDiagnostic::error(
                "CS0138",
                format!(
                    "A 'using namespace' directive can only be applied to namespaces; '{}' is a type not a namespace",
                    what
                ),
                start,
                end,
            )
        };
        let TypeSyntax::Named(name) = &using.target else {
            return Err(not_namespace(format!("{:?}", using.target)));
        };
        let dotted = dotted_parts(name);
        if name.parts.iter().any(|p| !p.args.is_empty()) {
            return Err(not_namespace(name.dotted()));
        }
        let global = name.alias.as_deref() == Some("global");
        if (global && self.table.is_known_namespace(&dotted))
            || (!global && self.resolve_namespace_relative(base, &dotted).is_some())
        {
            return Ok(());
        }

        let mut prefix = String::new();
        for segment in dotted.split('.') {
            let next = join(&prefix, segment);
            if !self.table.is_known_namespace(&next) {
                if self.table.find(&Container::Namespace(prefix.clone()), segment, 0).is_some() {
                    return Err(not_namespace(dotted));
                }
                if !prefix.is_empty() && !self.table.is_open(&prefix) {
                    return Err(SyntaxDiagnostic::error(
                        "CS0234",
                        format!(
                            "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing an assembly reference?)",
                            segment, prefix
                        ),
                        start,
                        end,
                    ));
                }
                // A library namespace the compilation cannot see
                return Ok(());
            }
            prefix = next;
        }
        Ok(())
    }
}

fn declare_catalog(table: &mut SymbolTable) {
    table.catalog_namespaces.extend(platform::catalog_namespaces());
    for entry in CATALOG {
        let mut def = SymbolDef::new(
            entry.name,
            entry.type_params.iter().map(|p| p.to_string()).collect(),
            entry.kind,
            Container::Namespace(entry.namespace.to_string()),
            Origin::Catalog,
        );
        def.keyword = entry.keyword;
        table.add(def, true);
    }
}

fn declare_sources(
    trees: &[SyntaxTree],
    unit_count: usize,
    table: &mut SymbolTable,
    diagnostics: &mut [Vec<SyntaxDiagnostic>],
) -> Vec<Vec<Option<SymbolId>>> {
    let mut decl_symbols: Vec<Vec<Option<SymbolId>>> =
        trees.iter().map(|t| vec![None; t.types.len()]).collect();

    for (tree_id, tree) in trees.iter().enumerate() {
        for ns in &tree.namespaces {
            for k in 1..=ns.segments.len() {
                table.source_namespaces.insert(ns.segments[..k].join("."));
            }
        }

        let is_unit = tree_id < unit_count;
        for (decl_id, decl) in tree.types.iter().enumerate() {
            if decl.name.is_empty() {
                continue;
            }
            let container = match decl.container {
                Some(outer) => match decl_symbols[tree_id][outer] {
                    Some(symbol) => Container::Type(symbol),
                    None => continue,
                },
                None => Container::Namespace(tree.namespaces[decl.namespace].qualified_name()),
            };
            let arity = decl.type_params.len();
            let fresh = |origin: Origin| {
                let mut def = SymbolDef::new(&decl.name, decl.type_params.clone(), decl.kind, container.clone(), origin);
                def.partial = decl.partial;
                def
            };

            let Some(existing) = table.find(&container, &decl.name, arity) else {
                let id = table.add(fresh(Origin::Source(vec![(tree_id, decl_id)])), true);
                decl_symbols[tree_id][decl_id] = Some(id);
                continue;
            };

            let existing_origin = table.symbols[existing].origin.clone();
            match existing_origin {
                Origin::Source(parts) => {
                    let existing_is_unit = parts.first().is_some_and(|(t, _)| *t < unit_count);
                    let def = &table.symbols[existing];
                    if existing_is_unit && !is_unit {
                        log::debug!(
                            "{}: '{}' is shadowed by a declaration of the analyzed sources",
                            tree.path.display(),
                            decl.name
                        );
                    } else if def.partial && decl.partial && def.kind == decl.kind {
                        if let Origin::Source(parts) = &mut table.symbols[existing].origin {
                            parts.push((tree_id, decl_id));
                        }
                        decl_symbols[tree_id][decl_id] = Some(existing);
                    } else {
                        if is_unit {
                            let (code, message) = match &container {
                                Container::Namespace(ns) => (
                                    "CS0101",
                                    format!(
                                        "The namespace '{}' already contains a definition for '{}'",
                                        if ns.is_empty() { "<global namespace>" } else { ns },
                                        decl.name
                                    ),
                                ),
                                Container::Type(outer) => (
                                    "CS0102",
                                    format!(
                                        "The type '{}' already contains a definition for '{}'",
                                        table.display(&table.definition(*outer)),
                                        decl.name
                                    ),
                                ),
                            };
                            diagnostics[tree_id].push(SyntaxDiagnostic::error(
                                code,
                                message,
                                decl.name_start,
                                decl.name_end,
                            ));
                        }
                        // Keep the duplicate bindable but out of lookup
                        let id = table.add(fresh(Origin::Source(vec![(tree_id, decl_id)])), false);
                        decl_symbols[tree_id][decl_id] = Some(id);
                    }
                }
                Origin::Catalog | Origin::External => {
                    let qualified = table.display(&table.definition(existing));
                    if is_unit {
                        let file = tree.path.display().to_string();
                        diagnostics[tree_id].push(SyntaxDiagnostic::warning(
                            "CS0436",
                            format!(
                                "The type '{}' in '{}' conflicts with the imported type '{}'. Using the type defined in '{}'.",
                                qualified, file, qualified, file
                            ),
                            decl.name_start,
                            decl.name_end,
                        ));
                    }
                    table.hide(&container, existing);
                    let id = table.add(fresh(Origin::Source(vec![(tree_id, decl_id)])), true);
                    decl_symbols[tree_id][decl_id] = Some(id);
                }
            }
        }
    }
    decl_symbols
}

/// Drop interface edges that close a cycle so the base graph stays acyclic
fn break_interface_cycles(
    trees: &[SyntaxTree],
    table: &mut SymbolTable,
    diagnostics: &mut [Vec<SyntaxDiagnostic>],
    unit_count: usize,
) {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let count = table.symbols.len();
    let mut color = vec![WHITE; count];
    for root in 0..count {
        if color[root] != WHITE || !matches!(table.symbols[root].origin, Origin::Source(_)) {
            continue;
        }
        color[root] = GREY;
        let mut stack: Vec<(SymbolId, usize)> = vec![(root, 0)];
        while let Some(&(node, edge)) = stack.last() {
            let Some(target) = table.symbols[node].interfaces.get(edge).map(|t| t.def) else {
                color[node] = BLACK;
                stack.pop();
                continue;
            };
            match color.get(target).copied().unwrap_or(BLACK) {
                WHITE => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    color[target] = GREY;
                    stack.push((target, 0));
                }
                GREY => {
                    let removed = table.symbols[node].interfaces.remove(edge);
                    let base_name = table.display(&removed);
                    let type_name = table.display(&table.definition(node));
                    if let Origin::Source(parts) = &table.symbols[node].origin {
                        if let Some(&(tree_id, decl_id)) = parts.first() {
                            if tree_id < unit_count {
                                let decl = &trees[tree_id].types[decl_id];
                                diagnostics[tree_id].push(SyntaxDiagnostic::error(
                                    "CS0529",
                                    format!(
                                        "Inherited interface '{}' causes a cycle in the interface hierarchy of '{}'",
                                        base_name, type_name
                                    ),
                                    decl.name_start,
                                    decl.name_end,
                                ));
                            }
                        }
                    }
                }
                _ => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                }
            }
        }
    }
}

/// Resolved types of a set of trees
#[derive(Debug)]
pub struct Compilation {
    trees: Vec<SyntaxTree>,
    unit_count: usize,
    table: SymbolTable,
    decl_symbols: Vec<Vec<Option<SymbolId>>>,
    diagnostics: Vec<Vec<SyntaxDiagnostic>>,
}

impl Compilation {
    /// Build a compilation of `units` against the sources of referenced
    /// projects (one inner list per project) and the built-in catalog.
    pub fn new(units: Vec<SyntaxTree>, references: Vec<Vec<SyntaxTree>>) -> Self {
        let unit_count = units.len();
        let mut groups = vec![0; unit_count];
        let mut trees = units;
        for (index, project) in references.into_iter().enumerate() {
            groups.extend(std::iter::repeat(index + 1).take(project.len()));
            trees.extend(project);
        }

        let mut table = SymbolTable::default();
        let mut diagnostics = vec![Vec::new(); trees.len()];

        declare_catalog(&mut table);
        Binder {
            trees: &[],
            groups: &[],
            decl_symbols: &[],
            table: &mut table,
        }
        .bind_catalog();

        let decl_symbols = declare_sources(&trees, unit_count, &mut table, &mut diagnostics);
        {
            let mut binder = Binder {
                trees: &trees,
                groups: &groups,
                decl_symbols: &decl_symbols,
                table: &mut table,
            };
            binder.bind_sources(&mut diagnostics);
            binder.check_usings(unit_count, &mut diagnostics);
        }
        break_interface_cycles(&trees, &mut table, &mut diagnostics, unit_count);

        log::debug!(
            "Compilation of {} unit(s) and {} reference tree(s): {} symbols",
            unit_count,
            trees.len() - unit_count,
            table.symbols.len()
        );

        Self {
            trees,
            unit_count,
            table,
            decl_symbols,
            diagnostics,
        }
    }

    /// Number of analyzed units; they are trees `0..unit_count()`
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    pub fn tree(&self, id: TreeId) -> &SyntaxTree {
        &self.trees[id]
    }

    pub fn model(&self, tree: TreeId) -> UnitModel<'_> {
        UnitModel {
            compilation: self,
            tree,
        }
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&SymbolDef> {
        self.table.symbols.get(id)
    }

    /// Look a type up by qualified name and arity
    pub fn lookup(&self, qualified: &str, arity: usize) -> Option<TypeSymbol> {
        self.table
            .find_qualified(qualified, arity)
            .map(|id| self.table.definition(id))
    }

    /// Syntax and semantic diagnostics of one unit, in source order
    pub fn unit_diagnostics(&self, tree: TreeId) -> Vec<Diagnostic> {
        let syntax = &self.trees[tree];
        let mut out: Vec<Diagnostic> = syntax
            .diagnostics
            .iter()
            .chain(self.diagnostics[tree].iter())
            .map(|d| {
                Diagnostic::new(
                    d.code,
                    d.severity,
                    &format!("{}: {}", d.code, d.message),
                    syntax.location(d.start, d.end),
                )
            })
            .collect();
        out.sort_by_key(|d| d.location.as_ref().map(|l| (l.line, l.column)));
        out
    }
}

/// Semantic model of one unit of a compilation
#[derive(Debug, Clone, Copy)]
pub struct UnitModel<'c> {
    compilation: &'c Compilation,
    tree: TreeId,
}

impl SemanticModel for UnitModel<'_> {
    fn declared_type(&self, decl: TypeDeclId) -> Option<TypeSymbol> {
        let id = (*self.compilation.decl_symbols.get(self.tree)?.get(decl)?)?;
        Some(self.compilation.table.definition(id))
    }

    fn base_interfaces(&self, ty: &TypeSymbol) -> Vec<TypeSymbol> {
        let Some(def) = self.compilation.table.symbols.get(ty.def) else {
            return Vec::new();
        };
        def.interfaces
            .iter()
            .map(|base| substitute(base, &def.type_params, &ty.args))
            .collect()
    }

    fn markers(&self, ty: &TypeSymbol) -> Vec<String> {
        self.compilation
            .table
            .symbols
            .get(ty.def)
            .map(|def| def.markers.clone())
            .unwrap_or_default()
    }

    fn display_name(&self, ty: &TypeSymbol) -> String {
        self.compilation.table.display(ty)
    }

    fn is_interface(&self, ty: &TypeSymbol) -> bool {
        self.compilation
            .table
            .symbols
            .get(ty.def)
            .is_some_and(|def| def.kind == TypeKind::Interface)
    }
}
