//! Declaration-level C# parser
//!
//! Recognizes usings, namespaces and type declarations. Member bodies are
//! skipped by balanced-delimiter scanning so nested types are still found.

use super::lexer::{SyntaxDiagnostic, Token, TokenKind};
use super::syntax::{
    NamePart, NamespaceDecl, NamespaceId, TypeDecl, TypeDeclId, TypeKind, TypeName, TypeSyntax,
    UsingDirective, UsingKind, GLOBAL_NAMESPACE,
};
use std::collections::HashSet;

const MODIFIER_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "sealed", "abstract", "unsafe", "new",
    "readonly", "ref", "extern", "virtual", "override", "volatile", "const", "fixed",
];

const CONTEXTUAL_MODIFIERS: &[&str] = &["partial", "file", "required", "async", "scoped"];

/// Keywords that name a type
pub const PREDEFINED_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long", "ulong",
    "short", "ushort", "object", "string", "void", "dynamic",
];

static EOF_TOKEN: Token = Token {
    kind: TokenKind::EndOfFile,
    text: String::new(),
    value: None,
    start: 0,
    end: 0,
};

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub namespaces: Vec<NamespaceDecl>,
    pub types: Vec<TypeDecl>,
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

/// Parse a token stream produced by the lexer
pub fn parse(tokens: &[Token]) -> ParseOutput {
    let mut parser = Parser {
        tokens,
        pos: 0,
        out: ParseOutput {
            namespaces: vec![NamespaceDecl {
                segments: Vec::new(),
                parent: None,
                usings: Vec::new(),
            }],
            ..ParseOutput::default()
        },
    };
    parser.namespace_body(GLOBAL_NAMESPACE, false);
    parser.out
}

/// Parse a standalone type such as `IList<KeyValuePair<K, V>>`
pub fn parse_type_text(text: &str) -> Option<TypeSyntax> {
    let lexed = super::lexer::lex(text, &HashSet::new());
    if !lexed.diagnostics.is_empty() {
        return None;
    }
    let mut parser = Parser {
        tokens: &lexed.tokens,
        pos: 0,
        out: ParseOutput::default(),
    };
    let ty = parser.parse_type()?;
    parser.current().is_eof().then_some(ty)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    out: ParseOutput,
}

impl<'t> Parser<'t> {
    fn current(&self) -> &'t Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> &'t Token {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF_TOKEN)
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.current();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.current().is_punct(punct)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// End offset of the previous token, where a missing token is reported
    fn prev_end(&self) -> usize {
        match self.pos {
            0 => 0,
            n => self.tokens.get(n - 1).map_or(0, |t| t.end),
        }
    }

    fn error_here(&mut self, code: &'static str, message: &str) {
        let token = self.current();
        self.out
            .diagnostics
            .push(SyntaxDiagnostic::error(code, message, token.start, token.end));
    }

    fn error_missing(&mut self, code: &'static str, message: &str) {
        let at = self.prev_end();
        self.out
            .diagnostics
            .push(SyntaxDiagnostic::error(code, message, at, at));
    }

    fn expect_semicolon(&mut self) {
        if !self.eat_punct(";") {
            self.error_missing("CS1002", "; expected");
        }
    }

    fn identifier(&mut self) -> Option<&'t Token> {
        let token = self.current();
        if token.kind == TokenKind::Identifier {
            self.advance();
            Some(token)
        } else {
            None
        }
    }

    fn namespace_body(&mut self, ns: NamespaceId, braced: bool) {
        let mut members_started = false;
        loop {
            let token = self.current();
            if token.is_eof() {
                if braced {
                    self.error_here("CS1513", "} expected");
                }
                return;
            }
            if braced && token.is_punct("}") {
                self.advance();
                self.eat_punct(";");
                return;
            }
            if token.is_keyword("extern") && self.peek(1).is_contextual("alias") {
                self.skip_to_semicolon();
                continue;
            }
            if self.at_using_directive() {
                if members_started {
                    self.error_here(
                        "CS1529",
                        "A using clause must precede all other elements defined in the namespace except extern alias declarations",
                    );
                }
                self.using_directive(ns);
                continue;
            }
            if token.is_punct("[")
                && (self.peek(1).is_contextual("assembly") || self.peek(1).is_contextual("module"))
                && self.peek(2).is_punct(":")
            {
                self.skip_balanced("[", "]");
                continue;
            }
            members_started = true;
            self.namespace_member(ns);
        }
    }

    fn at_using_directive(&self) -> bool {
        let (using, next) = if self.current().is_contextual("global") {
            (self.peek(1), self.peek(2))
        } else {
            (self.current(), self.peek(1))
        };
        using.is_keyword("using") && !next.is_punct("(") && !next.is_contextual("var")
    }

    fn using_directive(&mut self, ns: NamespaceId) {
        let global = self.current().is_contextual("global");
        if global {
            self.advance();
        }
        self.advance();

        let is_static = if self.current().is_keyword("static") {
            self.advance();
            true
        } else {
            false
        };
        let alias = if self.current().kind == TokenKind::Identifier && self.peek(1).is_punct("=") {
            let name = self.advance().value_text().to_string();
            self.advance();
            Some(name)
        } else {
            None
        };

        match self.parse_type() {
            Some(target) => {
                let kind = match (alias, is_static) {
                    (Some(alias), _) => UsingKind::Alias(alias),
                    (None, true) => UsingKind::Static,
                    (None, false) => UsingKind::Namespace,
                };
                self.out.namespaces[ns].usings.push(UsingDirective {
                    kind,
                    target,
                    global,
                });
            }
            None => {
                self.error_here("CS1001", "Identifier expected");
                self.skip_to_semicolon();
                return;
            }
        }
        self.expect_semicolon();
    }

    fn namespace_member(&mut self, ns: NamespaceId) {
        let start = self.pos;
        let attributes = self.attributes();
        let partial = self.modifiers();

        if self.current().is_keyword("namespace") {
            self.namespace_decl(ns);
            return;
        }
        if let Some(kind) = self.type_keyword() {
            self.type_decl(kind, ns, None, attributes, partial);
            return;
        }
        if self.pos == start && self.at_punct("}") {
            self.error_here("CS1022", "Type or namespace definition, or end-of-file expected");
            self.advance();
            return;
        }
        if ns != GLOBAL_NAMESPACE {
            self.error_here(
                "CS0116",
                "A namespace cannot directly contain members such as fields, methods or statements",
            );
        }
        // Top-level statement or stray member
        self.skip_member(start);
    }

    fn namespace_decl(&mut self, parent: NamespaceId) {
        self.advance();
        let mut segments = self.out.namespaces[parent].segments.clone();
        match self.qualified_identifier() {
            Some(name) => segments.extend(name),
            None => self.error_here("CS1001", "Identifier expected"),
        }

        let id = self.out.namespaces.len();
        self.out.namespaces.push(NamespaceDecl {
            segments,
            parent: Some(parent),
            usings: Vec::new(),
        });

        if self.eat_punct("{") {
            self.namespace_body(id, true);
        } else if self.eat_punct(";") {
            if parent != GLOBAL_NAMESPACE {
                self.error_missing(
                    "CS8955",
                    "Source file can not contain both file-scoped and normal namespace declarations",
                );
            }
            self.namespace_body(id, false);
        } else {
            self.error_missing("CS1514", "{ expected");
        }
    }

    fn qualified_identifier(&mut self) -> Option<Vec<String>> {
        let mut segments = vec![self.identifier()?.value_text().to_string()];
        while self.at_punct(".") && self.peek(1).kind == TokenKind::Identifier {
            self.advance();
            if let Some(part) = self.identifier() {
                segments.push(part.value_text().to_string());
            }
        }
        Some(segments)
    }

    /// Modifiers before a declaration; returns whether `partial` was among them
    fn modifiers(&mut self) -> bool {
        let mut partial = false;
        loop {
            let token = self.current();
            if token.kind == TokenKind::Keyword && MODIFIER_KEYWORDS.contains(&token.text.as_str()) {
                // `new` starting an expression is not a modifier
                if token.text == "new" && self.peek(1).is_punct("(") {
                    break;
                }
                self.advance();
                continue;
            }
            let next = self.peek(1);
            if token.kind == TokenKind::Identifier
                && token.value.is_none()
                && CONTEXTUAL_MODIFIERS.contains(&token.text.as_str())
                && matches!(next.kind, TokenKind::Keyword | TokenKind::Identifier)
            {
                partial |= token.text == "partial";
                self.advance();
                continue;
            }
            break;
        }
        partial
    }

    /// Consume a type-declaration keyword, if one is next
    fn type_keyword(&mut self) -> Option<TypeKind> {
        let token = self.current();
        let kind = match token.kind {
            TokenKind::Keyword => match token.text.as_str() {
                "class" => TypeKind::Class,
                "struct" => TypeKind::Struct,
                "interface" => TypeKind::Interface,
                "enum" => TypeKind::Enum,
                "delegate" if !self.peek(1).is_punct("(") && !self.peek(1).is_punct("{") => {
                    TypeKind::Delegate
                }
                _ => return None,
            },
            TokenKind::Identifier if token.is_contextual("record") => {
                let next = self.peek(1);
                if next.is_keyword("class") {
                    self.advance();
                    TypeKind::Record
                } else if next.is_keyword("struct") {
                    self.advance();
                    TypeKind::RecordStruct
                } else if next.kind == TokenKind::Identifier {
                    TypeKind::Record
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn type_decl(
        &mut self,
        kind: TypeKind,
        ns: NamespaceId,
        container: Option<TypeDeclId>,
        attributes: Vec<TypeName>,
        partial: bool,
    ) {
        if kind == TypeKind::Delegate {
            self.delegate_decl(ns, container, attributes);
            return;
        }

        let (name, name_start, name_end) = match self.identifier() {
            Some(token) => (token.value_text().to_string(), token.start, token.end),
            None => {
                self.error_here("CS1001", "Identifier expected");
                let at = self.current().start;
                (String::new(), at, at)
            }
        };
        let type_params = self.type_parameters();

        // Primary constructor or record parameter list
        if !matches!(kind, TypeKind::Interface | TypeKind::Enum) && self.at_punct("(") {
            self.skip_balanced("(", ")");
        }

        let mut bases = Vec::new();
        if self.eat_punct(":") {
            if kind == TypeKind::Enum {
                if self.parse_type().is_none() {
                    self.error_here("CS1031", "Type expected");
                }
            } else {
                loop {
                    match self.parse_type() {
                        Some(base) => bases.push(base),
                        None => {
                            self.error_here("CS1031", "Type expected");
                            break;
                        }
                    }
                    if self.at_punct("(") {
                        self.skip_balanced("(", ")");
                    }
                    if !self.eat_punct(",") {
                        break;
                    }
                }
            }
        }
        self.skip_constraints();

        let id = self.out.types.len();
        self.out.types.push(TypeDecl {
            kind,
            name,
            name_start,
            name_end,
            type_params,
            attributes,
            bases,
            partial,
            namespace: ns,
            container,
        });

        if self.at_punct("{") {
            if kind == TypeKind::Enum {
                self.skip_balanced("{", "}");
            } else {
                self.advance();
                self.type_body(id, ns);
            }
            self.eat_punct(";");
        } else if !self.eat_punct(";") {
            self.error_missing("CS1514", "{ expected");
        }
    }

    fn delegate_decl(&mut self, ns: NamespaceId, container: Option<TypeDeclId>, attributes: Vec<TypeName>) {
        if self.parse_type().is_none() {
            self.error_here("CS1031", "Type expected");
        }
        let (name, name_start, name_end) = match self.identifier() {
            Some(token) => (token.value_text().to_string(), token.start, token.end),
            None => {
                self.error_here("CS1001", "Identifier expected");
                let at = self.current().start;
                (String::new(), at, at)
            }
        };
        let type_params = self.type_parameters();
        if self.at_punct("(") {
            self.skip_balanced("(", ")");
        } else {
            self.error_missing("CS1003", "Syntax error, '(' expected");
        }
        self.skip_constraints();
        self.expect_semicolon();

        self.out.types.push(TypeDecl {
            kind: TypeKind::Delegate,
            name,
            name_start,
            name_end,
            type_params,
            attributes,
            bases: Vec::new(),
            partial: false,
            namespace: ns,
            container,
        });
    }

    fn type_body(&mut self, id: TypeDeclId, ns: NamespaceId) {
        loop {
            let token = self.current();
            if token.is_eof() {
                self.error_here("CS1513", "} expected");
                return;
            }
            if token.is_punct("}") {
                self.advance();
                return;
            }

            let start = self.pos;
            let attributes = self.attributes();
            let partial = self.modifiers();
            if let Some(kind) = self.type_keyword() {
                self.type_decl(kind, ns, Some(id), attributes, partial);
                continue;
            }
            if !self.at_punct("}") || self.pos == start {
                self.skip_member(start);
            }
        }
    }

    /// Attribute sections before a declaration; returns the attribute names
    fn attributes(&mut self) -> Vec<TypeName> {
        let mut names = Vec::new();
        while self.at_punct("[") {
            self.advance();
            let target = self.current();
            if matches!(target.kind, TokenKind::Identifier | TokenKind::Keyword) && self.peek(1).is_punct(":") {
                self.advance();
                self.advance();
            }
            loop {
                match self.parse_type_name() {
                    Some(name) => names.push(name),
                    None => {
                        self.error_here("CS1001", "Identifier expected");
                        break;
                    }
                }
                if self.at_punct("(") {
                    self.skip_balanced("(", ")");
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
            if !self.eat_punct("]") {
                self.error_missing("CS1003", "Syntax error, ']' expected");
                while !self.current().is_eof() && !self.at_punct("]") && !self.at_punct("{") && !self.at_punct("}") {
                    self.advance();
                }
                self.eat_punct("]");
            }
        }
        names
    }

    fn type_parameters(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        if !self.eat_punct("<") {
            return params;
        }
        loop {
            self.attributes();
            if self.current().is_keyword("in") || self.current().is_contextual("out") || self.current().is_keyword("out") {
                self.advance();
            }
            match self.identifier() {
                Some(token) => params.push(token.value_text().to_string()),
                None => {
                    self.error_here("CS1001", "Identifier expected");
                    break;
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        if !self.eat_punct(">") {
            self.error_missing("CS1003", "Syntax error, '>' expected");
        }
        params
    }

    /// Skip `where T : ...` clauses up to the body or terminator
    fn skip_constraints(&mut self) {
        if !self.current().is_contextual("where") {
            return;
        }
        while !self.current().is_eof() && !self.at_punct("{") && !self.at_punct(";") && !self.at_punct("}") {
            if self.at_punct("(") {
                self.skip_balanced("(", ")");
            } else {
                self.advance();
            }
        }
    }

    /// Skip one member (or top-level statement) starting at token `start`.
    /// Stops after its terminating `;` or body block; never consumes the
    /// closing brace of the enclosing scope.
    fn skip_member(&mut self, start: usize) {
        let mut depth = 0usize;
        let mut initializer = false;
        loop {
            let token = self.current();
            if token.is_eof() {
                return;
            }
            if token.is_punct("}") {
                if self.pos > start {
                    self.error_missing("CS1002", "; expected");
                } else {
                    self.advance();
                }
                return;
            }
            if token.is_punct("{") {
                self.skip_balanced("{", "}");
                if depth == 0 && !initializer && !self.at_punct("=") && !self.at_punct("=>") {
                    return;
                }
                continue;
            }
            if depth == 0 {
                if token.is_punct(";") {
                    self.advance();
                    return;
                }
                if token.is_punct("=") || token.is_punct("=>") {
                    initializer = true;
                }
            }
            if token.is_punct("(") || token.is_punct("[") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") {
                depth = depth.saturating_sub(1);
            }
            self.advance();
        }
    }

    fn skip_to_semicolon(&mut self) {
        while !self.current().is_eof() && !self.at_punct(";") && !self.at_punct("}") {
            self.advance();
        }
        self.eat_punct(";");
    }

    /// Skip from an opening delimiter to its matching close
    fn skip_balanced(&mut self, open: &str, close: &str) {
        let start = self.current();
        let mut depth = 0usize;
        loop {
            let token = self.current();
            if token.is_eof() {
                let (code, message) = match close {
                    "}" => ("CS1513", "} expected"),
                    ")" => ("CS1026", ") expected"),
                    _ => ("CS1003", "Syntax error, ']' expected"),
                };
                self.out
                    .diagnostics
                    .push(SyntaxDiagnostic::error(code, message, start.start, token.end));
                return;
            }
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return;
                }
            }
            self.advance();
        }
    }

    /// Parse a type. Reports nothing; the caller decides what a failure means.
    fn parse_type(&mut self) -> Option<TypeSyntax> {
        let token = self.current();
        let mut ty = if token.kind == TokenKind::Keyword && PREDEFINED_TYPES.contains(&token.text.as_str()) {
            self.advance();
            TypeSyntax::Predefined {
                keyword: token.text.clone(),
                start: token.start,
                end: token.end,
            }
        } else if token.is_punct("(") {
            let save = self.pos;
            self.advance();
            let mut items = Vec::new();
            loop {
                match self.parse_type() {
                    Some(item) => items.push(item),
                    None => {
                        self.pos = save;
                        return None;
                    }
                }
                // Optional element name
                if self.current().kind == TokenKind::Identifier {
                    self.advance();
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
            if !self.eat_punct(")") || items.len() < 2 {
                self.pos = save;
                return None;
            }
            TypeSyntax::Tuple(items)
        } else if token.kind == TokenKind::Identifier {
            TypeSyntax::Named(self.parse_type_name()?)
        } else {
            return None;
        };

        loop {
            if self.at_punct("?") {
                self.advance();
                ty = TypeSyntax::Nullable(Box::new(ty));
            } else if self.at_punct("*") {
                self.advance();
                ty = TypeSyntax::Pointer(Box::new(ty));
            } else if self.at_punct("[") && (self.peek(1).is_punct("]") || self.peek(1).is_punct(",")) {
                self.advance();
                let mut rank = 1;
                while self.eat_punct(",") {
                    rank += 1;
                }
                self.eat_punct("]");
                ty = TypeSyntax::Array(Box::new(ty), rank);
            } else {
                break;
            }
        }
        Some(ty)
    }

    fn parse_type_name(&mut self) -> Option<TypeName> {
        let first = self.current();
        if first.kind != TokenKind::Identifier {
            return None;
        }
        let start = first.start;
        let mut alias = None;
        if self.peek(1).is_punct("::") {
            alias = Some(first.value_text().to_string());
            self.advance();
            self.advance();
        }

        let mut parts = Vec::new();
        loop {
            let Some(token) = self.identifier() else {
                if parts.is_empty() {
                    return None;
                }
                break;
            };
            let args = if self.at_punct("<") {
                self.type_argument_list()
            } else {
                Vec::new()
            };
            parts.push(NamePart {
                name: token.value_text().to_string(),
                args,
            });
            if self.at_punct(".") && self.peek(1).kind == TokenKind::Identifier {
                self.advance();
                continue;
            }
            break;
        }

        Some(TypeName {
            alias,
            parts,
            start,
            end: self.prev_end(),
        })
    }

    /// `<T, U>` after a name; restores the position when it is not a type
    /// argument list (a less-than comparison in a statement).
    fn type_argument_list(&mut self) -> Vec<TypeSyntax> {
        let save = self.pos;
        self.advance();
        let mut args = Vec::new();
        loop {
            match self.parse_type() {
                Some(arg) => args.push(arg),
                None => {
                    self.pos = save;
                    return Vec::new();
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        if self.eat_punct(">") {
            args
        } else {
            self.pos = save;
            Vec::new()
        }
    }
}
